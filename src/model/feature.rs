use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Id;

/// A direction discovered in a specific model layer.
///
/// `feature_index` is unique within a (`model_id`, `layer`) pair. The logit lists are
/// the top positive/negative output tokens recorded upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: Id,
    pub feature_index: i32,
    pub model_id: String,
    pub layer: i32,
    pub source_set_name: Option<String>,
    pub frac_nonzero: Option<f64>,
    #[serde(default)]
    pub pos_str: Vec<String>,
    #[serde(default)]
    pub pos_values: Vec<f64>,
    #[serde(default)]
    pub neg_str: Vec<String>,
    #[serde(default)]
    pub neg_values: Vec<f64>,
    pub created_by: Option<Id>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeature {
    pub feature_index: i32,
    pub model_id: String,
    pub layer: i32,
    #[serde(default)]
    pub source_set_name: Option<String>,
    #[serde(default)]
    pub frac_nonzero: Option<f64>,
    #[serde(default)]
    pub pos_str: Vec<String>,
    #[serde(default)]
    pub pos_values: Vec<f64>,
    #[serde(default)]
    pub neg_str: Vec<String>,
    #[serde(default)]
    pub neg_values: Vec<f64>,
    #[serde(default)]
    pub created_by: Option<Id>,
}

impl NewFeature {
    /// Minimal feature with no logit data attached
    pub fn new(feature_index: i32, model_id: impl Into<String>, layer: i32) -> Self {
        Self {
            feature_index,
            model_id: model_id.into(),
            layer,
            source_set_name: None,
            frac_nonzero: None,
            pos_str: Vec::new(),
            pos_values: Vec::new(),
            neg_str: Vec::new(),
            neg_values: Vec::new(),
            created_by: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_index < 0 {
            return Err(Error::validation("feature_index must be non-negative"));
        }
        if self.layer < 0 {
            return Err(Error::validation("layer must be non-negative"));
        }
        if self.model_id.trim().is_empty() {
            return Err(Error::validation("model_id is required"));
        }
        if self.pos_str.len() != self.pos_values.len() || self.neg_str.len() != self.neg_values.len()
        {
            return Err(Error::validation("logit strings and values differ in length"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureUpdate {
    pub feature_index: Option<i32>,
    pub model_id: Option<String>,
    pub layer: Option<i32>,
    pub source_set_name: Option<String>,
    pub frac_nonzero: Option<f64>,
}

impl FeatureUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.feature_index, Some(index) if index < 0) {
            return Err(Error::validation("feature_index must be non-negative"));
        }
        if matches!(self.layer, Some(layer) if layer < 0) {
            return Err(Error::validation("layer must be non-negative"));
        }
        if matches!(&self.model_id, Some(model) if model.trim().is_empty()) {
            return Err(Error::validation("model_id cannot be empty"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.feature_index.is_none()
            && self.model_id.is_none()
            && self.layer.is_none()
            && self.source_set_name.is_none()
            && self.frac_nonzero.is_none()
    }

    pub fn apply(self, feature: &mut Feature) {
        if let Some(feature_index) = self.feature_index {
            feature.feature_index = feature_index;
        }
        if let Some(model_id) = self.model_id {
            feature.model_id = model_id;
        }
        if let Some(layer) = self.layer {
            feature.layer = layer;
        }
        if let Some(source_set_name) = self.source_set_name {
            feature.source_set_name = Some(source_set_name);
        }
        if let Some(frac_nonzero) = self.frac_nonzero {
            feature.frac_nonzero = Some(frac_nonzero);
        }
    }
}
