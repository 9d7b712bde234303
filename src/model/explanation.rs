use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Id;

/// Natural-language description of a feature. Many may exist per feature over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub id: Id,
    pub feature_id: Id,
    pub description: String,
    pub explanation_model: Option<String>,
    pub type_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExplanation {
    pub feature_id: Id,
    pub description: String,
    #[serde(default)]
    pub explanation_model: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to insertion time when not supplied by the pipeline
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewExplanation {
    pub fn new(feature_id: Id, description: impl Into<String>) -> Self {
        Self {
            feature_id,
            description: description.into(),
            explanation_model: None,
            type_name: None,
            notes: None,
            created_at: None,
        }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_id <= 0 {
            return Err(Error::validation("explanation feature_id is required"));
        }
        if self.description.trim().is_empty() {
            return Err(Error::validation("explanation description is required"));
        }
        Ok(())
    }
}
