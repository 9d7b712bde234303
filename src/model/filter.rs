//! Partial-field criteria for the repository `find` operations.
//!
//! Set fields combine with logical AND; unset fields impose no constraint.

use serde::{Deserialize, Serialize};

use crate::model::{Activation, Dataset, Explanation, Feature, Id, Sample, User};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetCriteria {
    pub name: Option<String>,
    pub created_by: Option<Id>,
    #[serde(rename = "type")]
    pub dataset_type: Option<String>,
    pub limit: Option<usize>,
}

impl DatasetCriteria {
    pub fn matches(&self, dataset: &Dataset) -> bool {
        self.name.as_ref().map_or(true, |name| &dataset.name == name)
            && self
                .created_by
                .map_or(true, |user| dataset.created_by == Some(user))
            && self
                .dataset_type
                .as_ref()
                .map_or(true, |t| dataset.dataset_type.as_ref() == Some(t))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleCriteria {
    pub dataset_id: Option<Id>,
    pub limit: Option<usize>,
}

impl SampleCriteria {
    pub fn for_dataset(dataset_id: Id) -> Self {
        Self {
            dataset_id: Some(dataset_id),
            limit: None,
        }
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        self.dataset_id.map_or(true, |id| sample.dataset_id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCriteria {
    pub feature_index: Option<i32>,
    pub model_id: Option<String>,
    pub layer: Option<i32>,
    pub created_by: Option<Id>,
    pub limit: Option<usize>,
}

impl FeatureCriteria {
    pub fn matches(&self, feature: &Feature) -> bool {
        self.feature_index
            .map_or(true, |index| feature.feature_index == index)
            && self
                .model_id
                .as_ref()
                .map_or(true, |model| &feature.model_id == model)
            && self.layer.map_or(true, |layer| feature.layer == layer)
            && self
                .created_by
                .map_or(true, |user| feature.created_by == Some(user))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplanationCriteria {
    pub feature_ids: Option<Vec<Id>>,
    pub limit: Option<usize>,
}

impl ExplanationCriteria {
    pub fn for_features(feature_ids: Vec<Id>) -> Self {
        Self {
            feature_ids: Some(feature_ids),
            limit: None,
        }
    }

    pub fn matches(&self, explanation: &Explanation) -> bool {
        self.feature_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&explanation.feature_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationCriteria {
    pub feature_id: Option<Id>,
    pub sample_id: Option<Id>,
    pub limit: Option<usize>,
}

impl ActivationCriteria {
    pub fn matches(&self, activation: &Activation) -> bool {
        self.feature_id.map_or(true, |id| activation.feature_id == id)
            && self.sample_id.map_or(true, |id| activation.sample_id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCriteria {
    pub email: Option<String>,
    pub name: Option<String>,
    pub handle: Option<String>,
    pub limit: Option<usize>,
}

impl UserCriteria {
    pub fn matches(&self, user: &User) -> bool {
        self.email.as_ref().map_or(true, |email| &user.email == email)
            && self
                .name
                .as_ref()
                .map_or(true, |name| user.name.as_ref() == Some(name))
            && self
                .handle
                .as_ref()
                .map_or(true, |handle| user.handle.as_ref() == Some(handle))
    }
}
