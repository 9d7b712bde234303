use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Id;

/// A named collection of text samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub dataset_type: Option<String>,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Id>,
}

/// Input model for creating a new dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDataset {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub dataset_type: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub created_by: Option<Id>,
}

impl NewDataset {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("dataset name is required"));
        }
        Ok(())
    }
}

/// Partial update; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub dataset_type: Option<String>,
    pub link: Option<String>,
}

impl DatasetUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::validation("dataset name cannot be empty"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.dataset_type.is_none()
            && self.link.is_none()
    }

    pub fn apply(self, dataset: &mut Dataset) {
        if let Some(name) = self.name {
            dataset.name = name;
        }
        if let Some(description) = self.description {
            dataset.description = Some(description);
        }
        if let Some(dataset_type) = self.dataset_type {
            dataset.dataset_type = Some(dataset_type);
        }
        if let Some(link) = self.link {
            dataset.link = Some(link);
        }
    }
}
