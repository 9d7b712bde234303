use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Id;

/// One text sample of a dataset, pre-tokenised by the ingestion pipeline.
///
/// `tokens.len()` is the length every activation vector over this sample must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Id,
    pub dataset_id: Id,
    pub sample_text: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSample {
    pub dataset_id: Id,
    pub sample_text: String,
    pub tokens: Vec<String>,
}

impl NewSample {
    pub fn validate(&self) -> Result<()> {
        if self.dataset_id <= 0 {
            return Err(Error::validation("sample dataset_id is required"));
        }
        if self.tokens.is_empty() && !self.sample_text.is_empty() {
            return Err(Error::validation("sample tokens are required"));
        }
        Ok(())
    }
}
