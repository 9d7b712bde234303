use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Id;

/// Per-token activation strengths of one feature over one sample.
///
/// `values[i]` scores `tokens[i]` of the referenced sample; only the alignment engine
/// pairs the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub id: Id,
    pub feature_id: Id,
    pub sample_id: Id,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivation {
    pub feature_id: Id,
    pub sample_id: Id,
    pub values: Vec<f64>,
}

impl NewActivation {
    pub fn validate(&self) -> Result<()> {
        if self.feature_id <= 0 || self.sample_id <= 0 {
            return Err(Error::validation(
                "activation feature_id and sample_id are required",
            ));
        }
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(Error::validation("activation values must be finite"));
        }
        Ok(())
    }
}
