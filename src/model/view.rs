use serde::Serialize;

use crate::logic::AlignedTokens;
use crate::model::{Explanation, Feature, Id};

/// A feature together with its current explanation, if it has one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureWithExplanation {
    #[serde(flatten)]
    pub feature: Feature,
    pub explanation: Option<Explanation>,
}

/// An activation row rendered against the tokens of its sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationView {
    pub activation_id: Id,
    pub feature_id: Id,
    pub sample_id: Id,
    pub tokens: AlignedTokens,
}
