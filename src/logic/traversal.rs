//! Dataset -> Sample -> Activation read paths.
//!
//! A parent id with no rows behind it is not an error: the result is simply empty.

use crate::error::Result;
use crate::logic::access_gate::Access;
use crate::logic::alignment::AlignmentEngine;
use crate::model::{Activation, ActivationCriteria, ActivationView, Id, Sample, SampleCriteria};
use crate::store::traits::{ActivationStore, SampleStore};

pub struct Traversal;

impl Traversal {
    /// Samples of a dataset in insertion order
    pub async fn list_samples_for_dataset<S: SampleStore + ?Sized>(
        store: &S,
        _access: &Access<'_>,
        dataset_id: Id,
    ) -> Result<Vec<Sample>> {
        store
            .find_samples(&SampleCriteria::for_dataset(dataset_id))
            .await
    }

    pub async fn list_activations_for_sample<S: ActivationStore + ?Sized>(
        store: &S,
        _access: &Access<'_>,
        sample_id: Id,
    ) -> Result<Vec<Activation>> {
        store
            .find_activations(&ActivationCriteria {
                sample_id: Some(sample_id),
                ..Default::default()
            })
            .await
    }

    /// Activations of a feature, each with the tokens of the sample it scores
    pub async fn list_activations_for_feature<S: ActivationStore + ?Sized>(
        store: &S,
        _access: &Access<'_>,
        feature_id: Id,
    ) -> Result<Vec<(Activation, Vec<String>)>> {
        store.find_activations_with_tokens(feature_id).await
    }

    pub async fn aligned_activations_for_sample<S: SampleStore + ActivationStore + ?Sized>(
        store: &S,
        access: &Access<'_>,
        sample_id: Id,
    ) -> Result<Vec<ActivationView>> {
        let Some(sample) = store.get_sample(sample_id).await? else {
            return Ok(Vec::new());
        };

        Self::list_activations_for_sample(store, access, sample_id)
            .await?
            .iter()
            .map(|activation| AlignmentEngine::view(activation, &sample.tokens))
            .collect()
    }

    pub async fn aligned_activations_for_feature<S: ActivationStore + ?Sized>(
        store: &S,
        access: &Access<'_>,
        feature_id: Id,
    ) -> Result<Vec<ActivationView>> {
        Self::list_activations_for_feature(store, access, feature_id)
            .await?
            .iter()
            .map(|(activation, tokens)| AlignmentEngine::view(activation, tokens))
            .collect()
    }
}
