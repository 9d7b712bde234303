use std::sync::Arc;

use crate::error::{Error, Result};
use crate::logic::access_gate::AccessGate;
use crate::logic::explanation_resolver::ExplanationResolver;
use crate::logic::traversal::Traversal;
use crate::model::{
    Activation, ActivationView, Dataset, DatasetCriteria, DatasetUpdate, Explanation,
    ExplanationCriteria, Feature, FeatureCriteria, FeatureUpdate, FeatureWithExplanation, Id,
    NewDataset, NewFeature, Sample, User, UserCriteria, UserIdentity, UserUpdate,
};
use crate::store::traits::Store;

/// User-facing entry points over the store.
///
/// Every method takes the request's resolved session explicitly and runs the access
/// gate before the first store call.
pub struct Explorer<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for Explorer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> Explorer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // --- Datasets ---

    pub async fn get_dataset(&self, session: Option<&UserIdentity>, id: Id) -> Result<Dataset> {
        AccessGate::check(session)?;
        self.store
            .get_dataset(id)
            .await?
            .ok_or_else(|| Error::not_found("dataset", id))
    }

    pub async fn find_datasets(
        &self,
        session: Option<&UserIdentity>,
        criteria: &DatasetCriteria,
    ) -> Result<Vec<Dataset>> {
        AccessGate::check(session)?;
        self.store.find_datasets(criteria).await
    }

    /// The caller becomes the owner unless the input names one
    pub async fn create_dataset(
        &self,
        session: Option<&UserIdentity>,
        mut dataset: NewDataset,
    ) -> Result<Dataset> {
        let access = AccessGate::check(session)?;
        dataset.validate()?;
        dataset.created_by.get_or_insert(access.user().user_id);

        let created = self.store.create_dataset(dataset).await?;
        log::info!("dataset {} created by user {}", created.id, access.user().user_id);
        Ok(created)
    }

    pub async fn update_dataset(
        &self,
        session: Option<&UserIdentity>,
        id: Id,
        update: DatasetUpdate,
    ) -> Result<()> {
        AccessGate::check(session)?;
        update.validate()?;
        if !self.store.update_dataset(id, update).await? {
            return Err(Error::not_found("dataset", id));
        }
        Ok(())
    }

    pub async fn delete_dataset(&self, session: Option<&UserIdentity>, id: Id) -> Result<Dataset> {
        let access = AccessGate::check(session)?;
        let deleted = self
            .store
            .delete_dataset(id)
            .await?
            .ok_or_else(|| Error::not_found("dataset", id))?;
        log::info!("dataset {} deleted by user {}", id, access.user().user_id);
        Ok(deleted)
    }

    // --- Samples and activations ---

    pub async fn list_samples_for_dataset(
        &self,
        session: Option<&UserIdentity>,
        dataset_id: Id,
    ) -> Result<Vec<Sample>> {
        let access = AccessGate::check(session)?;
        Traversal::list_samples_for_dataset(self.store.as_ref(), &access, dataset_id).await
    }

    pub async fn get_sample(&self, session: Option<&UserIdentity>, id: Id) -> Result<Sample> {
        AccessGate::check(session)?;
        self.store
            .get_sample(id)
            .await?
            .ok_or_else(|| Error::not_found("sample", id))
    }

    pub async fn list_activations_for_sample(
        &self,
        session: Option<&UserIdentity>,
        sample_id: Id,
    ) -> Result<Vec<Activation>> {
        let access = AccessGate::check(session)?;
        Traversal::list_activations_for_sample(self.store.as_ref(), &access, sample_id).await
    }

    pub async fn list_activations_for_feature(
        &self,
        session: Option<&UserIdentity>,
        feature_id: Id,
    ) -> Result<Vec<(Activation, Vec<String>)>> {
        let access = AccessGate::check(session)?;
        Traversal::list_activations_for_feature(self.store.as_ref(), &access, feature_id).await
    }

    pub async fn sample_activation_views(
        &self,
        session: Option<&UserIdentity>,
        sample_id: Id,
    ) -> Result<Vec<ActivationView>> {
        let access = AccessGate::check(session)?;
        Traversal::aligned_activations_for_sample(self.store.as_ref(), &access, sample_id).await
    }

    pub async fn feature_activation_views(
        &self,
        session: Option<&UserIdentity>,
        feature_id: Id,
    ) -> Result<Vec<ActivationView>> {
        let access = AccessGate::check(session)?;
        Traversal::aligned_activations_for_feature(self.store.as_ref(), &access, feature_id).await
    }

    // --- Features and explanations ---

    pub async fn get_feature(
        &self,
        session: Option<&UserIdentity>,
        id: Id,
    ) -> Result<FeatureWithExplanation> {
        let access = AccessGate::check(session)?;
        let feature = self
            .store
            .get_feature(id)
            .await?
            .ok_or_else(|| Error::not_found("feature", id))?;
        let explanation =
            ExplanationResolver::current_for_feature(self.store.as_ref(), &access, id).await?;
        Ok(FeatureWithExplanation {
            feature,
            explanation,
        })
    }

    pub async fn find_features(
        &self,
        session: Option<&UserIdentity>,
        criteria: &FeatureCriteria,
    ) -> Result<Vec<FeatureWithExplanation>> {
        let access = AccessGate::check(session)?;
        let features = self.store.find_features(criteria).await?;
        ExplanationResolver::with_explanations(self.store.as_ref(), &access, features).await
    }

    pub async fn current_explanation(
        &self,
        session: Option<&UserIdentity>,
        feature_id: Id,
    ) -> Result<Option<Explanation>> {
        let access = AccessGate::check(session)?;
        ExplanationResolver::current_for_feature(self.store.as_ref(), &access, feature_id).await
    }

    /// Every explanation ever recorded for a feature, newest first
    pub async fn explanation_history(
        &self,
        session: Option<&UserIdentity>,
        feature_id: Id,
    ) -> Result<Vec<Explanation>> {
        AccessGate::check(session)?;
        let mut history = self
            .store
            .find_explanations(&ExplanationCriteria::for_features(vec![feature_id]))
            .await?;
        history.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(history)
    }

    pub async fn create_feature(
        &self,
        session: Option<&UserIdentity>,
        mut feature: NewFeature,
    ) -> Result<Feature> {
        let access = AccessGate::check(session)?;
        feature.validate()?;
        feature.created_by.get_or_insert(access.user().user_id);

        let created = self.store.create_feature(feature).await?;
        log::info!(
            "feature {} ({} layer {} #{}) created by user {}",
            created.id,
            created.model_id,
            created.layer,
            created.feature_index,
            access.user().user_id
        );
        Ok(created)
    }

    pub async fn update_feature(
        &self,
        session: Option<&UserIdentity>,
        id: Id,
        update: FeatureUpdate,
    ) -> Result<()> {
        AccessGate::check(session)?;
        update.validate()?;
        if !self.store.update_feature(id, update).await? {
            return Err(Error::not_found("feature", id));
        }
        Ok(())
    }

    pub async fn delete_feature(&self, session: Option<&UserIdentity>, id: Id) -> Result<Feature> {
        let access = AccessGate::check(session)?;
        let deleted = self
            .store
            .delete_feature(id)
            .await?
            .ok_or_else(|| Error::not_found("feature", id))?;
        log::info!("feature {} deleted by user {}", id, access.user().user_id);
        Ok(deleted)
    }

    // --- Users ---

    /// The account behind the caller's session
    pub async fn current_user(&self, session: Option<&UserIdentity>) -> Result<User> {
        let access = AccessGate::check(session)?;
        let id = access.user().user_id;
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| Error::not_found("user", id))
    }

    pub async fn get_user(&self, session: Option<&UserIdentity>, id: Id) -> Result<User> {
        AccessGate::check(session)?;
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| Error::not_found("user", id))
    }

    pub async fn find_users(
        &self,
        session: Option<&UserIdentity>,
        criteria: &UserCriteria,
    ) -> Result<Vec<User>> {
        AccessGate::check(session)?;
        self.store.find_users(criteria).await
    }

    pub async fn update_user(
        &self,
        session: Option<&UserIdentity>,
        id: Id,
        update: UserUpdate,
    ) -> Result<()> {
        AccessGate::check(session)?;
        update.validate()?;
        if !self.store.update_user(id, update).await? {
            return Err(Error::not_found("user", id));
        }
        Ok(())
    }

    pub async fn delete_user(&self, session: Option<&UserIdentity>, id: Id) -> Result<User> {
        let access = AccessGate::check(session)?;
        let deleted = self
            .store
            .delete_user(id)
            .await?
            .ok_or_else(|| Error::not_found("user", id))?;
        log::info!("user {} deleted by user {}", id, access.user().user_id);
        Ok(deleted)
    }
}
