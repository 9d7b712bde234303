use crate::error::Result;
use crate::model::{
    Activation, ActivationCriteria, Dataset, DatasetCriteria, DatasetUpdate, Explanation,
    ExplanationCriteria, Feature, FeatureCriteria, FeatureUpdate, Id, NewActivation, NewDataset,
    NewExplanation, NewFeature, NewSample, NewUser, Sample, SampleCriteria, User, UserCriteria,
    UserIdentity, UserUpdate,
};

#[async_trait::async_trait]
pub trait DatasetStore: Send + Sync {
    async fn get_dataset(&self, id: Id) -> Result<Option<Dataset>>;
    async fn find_datasets(&self, criteria: &DatasetCriteria) -> Result<Vec<Dataset>>;
    async fn create_dataset(&self, dataset: NewDataset) -> Result<Dataset>;
    /// Returns false when no dataset has this id
    async fn update_dataset(&self, id: Id, update: DatasetUpdate) -> Result<bool>;
    /// Deletes the dataset and, by cascade, its samples
    async fn delete_dataset(&self, id: Id) -> Result<Option<Dataset>>;
}

#[async_trait::async_trait]
pub trait SampleStore: Send + Sync {
    async fn get_sample(&self, id: Id) -> Result<Option<Sample>>;
    /// Samples in insertion order
    async fn find_samples(&self, criteria: &SampleCriteria) -> Result<Vec<Sample>>;
    async fn create_sample(&self, sample: NewSample) -> Result<Sample>;
}

#[async_trait::async_trait]
pub trait FeatureStore: Send + Sync {
    async fn get_feature(&self, id: Id) -> Result<Option<Feature>>;
    async fn find_features(&self, criteria: &FeatureCriteria) -> Result<Vec<Feature>>;
    async fn create_feature(&self, feature: NewFeature) -> Result<Feature>;
    async fn update_feature(&self, id: Id, update: FeatureUpdate) -> Result<bool>;
    async fn delete_feature(&self, id: Id) -> Result<Option<Feature>>;
}

#[async_trait::async_trait]
pub trait ExplanationStore: Send + Sync {
    /// Every matching row, historical ones included, in insertion order
    async fn find_explanations(&self, criteria: &ExplanationCriteria) -> Result<Vec<Explanation>>;
    async fn create_explanation(&self, explanation: NewExplanation) -> Result<Explanation>;
}

#[async_trait::async_trait]
pub trait ActivationStore: Send + Sync {
    async fn find_activations(&self, criteria: &ActivationCriteria) -> Result<Vec<Activation>>;
    /// Activations of a feature joined with the tokens of the sample each one scores
    async fn find_activations_with_tokens(
        &self,
        feature_id: Id,
    ) -> Result<Vec<(Activation, Vec<String>)>>;
    async fn create_activation(&self, activation: NewActivation) -> Result<Activation>;
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: Id) -> Result<Option<User>>;
    async fn find_users(&self, criteria: &UserCriteria) -> Result<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn update_user(&self, id: Id, update: UserUpdate) -> Result<bool>;
    async fn delete_user(&self, id: Id) -> Result<Option<User>>;
}

/// Lookup side of the identity provider's session table. Not a repository: it is only
/// consulted while resolving a request's session, before the access gate runs.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session_identity(&self, session_token: &str) -> Result<Option<UserIdentity>>;
}

pub trait Store:
    DatasetStore
    + SampleStore
    + FeatureStore
    + ExplanationStore
    + ActivationStore
    + UserStore
    + SessionStore
    + Send
    + Sync
{
}
