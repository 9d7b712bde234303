use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::model::{
    Activation, ActivationCriteria, Dataset, DatasetCriteria, DatasetUpdate, Explanation,
    ExplanationCriteria, Feature, FeatureCriteria, FeatureUpdate, Id, NewActivation, NewDataset,
    NewExplanation, NewFeature, NewSample, NewUser, Sample, SampleCriteria, User, UserCriteria,
    UserIdentity, UserUpdate,
};
use crate::store::traits::{
    ActivationStore, DatasetStore, ExplanationStore, FeatureStore, SampleStore, SessionStore,
    Store, UserStore,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: Id,
    users: BTreeMap<Id, User>,
    datasets: BTreeMap<Id, Dataset>,
    samples: BTreeMap<Id, Sample>,
    features: BTreeMap<Id, Feature>,
    explanations: BTreeMap<Id, Explanation>,
    activations: BTreeMap<Id, Activation>,
    /// session token -> (user id, expiry)
    sessions: HashMap<String, (Id, DateTime<Utc>)>,
}

impl Tables {
    fn allocate_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

fn take_limited<T>(rows: impl Iterator<Item = T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(limit) => rows.take(limit).collect(),
        None => rows.collect(),
    }
}

fn foreign_key_violation(table: &str, id: Id) -> Error {
    Error::store(format!("foreign key violation: no row {} in {}", id, table))
}

/// UNIQUE (model_id, layer, feature_index), ignoring the row being updated
fn check_feature_key(
    tables: &Tables,
    except: Option<Id>,
    model_id: &str,
    layer: i32,
    feature_index: i32,
) -> Result<()> {
    let taken = tables.features.values().any(|f| {
        Some(f.id) != except
            && f.model_id == model_id
            && f.layer == layer
            && f.feature_index == feature_index
    });
    if taken {
        return Err(Error::store(format!(
            "unique violation: feature {} already exists for {} layer {}",
            feature_index, model_id, layer
        )));
    }
    Ok(())
}

/// UNIQUE email and UNIQUE handle on users
fn check_user_keys(
    tables: &Tables,
    except: Option<Id>,
    email: &str,
    handle: Option<&str>,
) -> Result<()> {
    for user in tables.users.values().filter(|u| Some(u.id) != except) {
        if user.email == email {
            return Err(Error::store(format!(
                "unique violation: email {} already registered",
                email
            )));
        }
        if let Some(handle) = handle {
            if user.handle.as_deref() == Some(handle) {
                return Err(Error::store(format!(
                    "unique violation: handle {} already taken",
                    handle
                )));
            }
        }
    }
    Ok(())
}

/// Store backed by process memory, mirroring the relational constraints of the
/// PostgreSQL schema (foreign keys, cascades, unique keys).
///
/// Ids are allocated from a single increasing sequence, so id order is insertion order.
/// Every repository call is counted, which lets tests assert that a code path never
/// reached the store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of repository calls served so far (session lookups excluded)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Register a session the way the identity provider would after sign-in
    pub fn insert_session(&self, token: impl Into<String>, user_id: Id, expires: DateTime<Utc>) {
        self.tables
            .write()
            .sessions
            .insert(token.into(), (user_id, expires));
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DatasetStore for InMemoryStore {
    async fn get_dataset(&self, id: Id) -> Result<Option<Dataset>> {
        self.record_call();
        Ok(self.tables.read().datasets.get(&id).cloned())
    }

    async fn find_datasets(&self, criteria: &DatasetCriteria) -> Result<Vec<Dataset>> {
        self.record_call();
        let tables = self.tables.read();
        Ok(take_limited(
            tables
                .datasets
                .values()
                .filter(|d| criteria.matches(d))
                .cloned(),
            criteria.limit,
        ))
    }

    async fn create_dataset(&self, dataset: NewDataset) -> Result<Dataset> {
        self.record_call();
        dataset.validate()?;
        let mut tables = self.tables.write();
        if let Some(user_id) = dataset.created_by {
            if !tables.users.contains_key(&user_id) {
                return Err(foreign_key_violation("users", user_id));
            }
        }
        let id = tables.allocate_id();
        let row = Dataset {
            id,
            name: dataset.name,
            description: dataset.description,
            dataset_type: dataset.dataset_type,
            link: dataset.link,
            created_at: Utc::now(),
            created_by: dataset.created_by,
        };
        tables.datasets.insert(id, row.clone());
        Ok(row)
    }

    async fn update_dataset(&self, id: Id, update: DatasetUpdate) -> Result<bool> {
        self.record_call();
        update.validate()?;
        let mut tables = self.tables.write();
        match tables.datasets.get_mut(&id) {
            Some(dataset) => {
                update.apply(dataset);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_dataset(&self, id: Id) -> Result<Option<Dataset>> {
        self.record_call();
        let mut tables = self.tables.write();
        let Some(dataset) = tables.datasets.remove(&id) else {
            return Ok(None);
        };

        let orphaned: Vec<Id> = tables
            .samples
            .values()
            .filter(|s| s.dataset_id == id)
            .map(|s| s.id)
            .collect();
        tables.samples.retain(|_, s| s.dataset_id != id);
        tables
            .activations
            .retain(|_, a| !orphaned.contains(&a.sample_id));

        Ok(Some(dataset))
    }
}

#[async_trait::async_trait]
impl SampleStore for InMemoryStore {
    async fn get_sample(&self, id: Id) -> Result<Option<Sample>> {
        self.record_call();
        Ok(self.tables.read().samples.get(&id).cloned())
    }

    async fn find_samples(&self, criteria: &SampleCriteria) -> Result<Vec<Sample>> {
        self.record_call();
        let tables = self.tables.read();
        Ok(take_limited(
            tables
                .samples
                .values()
                .filter(|s| criteria.matches(s))
                .cloned(),
            criteria.limit,
        ))
    }

    async fn create_sample(&self, sample: NewSample) -> Result<Sample> {
        self.record_call();
        sample.validate()?;
        let mut tables = self.tables.write();
        if !tables.datasets.contains_key(&sample.dataset_id) {
            return Err(foreign_key_violation("datasets", sample.dataset_id));
        }
        let id = tables.allocate_id();
        let row = Sample {
            id,
            dataset_id: sample.dataset_id,
            sample_text: sample.sample_text,
            tokens: sample.tokens,
        };
        tables.samples.insert(id, row.clone());
        Ok(row)
    }
}

#[async_trait::async_trait]
impl FeatureStore for InMemoryStore {
    async fn get_feature(&self, id: Id) -> Result<Option<Feature>> {
        self.record_call();
        Ok(self.tables.read().features.get(&id).cloned())
    }

    async fn find_features(&self, criteria: &FeatureCriteria) -> Result<Vec<Feature>> {
        self.record_call();
        let tables = self.tables.read();
        Ok(take_limited(
            tables
                .features
                .values()
                .filter(|f| criteria.matches(f))
                .cloned(),
            criteria.limit,
        ))
    }

    async fn create_feature(&self, feature: NewFeature) -> Result<Feature> {
        self.record_call();
        feature.validate()?;
        let mut tables = self.tables.write();
        check_feature_key(
            &tables,
            None,
            &feature.model_id,
            feature.layer,
            feature.feature_index,
        )?;
        if let Some(user_id) = feature.created_by {
            if !tables.users.contains_key(&user_id) {
                return Err(foreign_key_violation("users", user_id));
            }
        }
        let id = tables.allocate_id();
        let row = Feature {
            id,
            feature_index: feature.feature_index,
            model_id: feature.model_id,
            layer: feature.layer,
            source_set_name: feature.source_set_name,
            frac_nonzero: feature.frac_nonzero,
            pos_str: feature.pos_str,
            pos_values: feature.pos_values,
            neg_str: feature.neg_str,
            neg_values: feature.neg_values,
            created_by: feature.created_by,
            created_at: Utc::now(),
        };
        tables.features.insert(id, row.clone());
        Ok(row)
    }

    async fn update_feature(&self, id: Id, update: FeatureUpdate) -> Result<bool> {
        self.record_call();
        update.validate()?;
        let mut tables = self.tables.write();
        let Some(mut updated) = tables.features.get(&id).cloned() else {
            return Ok(false);
        };
        update.apply(&mut updated);
        check_feature_key(
            &tables,
            Some(id),
            &updated.model_id,
            updated.layer,
            updated.feature_index,
        )?;
        tables.features.insert(id, updated);
        Ok(true)
    }

    async fn delete_feature(&self, id: Id) -> Result<Option<Feature>> {
        self.record_call();
        let mut tables = self.tables.write();
        if !tables.features.contains_key(&id) {
            return Ok(None);
        }
        let referenced = tables.explanations.values().any(|e| e.feature_id == id)
            || tables.activations.values().any(|a| a.feature_id == id);
        if referenced {
            return Err(Error::store(format!(
                "foreign key violation: feature {} is still referenced",
                id
            )));
        }
        Ok(tables.features.remove(&id))
    }
}

#[async_trait::async_trait]
impl ExplanationStore for InMemoryStore {
    async fn find_explanations(&self, criteria: &ExplanationCriteria) -> Result<Vec<Explanation>> {
        self.record_call();
        let tables = self.tables.read();
        Ok(take_limited(
            tables
                .explanations
                .values()
                .filter(|e| criteria.matches(e))
                .cloned(),
            criteria.limit,
        ))
    }

    async fn create_explanation(&self, explanation: NewExplanation) -> Result<Explanation> {
        self.record_call();
        explanation.validate()?;
        let mut tables = self.tables.write();
        if !tables.features.contains_key(&explanation.feature_id) {
            return Err(foreign_key_violation("features", explanation.feature_id));
        }
        let id = tables.allocate_id();
        let row = Explanation {
            id,
            feature_id: explanation.feature_id,
            description: explanation.description,
            explanation_model: explanation.explanation_model,
            type_name: explanation.type_name,
            notes: explanation.notes,
            created_at: explanation.created_at.unwrap_or_else(Utc::now),
        };
        tables.explanations.insert(id, row.clone());
        Ok(row)
    }
}

#[async_trait::async_trait]
impl ActivationStore for InMemoryStore {
    async fn find_activations(&self, criteria: &ActivationCriteria) -> Result<Vec<Activation>> {
        self.record_call();
        let tables = self.tables.read();
        Ok(take_limited(
            tables
                .activations
                .values()
                .filter(|a| criteria.matches(a))
                .cloned(),
            criteria.limit,
        ))
    }

    async fn find_activations_with_tokens(
        &self,
        feature_id: Id,
    ) -> Result<Vec<(Activation, Vec<String>)>> {
        self.record_call();
        let tables = self.tables.read();
        Ok(tables
            .activations
            .values()
            .filter(|a| a.feature_id == feature_id)
            .filter_map(|a| {
                tables
                    .samples
                    .get(&a.sample_id)
                    .map(|s| (a.clone(), s.tokens.clone()))
            })
            .collect())
    }

    async fn create_activation(&self, activation: NewActivation) -> Result<Activation> {
        self.record_call();
        activation.validate()?;
        let mut tables = self.tables.write();
        if !tables.features.contains_key(&activation.feature_id) {
            return Err(foreign_key_violation("features", activation.feature_id));
        }
        if !tables.samples.contains_key(&activation.sample_id) {
            return Err(foreign_key_violation("samples", activation.sample_id));
        }
        let id = tables.allocate_id();
        let row = Activation {
            id,
            feature_id: activation.feature_id,
            sample_id: activation.sample_id,
            values: activation.values,
        };
        tables.activations.insert(id, row.clone());
        Ok(row)
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        self.record_call();
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_users(&self, criteria: &UserCriteria) -> Result<Vec<User>> {
        self.record_call();
        let tables = self.tables.read();
        Ok(take_limited(
            tables
                .users
                .values()
                .filter(|u| criteria.matches(u))
                .cloned(),
            criteria.limit,
        ))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.record_call();
        user.validate()?;
        let mut tables = self.tables.write();
        check_user_keys(&tables, None, &user.email, user.handle.as_deref())?;
        let id = tables.allocate_id();
        let row = User {
            id,
            email: user.email,
            name: user.name,
            handle: user.handle,
            image: user.image,
        };
        tables.users.insert(id, row.clone());
        Ok(row)
    }

    async fn update_user(&self, id: Id, update: UserUpdate) -> Result<bool> {
        self.record_call();
        update.validate()?;
        let mut tables = self.tables.write();
        let Some(mut updated) = tables.users.get(&id).cloned() else {
            return Ok(false);
        };
        update.apply(&mut updated);
        check_user_keys(&tables, Some(id), &updated.email, updated.handle.as_deref())?;
        tables.users.insert(id, updated);
        Ok(true)
    }

    async fn delete_user(&self, id: Id) -> Result<Option<User>> {
        self.record_call();
        let mut tables = self.tables.write();
        let Some(user) = tables.users.remove(&id) else {
            return Ok(None);
        };

        // ON DELETE SET NULL for ownership, ON DELETE CASCADE for sessions
        for dataset in tables.datasets.values_mut() {
            if dataset.created_by == Some(id) {
                dataset.created_by = None;
            }
        }
        for feature in tables.features.values_mut() {
            if feature.created_by == Some(id) {
                feature.created_by = None;
            }
        }
        tables.sessions.retain(|_, (user_id, _)| *user_id != id);

        Ok(Some(user))
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemoryStore {
    async fn find_session_identity(&self, session_token: &str) -> Result<Option<UserIdentity>> {
        let tables = self.tables.read();
        let Some((user_id, expires)) = tables.sessions.get(session_token) else {
            return Ok(None);
        };
        if *expires <= Utc::now() {
            return Ok(None);
        }
        Ok(tables.users.get(user_id).map(|user| {
            UserIdentity::with_details(
                user.id,
                user.handle.clone(),
                user.name.clone(),
                Some(user.email.clone()),
            )
        }))
    }
}

impl Store for InMemoryStore {}
