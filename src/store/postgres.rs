use anyhow::Context;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Postgres, QueryBuilder, Row,
};

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

const DATASET_COLUMNS: &str = "id, name, description, type, link, created_at, created_by";
const SAMPLE_COLUMNS: &str = "id, dataset_id, sample_text, tokens";
const FEATURE_COLUMNS: &str = "id, feature_index, model_id, layer, source_set_name, frac_nonzero, \
     pos_str, pos_values, neg_str, neg_values, created_by, created_at";
const EXPLANATION_COLUMNS: &str =
    "id, feature_id, description, explanation_model, type_name, notes, created_at";
const ACTIVATION_COLUMNS: &str = r#"id, feature_id, sample_id, "values""#;
const USER_COLUMNS: &str = "id, email, name, handle, image";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        log::info!("Database schema is up to date");
        Ok(())
    }
}

fn push_limit(query: &mut QueryBuilder<'_, Postgres>, limit: Option<usize>) -> Result<()> {
    if let Some(limit) = limit {
        let limit = i64::try_from(limit)
            .map_err(|_| Error::validation(format!("limit {} is out of range", limit)))?;
        query.push(" LIMIT ").push_bind(limit);
    }
    Ok(())
}

fn dataset_from_row(row: &PgRow) -> std::result::Result<Dataset, sqlx::Error> {
    Ok(Dataset {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        dataset_type: row.try_get("type")?,
        link: row.try_get("link")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
    })
}

fn sample_from_row(row: &PgRow) -> std::result::Result<Sample, sqlx::Error> {
    Ok(Sample {
        id: row.try_get("id")?,
        dataset_id: row.try_get("dataset_id")?,
        sample_text: row.try_get("sample_text")?,
        tokens: row.try_get("tokens")?,
    })
}

fn feature_from_row(row: &PgRow) -> std::result::Result<Feature, sqlx::Error> {
    Ok(Feature {
        id: row.try_get("id")?,
        feature_index: row.try_get("feature_index")?,
        model_id: row.try_get("model_id")?,
        layer: row.try_get("layer")?,
        source_set_name: row.try_get("source_set_name")?,
        frac_nonzero: row.try_get("frac_nonzero")?,
        pos_str: row.try_get("pos_str")?,
        pos_values: row.try_get("pos_values")?,
        neg_str: row.try_get("neg_str")?,
        neg_values: row.try_get("neg_values")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn explanation_from_row(row: &PgRow) -> std::result::Result<Explanation, sqlx::Error> {
    Ok(Explanation {
        id: row.try_get("id")?,
        feature_id: row.try_get("feature_id")?,
        description: row.try_get("description")?,
        explanation_model: row.try_get("explanation_model")?,
        type_name: row.try_get("type_name")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn activation_from_row(row: &PgRow) -> std::result::Result<Activation, sqlx::Error> {
    Ok(Activation {
        id: row.try_get("id")?,
        feature_id: row.try_get("feature_id")?,
        sample_id: row.try_get("sample_id")?,
        values: row.try_get("values")?,
    })
}

fn user_from_row(row: &PgRow) -> std::result::Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        handle: row.try_get("handle")?,
        image: row.try_get("image")?,
    })
}

#[async_trait::async_trait]
impl DatasetStore for PostgresStore {
    async fn get_dataset(&self, id: Id) -> Result<Option<Dataset>> {
        let row = sqlx::query(&format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(dataset_from_row).transpose()?)
    }

    async fn find_datasets(&self, criteria: &DatasetCriteria) -> Result<Vec<Dataset>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {DATASET_COLUMNS} FROM datasets WHERE TRUE"
        ));
        if let Some(name) = &criteria.name {
            query.push(" AND name = ").push_bind(name.clone());
        }
        if let Some(created_by) = criteria.created_by {
            query.push(" AND created_by = ").push_bind(created_by);
        }
        if let Some(dataset_type) = &criteria.dataset_type {
            query.push(" AND type = ").push_bind(dataset_type.clone());
        }
        query.push(" ORDER BY id");
        push_limit(&mut query, criteria.limit)?;

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(dataset_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }

    async fn create_dataset(&self, dataset: NewDataset) -> Result<Dataset> {
        dataset.validate()?;

        let row = sqlx::query(&format!(
            "INSERT INTO datasets (name, description, type, link, created_by) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {DATASET_COLUMNS}"
        ))
        .bind(dataset.name)
        .bind(dataset.description)
        .bind(dataset.dataset_type)
        .bind(dataset.link)
        .bind(dataset.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(dataset_from_row(&row)?)
    }

    async fn update_dataset(&self, id: Id, update: DatasetUpdate) -> Result<bool> {
        update.validate()?;
        if update.is_empty() {
            return Ok(self.get_dataset(id).await?.is_some());
        }

        let mut query = QueryBuilder::<Postgres>::new("UPDATE datasets SET ");
        let mut set = query.separated(", ");
        if let Some(name) = update.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(description) = update.description {
            set.push("description = ").push_bind_unseparated(description);
        }
        if let Some(dataset_type) = update.dataset_type {
            set.push("type = ").push_bind_unseparated(dataset_type);
        }
        if let Some(link) = update.link {
            set.push("link = ").push_bind_unseparated(link);
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_dataset(&self, id: Id) -> Result<Option<Dataset>> {
        let row = sqlx::query(&format!(
            "DELETE FROM datasets WHERE id = $1 RETURNING {DATASET_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(dataset_from_row).transpose()?)
    }
}

#[async_trait::async_trait]
impl SampleStore for PostgresStore {
    async fn get_sample(&self, id: Id) -> Result<Option<Sample>> {
        let row = sqlx::query(&format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(sample_from_row).transpose()?)
    }

    async fn find_samples(&self, criteria: &SampleCriteria) -> Result<Vec<Sample>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples WHERE TRUE"
        ));
        if let Some(dataset_id) = criteria.dataset_id {
            query.push(" AND dataset_id = ").push_bind(dataset_id);
        }
        query.push(" ORDER BY id");
        push_limit(&mut query, criteria.limit)?;

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(sample_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }

    async fn create_sample(&self, sample: NewSample) -> Result<Sample> {
        sample.validate()?;

        let row = sqlx::query(&format!(
            "INSERT INTO samples (dataset_id, sample_text, tokens) \
             VALUES ($1, $2, $3) RETURNING {SAMPLE_COLUMNS}"
        ))
        .bind(sample.dataset_id)
        .bind(sample.sample_text)
        .bind(sample.tokens)
        .fetch_one(&self.pool)
        .await?;

        Ok(sample_from_row(&row)?)
    }
}

#[async_trait::async_trait]
impl FeatureStore for PostgresStore {
    async fn get_feature(&self, id: Id) -> Result<Option<Feature>> {
        let row = sqlx::query(&format!("SELECT {FEATURE_COLUMNS} FROM features WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(feature_from_row).transpose()?)
    }

    async fn find_features(&self, criteria: &FeatureCriteria) -> Result<Vec<Feature>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {FEATURE_COLUMNS} FROM features WHERE TRUE"
        ));
        if let Some(feature_index) = criteria.feature_index {
            query.push(" AND feature_index = ").push_bind(feature_index);
        }
        if let Some(model_id) = &criteria.model_id {
            query.push(" AND model_id = ").push_bind(model_id.clone());
        }
        if let Some(layer) = criteria.layer {
            query.push(" AND layer = ").push_bind(layer);
        }
        if let Some(created_by) = criteria.created_by {
            query.push(" AND created_by = ").push_bind(created_by);
        }
        query.push(" ORDER BY id");
        push_limit(&mut query, criteria.limit)?;

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(feature_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }

    async fn create_feature(&self, feature: NewFeature) -> Result<Feature> {
        feature.validate()?;

        let row = sqlx::query(&format!(
            "INSERT INTO features (feature_index, model_id, layer, source_set_name, frac_nonzero, \
             pos_str, pos_values, neg_str, neg_values, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {FEATURE_COLUMNS}"
        ))
        .bind(feature.feature_index)
        .bind(feature.model_id)
        .bind(feature.layer)
        .bind(feature.source_set_name)
        .bind(feature.frac_nonzero)
        .bind(feature.pos_str)
        .bind(feature.pos_values)
        .bind(feature.neg_str)
        .bind(feature.neg_values)
        .bind(feature.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(feature_from_row(&row)?)
    }

    async fn update_feature(&self, id: Id, update: FeatureUpdate) -> Result<bool> {
        update.validate()?;
        if update.is_empty() {
            return Ok(self.get_feature(id).await?.is_some());
        }

        let mut query = QueryBuilder::<Postgres>::new("UPDATE features SET ");
        let mut set = query.separated(", ");
        if let Some(feature_index) = update.feature_index {
            set.push("feature_index = ").push_bind_unseparated(feature_index);
        }
        if let Some(model_id) = update.model_id {
            set.push("model_id = ").push_bind_unseparated(model_id);
        }
        if let Some(layer) = update.layer {
            set.push("layer = ").push_bind_unseparated(layer);
        }
        if let Some(source_set_name) = update.source_set_name {
            set.push("source_set_name = ")
                .push_bind_unseparated(source_set_name);
        }
        if let Some(frac_nonzero) = update.frac_nonzero {
            set.push("frac_nonzero = ").push_bind_unseparated(frac_nonzero);
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_feature(&self, id: Id) -> Result<Option<Feature>> {
        let row = sqlx::query(&format!(
            "DELETE FROM features WHERE id = $1 RETURNING {FEATURE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(feature_from_row).transpose()?)
    }
}

#[async_trait::async_trait]
impl ExplanationStore for PostgresStore {
    async fn find_explanations(&self, criteria: &ExplanationCriteria) -> Result<Vec<Explanation>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EXPLANATION_COLUMNS} FROM explanations WHERE TRUE"
        ));
        if let Some(feature_ids) = &criteria.feature_ids {
            query
                .push(" AND feature_id = ANY(")
                .push_bind(feature_ids.clone())
                .push(")");
        }
        query.push(" ORDER BY id");
        push_limit(&mut query, criteria.limit)?;

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(explanation_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }

    async fn create_explanation(&self, explanation: NewExplanation) -> Result<Explanation> {
        explanation.validate()?;

        let row = sqlx::query(&format!(
            "INSERT INTO explanations (feature_id, description, explanation_model, type_name, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, now())) RETURNING {EXPLANATION_COLUMNS}"
        ))
        .bind(explanation.feature_id)
        .bind(explanation.description)
        .bind(explanation.explanation_model)
        .bind(explanation.type_name)
        .bind(explanation.notes)
        .bind(explanation.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(explanation_from_row(&row)?)
    }
}

#[async_trait::async_trait]
impl ActivationStore for PostgresStore {
    async fn find_activations(&self, criteria: &ActivationCriteria) -> Result<Vec<Activation>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ACTIVATION_COLUMNS} FROM activations WHERE TRUE"
        ));
        if let Some(feature_id) = criteria.feature_id {
            query.push(" AND feature_id = ").push_bind(feature_id);
        }
        if let Some(sample_id) = criteria.sample_id {
            query.push(" AND sample_id = ").push_bind(sample_id);
        }
        query.push(" ORDER BY id");
        push_limit(&mut query, criteria.limit)?;

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(activation_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }

    async fn find_activations_with_tokens(
        &self,
        feature_id: Id,
    ) -> Result<Vec<(Activation, Vec<String>)>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.feature_id, a.sample_id, a."values", s.tokens
            FROM activations a
            JOIN samples s ON s.id = a.sample_id
            WHERE a.feature_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(feature_id)
        .fetch_all(&self.pool)
        .await?;

        let mut joined = Vec::with_capacity(rows.len());
        for row in &rows {
            let tokens: Vec<String> = row.try_get("tokens")?;
            joined.push((activation_from_row(row)?, tokens));
        }
        Ok(joined)
    }

    async fn create_activation(&self, activation: NewActivation) -> Result<Activation> {
        activation.validate()?;

        let row = sqlx::query(&format!(
            r#"INSERT INTO activations (feature_id, sample_id, "values") VALUES ($1, $2, $3) RETURNING {ACTIVATION_COLUMNS}"#
        ))
        .bind(activation.feature_id)
        .bind(activation.sample_id)
        .bind(activation.values)
        .fetch_one(&self.pool)
        .await?;

        Ok(activation_from_row(&row)?)
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresStore {
    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn find_users(&self, criteria: &UserCriteria) -> Result<Vec<User>> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        if let Some(email) = &criteria.email {
            query.push(" AND email = ").push_bind(email.clone());
        }
        if let Some(name) = &criteria.name {
            query.push(" AND name = ").push_bind(name.clone());
        }
        if let Some(handle) = &criteria.handle {
            query.push(" AND handle = ").push_bind(handle.clone());
        }
        query.push(" ORDER BY id");
        push_limit(&mut query, criteria.limit)?;

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(user_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        user.validate()?;

        let row = sqlx::query(&format!(
            "INSERT INTO users (email, name, handle, image) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.email)
        .bind(user.name)
        .bind(user.handle)
        .bind(user.image)
        .fetch_one(&self.pool)
        .await?;

        Ok(user_from_row(&row)?)
    }

    async fn update_user(&self, id: Id, update: UserUpdate) -> Result<bool> {
        update.validate()?;
        if update.is_empty() {
            return Ok(self.get_user(id).await?.is_some());
        }

        let mut query = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        let mut set = query.separated(", ");
        if let Some(email) = update.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(name) = update.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(handle) = update.handle {
            set.push("handle = ").push_bind_unseparated(handle);
        }
        if let Some(image) = update.image {
            set.push("image = ").push_bind_unseparated(image);
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Id) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

#[async_trait::async_trait]
impl SessionStore for PostgresStore {
    async fn find_session_identity(&self, session_token: &str) -> Result<Option<UserIdentity>> {
        // Column casing follows the identity provider's adapter schema
        let row = sqlx::query(
            r#"
            SELECT u.id, u.handle, u.name, u.email
            FROM sessions s
            JOIN users u ON u.id = s."userId"
            WHERE s."sessionToken" = $1 AND s.expires > now()
            "#,
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UserIdentity::with_details(
            row.try_get("id")?,
            row.try_get("handle")?,
            row.try_get("name")?,
            row.try_get("email")?,
        )))
    }
}

impl Store for PostgresStore {}
