use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::user_extractor::{Session, SessionResolver};
use crate::error::Error;
use crate::logic::{AccessGate, Explorer};
use crate::model::{
    parse_id, ActivationView, Dataset, DatasetCriteria, DatasetUpdate, Explanation, Feature,
    FeatureCriteria, FeatureUpdate, FeatureWithExplanation, NewDataset, NewFeature, Sample, User,
    UserCriteria, UserUpdate,
};
use crate::store::traits::Store;

/// Everything a request handler needs: the explorer over the store and the way sessions
/// are resolved for this deployment
pub struct AppState<S: Store> {
    pub explorer: Explorer<S>,
    pub sessions: Arc<dyn SessionResolver>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: Arc<S>, sessions: Arc<dyn SessionResolver>) -> Self {
        Self {
            explorer: Explorer::new(store),
            sessions,
        }
    }
}

pub type SharedState<S> = Arc<AppState<S>>;

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Alignment { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Store(message) => {
                log::error!("store failure: {}", message);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorResponse::new(&e.to_string())))
    }
}

fn body<T>(payload: Result<RequestJson<T>, JsonRejection>) -> Result<T, Error> {
    payload
        .map(|RequestJson(value)| value)
        .map_err(|rejection| Error::validation(rejection.body_text()))
}

fn criteria<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Error> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| Error::validation(rejection.body_text()))
}

// --- Session ---

pub async fn get_current_user<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
) -> ApiResult<User> {
    Ok(Json(state.explorer.current_user(session.identity()).await?))
}

// Handlers below run the gate before parsing ids or bodies, so anonymous callers get 401
// even for malformed input. The explorer checks again before touching the store.

// --- Datasets ---

pub async fn list_datasets<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    query: Result<Query<DatasetCriteria>, QueryRejection>,
) -> ApiResult<ListResponse<Dataset>> {
    AccessGate::check(session.identity())?;
    let criteria = criteria(query)?;
    let datasets = state
        .explorer
        .find_datasets(session.identity(), &criteria)
        .await?;
    Ok(Json(datasets.into()))
}

pub async fn create_dataset<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    payload: Result<RequestJson<NewDataset>, JsonRejection>,
) -> Result<(StatusCode, Json<Dataset>), ApiError> {
    AccessGate::check(session.identity())?;
    let new_dataset = body(payload)?;
    let dataset = state
        .explorer
        .create_dataset(session.identity(), new_dataset)
        .await?;
    Ok((StatusCode::CREATED, Json(dataset)))
}

pub async fn get_dataset<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(dataset_id): Path<String>,
) -> ApiResult<Dataset> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&dataset_id)?;
    Ok(Json(state.explorer.get_dataset(session.identity(), id).await?))
}

pub async fn update_dataset<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(dataset_id): Path<String>,
    payload: Result<RequestJson<DatasetUpdate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&dataset_id)?;
    let update = body(payload)?;
    state
        .explorer
        .update_dataset(session.identity(), id, update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_dataset<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(dataset_id): Path<String>,
) -> ApiResult<Dataset> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&dataset_id)?;
    Ok(Json(state.explorer.delete_dataset(session.identity(), id).await?))
}

pub async fn list_dataset_samples<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(dataset_id): Path<String>,
) -> ApiResult<ListResponse<Sample>> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&dataset_id)?;
    let samples = state
        .explorer
        .list_samples_for_dataset(session.identity(), id)
        .await?;
    Ok(Json(samples.into()))
}

// --- Samples ---

pub async fn get_sample<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(sample_id): Path<String>,
) -> ApiResult<Sample> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&sample_id)?;
    Ok(Json(state.explorer.get_sample(session.identity(), id).await?))
}

pub async fn list_sample_activations<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(sample_id): Path<String>,
) -> ApiResult<ListResponse<ActivationView>> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&sample_id)?;
    let views = state
        .explorer
        .sample_activation_views(session.identity(), id)
        .await?;
    Ok(Json(views.into()))
}

// --- Features ---

pub async fn list_features<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    query: Result<Query<FeatureCriteria>, QueryRejection>,
) -> ApiResult<ListResponse<FeatureWithExplanation>> {
    AccessGate::check(session.identity())?;
    let criteria = criteria(query)?;
    let features = state
        .explorer
        .find_features(session.identity(), &criteria)
        .await?;
    Ok(Json(features.into()))
}

pub async fn create_feature<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    payload: Result<RequestJson<NewFeature>, JsonRejection>,
) -> Result<(StatusCode, Json<Feature>), ApiError> {
    AccessGate::check(session.identity())?;
    let new_feature = body(payload)?;
    let feature = state
        .explorer
        .create_feature(session.identity(), new_feature)
        .await?;
    Ok((StatusCode::CREATED, Json(feature)))
}

pub async fn get_feature<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(feature_id): Path<String>,
) -> ApiResult<FeatureWithExplanation> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&feature_id)?;
    Ok(Json(state.explorer.get_feature(session.identity(), id).await?))
}

pub async fn update_feature<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(feature_id): Path<String>,
    payload: Result<RequestJson<FeatureUpdate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&feature_id)?;
    let update = body(payload)?;
    state
        .explorer
        .update_feature(session.identity(), id, update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_feature<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(feature_id): Path<String>,
) -> ApiResult<Feature> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&feature_id)?;
    Ok(Json(state.explorer.delete_feature(session.identity(), id).await?))
}

pub async fn list_feature_explanations<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(feature_id): Path<String>,
) -> ApiResult<ListResponse<Explanation>> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&feature_id)?;
    let history = state
        .explorer
        .explanation_history(session.identity(), id)
        .await?;
    Ok(Json(history.into()))
}

pub async fn list_feature_activations<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(feature_id): Path<String>,
) -> ApiResult<ListResponse<ActivationView>> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&feature_id)?;
    let views = state
        .explorer
        .feature_activation_views(session.identity(), id)
        .await?;
    Ok(Json(views.into()))
}

// --- Users ---

pub async fn list_users<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    query: Result<Query<UserCriteria>, QueryRejection>,
) -> ApiResult<ListResponse<User>> {
    AccessGate::check(session.identity())?;
    let criteria = criteria(query)?;
    let users = state
        .explorer
        .find_users(session.identity(), &criteria)
        .await?;
    Ok(Json(users.into()))
}

pub async fn get_user<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(user_id): Path<String>,
) -> ApiResult<User> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&user_id)?;
    Ok(Json(state.explorer.get_user(session.identity(), id).await?))
}

pub async fn update_user<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(user_id): Path<String>,
    payload: Result<RequestJson<UserUpdate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&user_id)?;
    let update = body(payload)?;
    state
        .explorer
        .update_user(session.identity(), id, update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    session: Session,
    Path(user_id): Path<String>,
) -> ApiResult<User> {
    AccessGate::check(session.identity())?;
    let id = parse_id(&user_id)?;
    Ok(Json(state.explorer.delete_user(session.identity(), id).await?))
}
