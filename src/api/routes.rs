use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::handlers::{self, SharedState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<SharedState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session
        .route("/me", get(handlers::get_current_user::<S>))
        // Datasets and their samples
        .route(
            "/datasets",
            get(handlers::list_datasets::<S>).post(handlers::create_dataset::<S>),
        )
        .route(
            "/datasets/:dataset_id",
            get(handlers::get_dataset::<S>)
                .patch(handlers::update_dataset::<S>)
                .delete(handlers::delete_dataset::<S>),
        )
        .route(
            "/datasets/:dataset_id/samples",
            get(handlers::list_dataset_samples::<S>),
        )
        // Samples
        .route("/samples/:sample_id", get(handlers::get_sample::<S>))
        .route(
            "/samples/:sample_id/activations",
            get(handlers::list_sample_activations::<S>),
        )
        // Features, explanations, activations
        .route(
            "/features",
            get(handlers::list_features::<S>).post(handlers::create_feature::<S>),
        )
        .route(
            "/features/:feature_id",
            get(handlers::get_feature::<S>)
                .patch(handlers::update_feature::<S>)
                .delete(handlers::delete_feature::<S>),
        )
        .route(
            "/features/:feature_id/explanations",
            get(handlers::list_feature_explanations::<S>),
        )
        .route(
            "/features/:feature_id/activations",
            get(handlers::list_feature_activations::<S>),
        )
        // Users
        .route("/users", get(handlers::list_users::<S>))
        .route(
            "/users/:user_id",
            get(handlers::get_user::<S>)
                .patch(handlers::update_user::<S>)
                .delete(handlers::delete_user::<S>),
        )
}

/// CORS for the browser dashboard. Origins that are not valid header values are skipped.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}
