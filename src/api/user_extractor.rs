use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::sync::Arc;

use crate::api::handlers::SharedState;
use crate::model::{parse_id, UserIdentity};
use crate::store::traits::{SessionStore, Store};

/// Consumed interface: turn a request into the identity of a valid session, if any.
///
/// Absence or failure is a normal `None`, never an error.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve_session(&self, parts: &Parts) -> Option<UserIdentity>;
}

/// Trusts identity headers injected by a fronting auth proxy:
/// - X-User-Id: Required numeric user identifier
/// - X-User-Handle: Optional public handle
/// - X-User-Name: Optional display name
/// - X-User-Email: Optional email
#[derive(Debug, Clone, Default)]
pub struct HeaderSessionResolver;

#[async_trait]
impl SessionResolver for HeaderSessionResolver {
    async fn resolve_session(&self, parts: &Parts) -> Option<UserIdentity> {
        identity_from_headers(&parts.headers)
    }
}

/// Looks the session cookie up in the identity provider's session table
pub struct CookieSessionResolver<S: SessionStore> {
    store: Arc<S>,
    cookie_name: String,
}

impl<S: SessionStore> CookieSessionResolver<S> {
    pub fn new(store: Arc<S>, cookie_name: impl Into<String>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
        }
    }
}

#[async_trait]
impl<S: SessionStore> SessionResolver for CookieSessionResolver<S> {
    async fn resolve_session(&self, parts: &Parts) -> Option<UserIdentity> {
        let token = session_token(&parts.headers, &self.cookie_name)?;
        match self.store.find_session_identity(&token).await {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!("session lookup failed, treating request as anonymous: {}", e);
                None
            }
        }
    }
}

/// The session resolved for the current request, before any gate decision
#[derive(Debug, Clone, PartialEq)]
pub struct Session(pub Option<UserIdentity>);

impl Session {
    pub fn identity(&self) -> Option<&UserIdentity> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S: Store + 'static> FromRequestParts<SharedState<S>> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState<S>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Session(state.sessions.resolve_session(parts).await))
    }
}

fn identity_from_headers(headers: &HeaderMap) -> Option<UserIdentity> {
    let user_id = parse_id(&extract_header_value(headers, "x-user-id")?).ok()?;

    Some(UserIdentity::with_details(
        user_id,
        extract_header_value(headers, "x-user-handle"),
        extract_header_value(headers, "x-user-name"),
        extract_header_value(headers, "x-user-email"),
    ))
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}

/// Find the session token under `cookie_name` or its `__Secure-` prefixed variant
fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let secure_name = format!("__Secure-{}", cookie_name);

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name || *name == secure_name)
        .map(|(_, token)| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
