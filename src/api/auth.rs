//! Login endpoint and the two gates every protected route passes through.
//!
//! The auth gate verifies the bearer token and stores the caller's
//! [`Identity`] in the request extensions. The role gate, layered per route,
//! then checks that identity against the route's allow-list.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use tracing::warn;

use super::error::ApiError;
use super::extract::ApiJson;
use crate::auth::Identity;
use crate::db::{LoginRequest, LoginResponse, Role};
use crate::AppState;

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = state.auth.login(&request.username, &request.password).await?;
    Ok(Json(LoginResponse { token }))
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
///
/// The value must be exactly two space-separated parts, the first being the
/// literal `Bearer`.
fn bearer_token(value: &str) -> Option<&str> {
    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Auth gate: reject with 401 unless the request carries a valid token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization header"))?;

    let token = bearer_token(header_value)
        .ok_or_else(|| ApiError::unauthorized("Authorization header must be 'Bearer <token>'"))?;

    let identity = state.auth.authenticate(token)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Role gate: reject with 403 unless the authenticated role is allow-listed.
///
/// A request that reaches this gate without an identity is rejected as well.
pub async fn role_gate(
    State(allowed): State<&'static [Role]>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(identity) = request.extensions().get::<Identity>() else {
        warn!(path = %request.uri().path(), "Role gate reached without an authenticated identity");
        return Err(ApiError::forbidden("Access denied"));
    };

    if !allowed.contains(&identity.role) {
        return Err(ApiError::forbidden(format!(
            "Role '{}' may not access this resource",
            identity.role
        )));
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
