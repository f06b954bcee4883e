//! Authentication extractors
//!
//! Handlers take `RequireAuth` or `RequireSuperAdmin` to demand a valid
//! bearer token; rejections are regular `ApiError` JSON responses.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::AuthUser;

/// Token from an `Authorization: Bearer …` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Extractor that requires a valid session
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> String {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub AuthUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let user = state.auth.resolve(token).await?;
        Ok(Self(user))
    }
}

/// Extractor that requires a super admin session
///
/// Not logged in → 401, logged in without the `super_admin` role → 403.
pub struct RequireSuperAdmin(pub AuthUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireSuperAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_super_admin() {
            return Err(ApiError::Forbidden("Super admin access required".to_string()));
        }
        Ok(Self(user))
    }
}
