//! Auth Routes
//!
//! - POST /api/auth/login - Exchange email/password for a bearer token
//! - POST /api/auth/logout - Revoke the caller's token
//! - GET /api/auth/claims - The caller's claims, role and tenant
//! - POST /api/auth/claims/fix - Backfill `tenantId` on the caller's claims

use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use crate::api::dto::{ClaimsFixResponse, ClaimsResponse, LoginRequest, LogoutResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{bearer_token, RequireAuth};
use crate::api::state::AppState;
use crate::auth::LoginSession;
use crate::validation::require;

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginSession>> {
    let email = require("email", Some(&req.email))?;
    require("password", Some(&req.password))?;

    let session = state.auth.login(email, &req.password).await?;
    Ok(Json(session))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Json<LogoutResponse>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let logged_out = state.auth.logout(token).await;
    Ok(Json(LogoutResponse { logged_out }))
}

/// GET /api/auth/claims
pub async fn get_claims(RequireAuth(user): RequireAuth) -> Json<ClaimsResponse> {
    Json(ClaimsResponse {
        uid: user.uid,
        email: user.email,
        claims: user.claims,
        role: user.role,
        tenant: user.tenant,
    })
}

/// POST /api/auth/claims/fix
///
/// Idempotent: a second call reports `changed: false`.
pub async fn fix_own_claims(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<Json<ClaimsFixResponse>> {
    let (info, changed) = state.auth.fix_user_claims(&user.email).await?;
    Ok(Json(ClaimsFixResponse {
        claims: info.claims,
        changed,
    }))
}
