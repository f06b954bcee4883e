//! Super Admin User Routes
//!
//! - GET /api/super-admin/users - List every account
//! - POST /api/super-admin/users - Create an account
//! - PATCH /api/super-admin/users/:uid/claims - Replace custom claims
//! - POST /api/super-admin/users/fix-claims - Backfill `tenantId` by email

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{FixClaimsRequest, FixClaimsResponse, SetClaimsRequest, UserListResponse};
use crate::api::error::ApiResult;
use crate::api::extract::RequireSuperAdmin;
use crate::api::state::AppState;
use crate::auth::{NewUser, UserInfo};
use crate::validation::require;

/// GET /api/super-admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
) -> Json<UserListResponse> {
    let users = state.auth.list_users().await;
    Json(UserListResponse {
        total: users.len(),
        users,
    })
}

/// POST /api/super-admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Json(req): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<UserInfo>)> {
    let user = state.auth.create_user(req).await?;
    tracing::info!(admin = %admin.uid, uid = %user.uid, "User created by super admin");
    Ok((StatusCode::CREATED, Json(user)))
}

/// PATCH /api/super-admin/users/:uid/claims
pub async fn set_claims(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    Path(uid): Path<String>,
    Json(req): Json<SetClaimsRequest>,
) -> ApiResult<Json<UserInfo>> {
    let user = state.auth.set_claims(&uid, req.claims).await?;
    Ok(Json(user))
}

/// POST /api/super-admin/users/fix-claims
pub async fn fix_claims(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    Json(req): Json<FixClaimsRequest>,
) -> ApiResult<Json<FixClaimsResponse>> {
    let email = require("email", Some(&req.email))?;
    let (user, changed) = state.auth.fix_user_claims(email).await?;
    Ok(Json(FixClaimsResponse { user, changed }))
}
