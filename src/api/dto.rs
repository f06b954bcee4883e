//! Data Transfer Objects
//!
//! Request and response types for the API endpoints, shared with the
//! REST client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::{Claims, Role, Tenant, UserInfo};

// ============================================
// AUTH DTOs
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// The caller's claims as resolved by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsResponse {
    pub uid: String,
    pub email: String,
    pub claims: Claims,
    pub role: Option<Role>,
    pub tenant: Option<Tenant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsFixResponse {
    pub claims: Claims,
    pub changed: bool,
}

// ============================================
// RESOURCE DTOs
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    /// Documents with their `id` inlined
    pub documents: Vec<Value>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// `POST /menu/import` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub skipped: usize,
}

// ============================================
// SUPER ADMIN DTOs
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserInfo>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetClaimsRequest {
    pub claims: Claims,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixClaimsRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixClaimsResponse {
    pub user: UserInfo,
    pub changed: bool,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded"
    pub status: String,
    pub store: String,
    pub collections: usize,
    pub documents: usize,
    pub users: usize,
    pub ws_connections: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
