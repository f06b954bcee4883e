//! Tenant Portal REST API
//!
//! HTTP API layer built with Axum. Every route lives under `/api`.
//!
//! # Endpoints
//!
//! ## Health
//! - `GET /api/health/live` - Liveness probe
//! - `GET /api/health/ready` - Readiness probe
//! - `GET /api/health` - Full health status
//!
//! ## Auth
//! - `POST /api/auth/login` - Email/password login, returns a bearer token
//! - `POST /api/auth/logout` - Revoke the bearer token
//! - `GET /api/auth/claims` - Caller's custom claims
//! - `POST /api/auth/claims/fix` - Backfill the caller's `tenantId`
//!
//! ## Tenant resources (`orders`, `menu`, `customers`, `calls`)
//! - `GET /api/:resource` - List with `field=value`, `orderBy`, `limit`
//! - `POST /api/:resource` - Create
//! - `GET /api/:resource/:id` - Fetch
//! - `PATCH /api/:resource/:id` - Update
//! - `DELETE /api/:resource/:id` - Delete
//! - `POST /api/menu/import` - Menu CSV import
//!
//! ## Super admin
//! - `GET /api/super-admin/users` - List accounts
//! - `POST /api/super-admin/users` - Create an account
//! - `PATCH /api/super-admin/users/:uid/claims` - Replace claims
//! - `POST /api/super-admin/users/fix-claims` - Backfill `tenantId` by email
//!
//! ## WebSocket
//! - `GET /api/ws?token=…` - Live listen channel
//!
//! # Example
//!
//! ```rust,ignore
//! use tenant_portal::api::{serve, ApiConfig, AppState};
//! use tenant_portal::auth::{AuthDirectory, DirectoryConfig};
//! use tenant_portal::store::{DocumentStore, StoreConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(DocumentStore::open(StoreConfig::new("./portal_data")).await?);
//!     let auth = Arc::new(AuthDirectory::open(DirectoryConfig::default())?);
//!     let config = ApiConfig::default();
//!
//!     serve(AppState::new(store, auth, config.clone()), &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorBody, ErrorResponse};
pub use extract::{bearer_token, RequireAuth, RequireSuperAdmin};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    let api_routes = Router::new()
        // Health routes
        .route("/health", get(routes::health::full_health))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness))
        // Auth routes
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/claims", get(routes::auth::get_claims))
        .route("/auth/claims/fix", post(routes::auth::fix_own_claims))
        // Super admin routes
        .route(
            "/super-admin/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route("/super-admin/users/fix-claims", post(routes::users::fix_claims))
        .route("/super-admin/users/:uid/claims", patch(routes::users::set_claims))
        // Menu import takes a raw CSV body
        .route("/menu/import", post(routes::resources::import_menu))
        // WebSocket route
        .route("/ws", get(websocket_handler))
        // Tenant resources
        .route(
            "/:resource",
            get(routes::resources::list_documents).post(routes::resources::create_document),
        )
        .route(
            "/:resource/:id",
            get(routes::resources::get_document)
                .patch(routes::resources::update_document)
                .delete(routes::resources::delete_document),
        )
        .layer(DefaultBodyLimit::max(max_body_size));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Tenant portal API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Tenant portal API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthDirectory, DirectoryConfig, NewUser};
    use crate::store::DocumentStore;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    const ADMIN_TOKEN: &str = "test-admin-token";

    async fn create_test_app() -> (Router, Arc<AppState>) {
        let store = Arc::new(DocumentStore::in_memory());
        let auth = Arc::new(AuthDirectory::in_memory(DirectoryConfig::default()));
        auth.ensure_bootstrap_admin("root@portal.example", ADMIN_TOKEN)
            .await
            .unwrap();

        let state = AppState::new(store, auth, ApiConfig::default());
        let shared = Arc::new(state.clone());
        (build_router(state), shared)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn as_tenant(mut req: Request<Body>, tenant: &str) -> Request<Body> {
        req.headers_mut().insert("x-tenant", tenant.parse().unwrap());
        req
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _) = create_test_app().await;
        let response = app.oneshot(request("GET", "/api/health/live", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _) = create_test_app().await;
        let response = app.oneshot(request("GET", "/api/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["users"], 1);
    }

    #[tokio::test]
    async fn test_missing_token_is_401_with_error_body() {
        let (app, _) = create_test_app().await;
        let response = app.oneshot(request("GET", "/api/orders", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_token_is_401() {
        let (app, _) = create_test_app().await;
        let response = app
            .oneshot(request("GET", "/api/auth/claims", Some("nope"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_menu_crud_roundtrip() {
        let (app, _) = create_test_app().await;

        let create = as_tenant(
            request(
                "POST",
                "/api/menu",
                Some(ADMIN_TOKEN),
                Some(json!({"name": "Burger", "price": 9.99, "category": "Entrees"})),
            ),
            "restaurants/r1",
        );
        let response = app.clone().oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let list = as_tenant(
            request("GET", "/api/menu?category=Entrees&limit=5", Some(ADMIN_TOKEN), None),
            "restaurants/r1",
        );
        let body = json_body(app.clone().oneshot(list).await.unwrap()).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["documents"][0]["name"], "Burger");

        let patch = as_tenant(
            request("PATCH", &format!("/api/menu/{}", id), Some(ADMIN_TOKEN), Some(json!({"price": 11.5}))),
            "restaurants/r1",
        );
        let body = json_body(app.clone().oneshot(patch).await.unwrap()).await;
        assert_eq!(body["price"], 11.5);
        assert_eq!(body["name"], "Burger");

        let delete = as_tenant(
            request("DELETE", &format!("/api/menu/{}", id), Some(ADMIN_TOKEN), None),
            "restaurants/r1",
        );
        assert_eq!(app.clone().oneshot(delete).await.unwrap().status(), StatusCode::OK);

        let get = as_tenant(
            request("GET", &format!("/api/menu/{}", id), Some(ADMIN_TOKEN), None),
            "restaurants/r1",
        );
        assert_eq!(app.oneshot(get).await.unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_rejected_before_store() {
        let (app, state) = create_test_app().await;

        let create = as_tenant(
            request(
                "POST",
                "/api/customers",
                Some(ADMIN_TOKEN),
                Some(json!({"name": "Ana", "phone": "call me maybe"})),
            ),
            "offices/o1",
        );
        let response = app.oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store.stats().await.document_count, 0);
    }

    #[tokio::test]
    async fn test_resource_not_available_for_vertical() {
        let (app, _) = create_test_app().await;
        let req = as_tenant(request("GET", "/api/orders", Some(ADMIN_TOKEN), None), "offices/o1");
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_menu_import() {
        let (app, state) = create_test_app().await;

        let csv = "name,price,category,tags\nBurger,9.99,Entrees,\"beef;grill\"\n,3,Sides,\nFries,3.5,Sides,";
        let mut req = Request::builder()
            .method("POST")
            .uri("/api/menu/import")
            .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
            .header("Content-Type", "text/csv")
            .body(Body::from(csv))
            .unwrap();
        req.headers_mut().insert("x-tenant", "restaurants/r1".parse().unwrap());

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body, json!({"imported": 2, "skipped": 1}));
        assert_eq!(state.store.stats().await.document_count, 2);
    }

    #[tokio::test]
    async fn test_tenant_login_claims_and_fix() {
        let (app, state) = create_test_app().await;
        state
            .auth
            .create_user(NewUser {
                email: "owner@luigis.example".to_string(),
                password: "secret123".to_string(),
                display_name: None,
                claims: json!({"role": "admin", "restaurantId": "r1"}).as_object().cloned().unwrap(),
            })
            .await
            .unwrap();

        let login = request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "owner@luigis.example", "password": "secret123"})),
        );
        let response = app.clone().oneshot(login).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let token = json_body(response).await["token"].as_str().unwrap().to_string();

        let fix = request("POST", "/api/auth/claims/fix", Some(&token), None);
        let body = json_body(app.clone().oneshot(fix).await.unwrap()).await;
        assert_eq!(body["changed"], true);
        assert_eq!(body["claims"]["tenantId"], "r1");

        let fix = request("POST", "/api/auth/claims/fix", Some(&token), None);
        let body = json_body(app.clone().oneshot(fix).await.unwrap()).await;
        assert_eq!(body["changed"], false);

        let users = request("GET", "/api/super-admin/users", Some(&token), None);
        assert_eq!(app.clone().oneshot(users).await.unwrap().status(), StatusCode::FORBIDDEN);

        let other_tenant = as_tenant(request("GET", "/api/menu", Some(&token), None), "restaurants/r2");
        let body = json_body(app.clone().oneshot(other_tenant).await.unwrap()).await;
        assert_eq!(body["total"], 0);

        let logout = request("POST", "/api/auth/logout", Some(&token), None);
        assert_eq!(app.clone().oneshot(logout).await.unwrap().status(), StatusCode::OK);
        let claims = request("GET", "/api/auth/claims", Some(&token), None);
        assert_eq!(app.oneshot(claims).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_super_admin_claims_management() {
        let (app, _) = create_test_app().await;

        let create = request(
            "POST",
            "/api/super-admin/users",
            Some(ADMIN_TOKEN),
            Some(json!({"email": "agent@homes.example", "password": "secret123", "claims": {"agentId": "a1"}})),
        );
        let response = app.clone().oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let uid = json_body(response).await["uid"].as_str().unwrap().to_string();

        let duplicate = request(
            "POST",
            "/api/super-admin/users",
            Some(ADMIN_TOKEN),
            Some(json!({"email": "Agent@Homes.example", "password": "secret456"})),
        );
        let response = app.clone().oneshot(duplicate).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"]["code"], "EMAIL_TAKEN");

        let fix = request(
            "POST",
            "/api/super-admin/users/fix-claims",
            Some(ADMIN_TOKEN),
            Some(json!({"email": "agent@homes.example"})),
        );
        let body = json_body(app.clone().oneshot(fix).await.unwrap()).await;
        assert_eq!(body["changed"], true);
        assert_eq!(body["user"]["claims"]["tenantId"], "a1");

        let set = request(
            "PATCH",
            &format!("/api/super-admin/users/{}/claims", uid),
            Some(ADMIN_TOKEN),
            Some(json!({"claims": {"role": "staff", "agentId": "a1", "tenantId": "a1"}})),
        );
        let body = json_body(app.clone().oneshot(set).await.unwrap()).await;
        assert_eq!(body["claims"]["role"], "staff");

        let list = request("GET", "/api/super-admin/users", Some(ADMIN_TOKEN), None);
        let body = json_body(app.oneshot(list).await.unwrap()).await;
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_logout_closes_open_sockets() {
        let (app, state) = create_test_app().await;
        let admin = state.auth.resolve(ADMIN_TOKEN).await.unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        state.ws_hub.register(&admin, ADMIN_TOKEN, tx).await.unwrap();

        let logout = request("POST", "/api/auth/logout", Some(ADMIN_TOKEN), None);
        assert_eq!(app.oneshot(logout).await.unwrap().status(), StatusCode::OK);

        let msg = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(matches!(msg, Some(crate::websocket::ServerMessage::Error { .. })));
        assert_eq!(state.ws_hub.connection_count().await, 0);
    }
}
