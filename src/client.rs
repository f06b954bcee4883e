//! Portal REST Client
//!
//! Thin HTTP client over the `/api` surface. Every request carries the
//! bearer token when one is set. Failures are terminal: nothing is
//! retried, and a 401 tells the caller where to send the user unless they
//! are already on a public page.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::api::dto::{
    ClaimsFixResponse, ClaimsResponse, DeleteResponse, DocumentListResponse, FixClaimsRequest,
    FixClaimsResponse, HealthResponse, ImportResponse, LoginRequest, LogoutResponse,
    SetClaimsRequest, UserListResponse,
};
use crate::api::ErrorResponse;
use crate::auth::{Claims, LoginSession, NewUser, UserInfo};

/// Routes reachable without a session
pub const PUBLIC_ROUTES: [&str; 6] = [
    "/login",
    "/signup",
    "/forgot-password",
    "/reset-password",
    "/pricing",
    "/",
];

/// Where unauthenticated users are sent
pub const LOGIN_ROUTE: &str = "/login";

/// Whether `route` is a public page
///
/// Query strings and trailing slashes are ignored; `/` only matches
/// itself, other entries also cover their sub-paths.
pub fn is_public_route(route: &str) -> bool {
    let path = route.split(['?', '#']).next().unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    PUBLIC_ROUTES.iter().any(|public| {
        path == *public || (*public != "/" && path.starts_with(&format!("{}/", public)))
    })
}

/// Login redirect for a 401 seen while on `current_route`
pub fn login_redirect(current_route: Option<&str>) -> Option<String> {
    match current_route {
        Some(route) if is_public_route(route) => None,
        _ => Some(LOGIN_ROUTE.to_string()),
    }
}

/// Errors returned by the client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Session missing or expired; `redirect` is where the user should go
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        message: String,
        redirect: Option<String>,
    },

    /// Any other non-2xx response, with the server's message when present
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Cannot reach the portal API at {0}")]
    Unavailable(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Map a non-2xx response to an error
pub fn error_from_response(status: StatusCode, body: &str, current_route: Option<&str>) -> ClientError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .ok()
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    if status == StatusCode::UNAUTHORIZED {
        return ClientError::Unauthenticated {
            message,
            redirect: login_redirect(current_route),
        };
    }

    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

/// REST client for the tenant portal API
#[derive(Debug, Clone)]
pub struct PortalClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    current_route: Option<String>,
}

impl PortalClient {
    /// `base_url` is the server origin, e.g. `http://localhost:8080`
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            current_route: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Page the caller is on, used for the 401 redirect decision
    pub fn with_route(mut self, route: &str) -> Self {
        self.current_route = Some(route.to_string());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else if e.is_connect() {
                ClientError::Unavailable(self.base_url.clone())
            } else {
                ClientError::Request(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "API request failed");
        Err(error_from_response(status, &body, self.current_route.as_deref()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> ClientResult<T> {
        self.send(self.client.get(self.url(path)).query(query)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.send(self.client.patch(self.url(path)).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(self.client.delete(self.url(path))).await
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    pub async fn health(&self) -> ClientResult<HealthResponse> {
        self.get("/health").await
    }

    /// Log in and keep the issued token for later requests
    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<LoginSession> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session: LoginSession = self.post("/auth/login", &body).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn logout(&mut self) -> ClientResult<LogoutResponse> {
        let response = self.post("/auth/logout", &Value::Null).await;
        self.token = None;
        response
    }

    pub async fn claims(&self) -> ClientResult<ClaimsResponse> {
        self.get("/auth/claims").await
    }

    pub async fn fix_own_claims(&self) -> ClientResult<ClaimsFixResponse> {
        self.post("/auth/claims/fix", &Value::Null).await
    }

    pub async fn list_documents(&self, resource: &str, query: &[(String, String)]) -> ClientResult<DocumentListResponse> {
        self.get_with_query(resource, query).await
    }

    pub async fn create_document(&self, resource: &str, fields: &Value) -> ClientResult<Value> {
        self.post(resource, fields).await
    }

    pub async fn update_document(&self, resource: &str, id: &str, fields: &Value) -> ClientResult<Value> {
        self.patch(&format!("{}/{}", resource, urlencoding::encode(id)), fields).await
    }

    pub async fn delete_document(&self, resource: &str, id: &str) -> ClientResult<DeleteResponse> {
        self.delete(&format!("{}/{}", resource, urlencoding::encode(id))).await
    }

    /// Upload menu CSV text
    pub async fn import_menu(&self, csv: String) -> ClientResult<ImportResponse> {
        let request = self
            .client
            .post(self.url("/menu/import"))
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(csv);
        self.send(request).await
    }

    pub async fn list_users(&self) -> ClientResult<UserListResponse> {
        self.get("/super-admin/users").await
    }

    pub async fn create_user(&self, user: &NewUser) -> ClientResult<UserInfo> {
        self.post("/super-admin/users", user).await
    }

    pub async fn set_claims(&self, uid: &str, claims: Claims) -> ClientResult<UserInfo> {
        let path = format!("/super-admin/users/{}/claims", urlencoding::encode(uid));
        self.patch(&path, &SetClaimsRequest { claims }).await
    }

    pub async fn fix_user_claims(&self, email: &str) -> ClientResult<FixClaimsResponse> {
        let body = FixClaimsRequest {
            email: email.to_string(),
        };
        self.post("/super-admin/users/fix-claims", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        for route in ["/login", "/signup", "/forgot-password", "/reset-password/abc123", "/pricing/", "/", "/login?next=%2Forders"] {
            assert!(is_public_route(route), "{}", route);
        }
        for route in ["/orders", "/dashboard", "/super-admin/users", "/loginx"] {
            assert!(!is_public_route(route), "{}", route);
        }
    }

    #[test]
    fn test_401_redirects_unless_public() {
        let err = error_from_response(StatusCode::UNAUTHORIZED, "", Some("/orders"));
        assert!(matches!(err, ClientError::Unauthenticated { redirect: Some(ref r), .. } if r == "/login"));

        let err = error_from_response(StatusCode::UNAUTHORIZED, "", Some("/pricing"));
        assert!(matches!(err, ClientError::Unauthenticated { redirect: None, .. }));

        let err = error_from_response(StatusCode::UNAUTHORIZED, "", None);
        assert!(matches!(err, ClientError::Unauthenticated { redirect: Some(_), .. }));
    }

    #[test]
    fn test_server_message_surfaced() {
        let body = r#"{"error":{"code":"VALIDATION_ERROR","message":"Validation error: phone: is not a valid phone number"},"request_id":"r-1"}"#;
        match error_from_response(StatusCode::BAD_REQUEST, body, None) {
            ClientError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Validation error: phone: is not a valid phone number");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fallback_messages() {
        match error_from_response(StatusCode::BAD_GATEWAY, "upstream down", None) {
            ClientError::Api { message, .. } => assert_eq!(message, "upstream down"),
            other => panic!("unexpected {:?}", other),
        }
        match error_from_response(StatusCode::NOT_FOUND, "", None) {
            ClientError::Api { message, .. } => assert_eq!(message, "Not Found"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_url_building() {
        let client = PortalClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.url("/orders"), "http://localhost:8080/api/orders");
        assert_eq!(client.url("menu/import"), "http://localhost:8080/api/menu/import");
    }
}
