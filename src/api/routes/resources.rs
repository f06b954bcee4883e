//! Tenant Resource Routes
//!
//! CRUD over the caller's tenant collections.
//!
//! - GET /api/:resource - List, with `field=value`, `orderBy=field[:asc|desc]`, `limit=n`
//! - POST /api/:resource - Create
//! - GET /api/:resource/:id - Fetch one
//! - PATCH /api/:resource/:id - Shallow merge
//! - DELETE /api/:resource/:id - Delete
//! - POST /api/menu/import - Bulk create menu items from CSV
//!
//! `:resource` is one of `orders`, `menu`, `customers`, `calls`. Super
//! admins may address another tenant with an `X-Tenant: {root}/{id}` header.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::dto::{DeleteResponse, DocumentListResponse, ImportResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::RequireAuth;
use crate::api::state::AppState;
use crate::auth::{AuthUser, Tenant, TenantKind};
use crate::import::MenuCsvImporter;
use crate::store::{Direction, DocPath, Fields, FilterOp, OrderBy, QueryOptions, WhereClause};
use crate::validation::{require_str, validate_email, validate_phone, validate_price, ValidationError};

pub const TENANT_HEADER: &str = "x-tenant";

/// A tenant-scoped collection exposed over REST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Orders,
    Menu,
    Customers,
    Calls,
}

impl Resource {
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Orders => "orders",
            Resource::Menu => "menu",
            Resource::Customers => "customers",
            Resource::Calls => "calls",
        }
    }

    /// Whether tenants of `kind` carry this collection
    pub fn allowed_for(&self, kind: TenantKind) -> bool {
        match self {
            Resource::Orders | Resource::Menu => kind == TenantKind::Restaurant,
            Resource::Calls => matches!(kind, TenantKind::Office | TenantKind::Agent),
            Resource::Customers => true,
        }
    }

    /// Required fields on create
    fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Resource::Orders => &["customerName"],
            Resource::Menu => &["name", "category"],
            Resource::Customers => &["name", "phone"],
            Resource::Calls => &["callerPhone"],
        }
    }

    /// Check a full record before it is created
    pub fn validate_create(&self, fields: &Fields) -> Result<(), ValidationError> {
        for field in self.required_fields() {
            require_str(fields, field)?;
        }
        if *self == Resource::Menu && !fields.contains_key("price") {
            return Err(ValidationError::new("price", "is required"));
        }
        self.validate_present(fields)
    }

    /// Check the fields a patch carries
    pub fn validate_patch(&self, fields: &Fields) -> Result<(), ValidationError> {
        for field in self.required_fields() {
            if fields.contains_key(*field) {
                require_str(fields, field)?;
            }
        }
        self.validate_present(fields)
    }

    fn validate_present(&self, fields: &Fields) -> Result<(), ValidationError> {
        for (field, value) in fields {
            match field.as_str() {
                "phone" | "callerPhone" | "customerPhone" if !value.is_null() => {
                    let phone = value
                        .as_str()
                        .ok_or_else(|| ValidationError::new(field, "must be a string"))?;
                    validate_phone(phone).map_err(|e| ValidationError::new(field, e.message))?;
                }
                "email" if !value.is_null() => {
                    let email = value
                        .as_str()
                        .ok_or_else(|| ValidationError::new(field, "must be a string"))?;
                    validate_email(email)?;
                }
                "price" | "total" => {
                    let amount = value
                        .as_f64()
                        .ok_or_else(|| ValidationError::new(field, "must be a number"))?;
                    validate_price(amount).map_err(|e| ValidationError::new(field, e.message))?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orders" => Ok(Resource::Orders),
            "menu" => Ok(Resource::Menu),
            "customers" => Ok(Resource::Customers),
            "calls" => Ok(Resource::Calls),
            other => Err(ApiError::NotFound(format!("Unknown resource '{}'", other))),
        }
    }
}

/// The tenant a request acts on
fn request_tenant(user: &AuthUser, headers: &HeaderMap) -> ApiResult<Tenant> {
    if user.is_super_admin() {
        if let Some(value) = headers.get(TENANT_HEADER).and_then(|v| v.to_str().ok()) {
            let (root, id) = value
                .trim()
                .trim_matches('/')
                .split_once('/')
                .ok_or_else(|| ApiError::Validation(format!("Invalid {} header: {}", TENANT_HEADER, value)))?;
            let kind = root.parse::<TenantKind>().map_err(ApiError::Validation)?;
            if id.is_empty() || id.contains('/') {
                return Err(ApiError::Validation(format!("Invalid {} header: {}", TENANT_HEADER, value)));
            }
            return Ok(Tenant {
                kind,
                id: id.to_string(),
            });
        }
    }

    user.tenant
        .clone()
        .ok_or_else(|| ApiError::Forbidden("No tenant associated with this account".to_string()))
}

/// `{root}/{tenantId}/{resource}` for the caller
fn resource_collection(user: &AuthUser, headers: &HeaderMap, resource: Resource) -> ApiResult<DocPath> {
    let tenant = request_tenant(user, headers)?;
    if !resource.allowed_for(tenant.kind) {
        return Err(ApiError::Forbidden(format!(
            "{} are not available for {} accounts",
            resource, tenant.kind
        )));
    }
    Ok(tenant.collection(resource.name())?)
}

/// Query-string value as the most specific JSON type it spells
fn parse_param_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(n) = raw.parse::<i64>() {
                return Value::from(n);
            }
            match raw.parse::<f64>() {
                Ok(f) if f.is_finite() => Value::from(f),
                _ => Value::String(raw.to_string()),
            }
        }
    }
}

/// Build query options from list parameters
///
/// `orderBy` and `limit` are reserved; every other pair is an equality
/// filter. A value that reads as a number, bool or null also matches its
/// literal string form.
pub fn query_options_from_params(params: &[(String, String)], max_limit: usize) -> ApiResult<QueryOptions> {
    let mut options = QueryOptions::new();

    for (key, raw) in params {
        match key.as_str() {
            "orderBy" => {
                for spec in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    let (field, direction) = match spec.split_once(':') {
                        Some((field, dir)) => (field, dir.parse::<Direction>()?),
                        None => (spec, Direction::Asc),
                    };
                    options.order_by.push(OrderBy {
                        field: field.to_string(),
                        direction,
                    });
                }
            }
            "limit" => {
                let limit: usize = raw
                    .parse()
                    .map_err(|_| ApiError::Validation(format!("limit must be a positive integer, got '{}'", raw)))?;
                if limit == 0 || limit > max_limit {
                    return Err(ApiError::Validation(format!("limit must be between 1 and {}", max_limit)));
                }
                options.limit = Some(limit);
            }
            field => {
                let value = parse_param_value(raw);
                let clause = if value.is_string() {
                    WhereClause::new(field, FilterOp::Eq, value)
                } else {
                    WhereClause::new(field, FilterOp::In, vec![value, Value::String(raw.clone())])
                };
                options.filters.push(clause);
            }
        }
    }

    Ok(options)
}

fn body_fields(body: Value) -> ApiResult<Fields> {
    match body {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        _ => Err(ApiError::Validation("Request body must be a JSON object".to_string())),
    }
}

/// GET /api/:resource
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(resource): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> ApiResult<Json<DocumentListResponse>> {
    let resource: Resource = resource.parse()?;
    let collection = resource_collection(&user, &headers, resource)?;
    let options = query_options_from_params(&params, state.config.max_list_limit)?;

    let documents: Vec<Value> = state
        .store
        .list(&collection, &options)
        .await?
        .iter()
        .map(|doc| doc.to_json())
        .collect();

    Ok(Json(DocumentListResponse {
        total: documents.len(),
        documents,
    }))
}

/// POST /api/:resource
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(resource): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let resource: Resource = resource.parse()?;
    let collection = resource_collection(&user, &headers, resource)?;
    let fields = body_fields(body)?;
    resource.validate_create(&fields)?;

    let doc = state.store.add(&collection, fields).await?;
    tracing::info!(uid = %user.uid, path = %doc.path, "Document created");

    Ok((StatusCode::CREATED, Json(doc.to_json())))
}

/// GET /api/:resource/:id
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let resource: Resource = resource.parse()?;
    let path = resource_collection(&user, &headers, resource)?.child(&id)?;

    let doc = state
        .store
        .get(&path)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} '{}' not found", resource, id)))?;

    Ok(Json(doc.to_json()))
}

/// PATCH /api/:resource/:id
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let resource: Resource = resource.parse()?;
    let path = resource_collection(&user, &headers, resource)?.child(&id)?;
    let fields = body_fields(body)?;
    resource.validate_patch(&fields)?;

    let doc = state.store.update(&path, fields).await?;
    tracing::info!(uid = %user.uid, path = %doc.path, "Document updated");

    Ok(Json(doc.to_json()))
}

/// DELETE /api/:resource/:id
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<DeleteResponse>> {
    let resource: Resource = resource.parse()?;
    let path = resource_collection(&user, &headers, resource)?.child(&id)?;

    state.store.delete(&path).await?;
    tracing::info!(uid = %user.uid, path = %path, "Document deleted");

    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /api/menu/import
///
/// Body is the raw CSV text.
pub async fn import_menu(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<ImportResponse>> {
    let collection = resource_collection(&user, &headers, Resource::Menu)?;
    let result = MenuCsvImporter::new().import_str(&body)?;

    for item in &result.items {
        state.store.add(&collection, item.to_fields()).await?;
    }

    tracing::info!(
        uid = %user.uid,
        collection = %collection,
        imported = result.items.len(),
        skipped = result.rows_skipped,
        "Menu CSV imported"
    );

    Ok(Json(ImportResponse {
        imported: result.items.len(),
        skipped: result.rows_skipped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_resource_availability() {
        assert!(Resource::Menu.allowed_for(TenantKind::Restaurant));
        assert!(!Resource::Menu.allowed_for(TenantKind::Office));
        assert!(Resource::Calls.allowed_for(TenantKind::Agent));
        assert!(!Resource::Calls.allowed_for(TenantKind::Restaurant));
        assert!(Resource::Customers.allowed_for(TenantKind::Office));
        assert!("billing".parse::<Resource>().is_err());
    }

    #[test]
    fn test_create_validation() {
        assert!(Resource::Customers
            .validate_create(&fields(json!({"name": "Ana", "phone": "+1 555 010 0199"})))
            .is_ok());

        let err = Resource::Customers
            .validate_create(&fields(json!({"name": "Ana", "phone": "call me"})))
            .unwrap_err();
        assert_eq!(err.field, "phone");

        let err = Resource::Menu
            .validate_create(&fields(json!({"name": "Soup", "category": "Starters"})))
            .unwrap_err();
        assert_eq!(err.field, "price");

        let err = Resource::Menu
            .validate_create(&fields(json!({"name": "Soup", "category": "Starters", "price": -2})))
            .unwrap_err();
        assert_eq!(err.field, "price");
    }

    #[test]
    fn test_patch_validation_checks_present_fields_only() {
        assert!(Resource::Customers.validate_patch(&fields(json!({"notes": "vip"}))).is_ok());
        assert!(Resource::Customers.validate_patch(&fields(json!({"name": "  "}))).is_err());
        assert!(Resource::Orders.validate_patch(&fields(json!({"total": "ten"}))).is_err());
    }

    #[test]
    fn test_query_options_from_params() {
        let options = query_options_from_params(
            &params(&[("status", "open"), ("orderBy", "createdAt:desc,table"), ("limit", "10")]),
            500,
        )
        .unwrap();

        assert_eq!(options.filters, vec![WhereClause::new("status", FilterOp::Eq, "open")]);
        assert_eq!(options.order_by.len(), 2);
        assert_eq!(options.order_by[0].direction, Direction::Desc);
        assert_eq!(options.order_by[1].direction, Direction::Asc);
        assert_eq!(options.limit, Some(10));
    }

    #[test]
    fn test_numeric_param_matches_both_forms() {
        let options = query_options_from_params(&params(&[("table", "4")]), 500).unwrap();
        assert_eq!(
            options.filters,
            vec![WhereClause::new("table", FilterOp::In, json!([4, "4"]))]
        );
    }

    #[test]
    fn test_limit_bounds() {
        assert!(query_options_from_params(&params(&[("limit", "0")]), 500).is_err());
        assert!(query_options_from_params(&params(&[("limit", "501")]), 500).is_err());
        assert!(query_options_from_params(&params(&[("limit", "x")]), 500).is_err());
        assert!(query_options_from_params(&params(&[("orderBy", "a:sideways")]), 500).is_err());
    }
}
