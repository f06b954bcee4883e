//! Custom claims, roles and tenant resolution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::store::{DocPath, StoreResult};

/// Custom claims attached to a user
pub type Claims = Map<String, Value>;

pub const ROLE: &str = "role";
pub const TENANT_ID: &str = "tenantId";
pub const TENANT_TYPE: &str = "tenantType";

/// Access role carried in the `role` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }

    pub fn from_claims(claims: &Claims) -> Option<Self> {
        claims.get(ROLE)?.as_str()?.parse().ok()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Business vertical of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantKind {
    Restaurant,
    Office,
    Agent,
}

impl TenantKind {
    pub const ALL: [TenantKind; 3] = [TenantKind::Restaurant, TenantKind::Office, TenantKind::Agent];

    /// Root collection holding this vertical's tenants
    pub fn root(&self) -> &'static str {
        match self {
            TenantKind::Restaurant => "restaurants",
            TenantKind::Office => "offices",
            TenantKind::Agent => "agents",
        }
    }

    /// Vertical-specific id claim
    pub fn id_claim(&self) -> &'static str {
        match self {
            TenantKind::Restaurant => "restaurantId",
            TenantKind::Office => "officeId",
            TenantKind::Agent => "agentId",
        }
    }
}

impl fmt::Display for TenantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TenantKind::Restaurant => "restaurant",
            TenantKind::Office => "office",
            TenantKind::Agent => "agent",
        };
        f.write_str(name)
    }
}

impl FromStr for TenantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "restaurant" | "restaurants" => Ok(TenantKind::Restaurant),
            "office" | "offices" | "voice" => Ok(TenantKind::Office),
            "agent" | "agents" | "realestate" | "real_estate" => Ok(TenantKind::Agent),
            other => Err(format!("unknown tenant type: {}", other)),
        }
    }
}

/// The tenant a user belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub kind: TenantKind,
    pub id: String,
}

fn claim_str<'a>(claims: &'a Claims, key: &str) -> Option<&'a str> {
    claims
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl Tenant {
    /// Derive the tenant from `tenantType` or the vertical id claims
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        let tenant_id = claim_str(claims, TENANT_ID);

        if let Some(kind) = claim_str(claims, TENANT_TYPE).and_then(|t| t.parse::<TenantKind>().ok()) {
            let id = tenant_id.or_else(|| claim_str(claims, kind.id_claim()))?;
            return Some(Self {
                kind,
                id: id.to_string(),
            });
        }

        TenantKind::ALL.iter().find_map(|kind| {
            let vertical_id = claim_str(claims, kind.id_claim())?;
            Some(Self {
                kind: *kind,
                id: tenant_id.unwrap_or(vertical_id).to_string(),
            })
        })
    }

    /// `{root}/{id}`
    pub fn root_path(&self) -> StoreResult<DocPath> {
        DocPath::collection(self.kind.root())?.child(&self.id)
    }

    /// `{root}/{id}/{name}`
    pub fn collection(&self, name: &str) -> StoreResult<DocPath> {
        self.root_path()?.child(name)
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.root(), self.id)
    }
}

/// Outcome of a claims repair
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimsFix {
    pub claims: Claims,
    pub changed: bool,
}

/// Backfill `tenantId` from the vertical-specific id claim
///
/// Claims that already carry a `tenantId`, or carry no vertical id at all,
/// come back unchanged.
pub fn fix_claims(existing: &Claims) -> ClaimsFix {
    let has_tenant_id = existing.get(TENANT_ID).is_some_and(|v| !v.is_null());
    if has_tenant_id {
        return ClaimsFix {
            claims: existing.clone(),
            changed: false,
        };
    }

    let source = TenantKind::ALL
        .iter()
        .find_map(|kind| existing.get(kind.id_claim()).filter(|v| !v.is_null()));

    match source {
        Some(id) => {
            let mut claims = existing.clone();
            claims.insert(TENANT_ID.to_string(), id.clone());
            ClaimsFix {
                claims,
                changed: true,
            }
        }
        None => ClaimsFix {
            claims: existing.clone(),
            changed: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims must be an object"),
        }
    }

    #[test]
    fn test_fix_adds_tenant_id_from_restaurant() {
        let existing = claims(json!({"role": "admin", "restaurantId": "r1"}));
        let fixed = fix_claims(&existing);

        assert!(fixed.changed);
        assert_eq!(
            Value::Object(fixed.claims.clone()),
            json!({"role": "admin", "restaurantId": "r1", "tenantId": "r1"})
        );

        let again = fix_claims(&fixed.claims);
        assert!(!again.changed);
        assert_eq!(again.claims, fixed.claims);
    }

    #[test]
    fn test_fix_prefers_restaurant_then_office_then_agent() {
        let fixed = fix_claims(&claims(json!({"agentId": "a9", "officeId": "o3"})));
        assert_eq!(fixed.claims[TENANT_ID], json!("o3"));

        let fixed = fix_claims(&claims(json!({"agentId": "a9"})));
        assert_eq!(fixed.claims[TENANT_ID], json!("a9"));
    }

    #[test]
    fn test_fix_leaves_existing_tenant_id() {
        let existing = claims(json!({"restaurantId": "r1", "tenantId": "other"}));
        let fixed = fix_claims(&existing);
        assert!(!fixed.changed);
        assert_eq!(fixed.claims[TENANT_ID], json!("other"));
    }

    #[test]
    fn test_fix_without_vertical_id_is_noop() {
        let existing = claims(json!({"role": "super_admin"}));
        let fixed = fix_claims(&existing);
        assert!(!fixed.changed);
        assert_eq!(fixed.claims, existing);
    }

    #[test]
    fn test_tenant_from_claims() {
        let tenant = Tenant::from_claims(&claims(json!({"tenantType": "office", "tenantId": "o1"}))).unwrap();
        assert_eq!(tenant.kind, TenantKind::Office);
        assert_eq!(tenant.root_path().unwrap().to_string(), "offices/o1");

        let tenant = Tenant::from_claims(&claims(json!({"restaurantId": "r7"}))).unwrap();
        assert_eq!(tenant.kind, TenantKind::Restaurant);
        assert_eq!(tenant.collection("menu").unwrap().to_string(), "restaurants/r7/menu");

        assert!(Tenant::from_claims(&claims(json!({"role": "staff"}))).is_none());
        assert!(Tenant::from_claims(&claims(json!({"tenantType": "agent"}))).is_none());
    }

    #[test]
    fn test_role_from_claims() {
        assert_eq!(Role::from_claims(&claims(json!({"role": "super_admin"}))), Some(Role::SuperAdmin));
        assert_eq!(Role::from_claims(&claims(json!({"role": "owner"}))), None);
        assert_eq!(Role::from_claims(&Claims::new()), None);
    }
}
