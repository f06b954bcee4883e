//! Authentication
//!
//! - [`AuthDirectory`]: accounts, argon2 password hashes, bearer sessions
//! - Custom claims: roles, tenant resolution and the `tenantId` repair

mod claims;
mod directory;
mod error;

pub use claims::{fix_claims, Claims, ClaimsFix, Role, Tenant, TenantKind, ROLE, TENANT_ID, TENANT_TYPE};
pub use directory::{
    AuthDirectory, AuthUser, DirectoryConfig, LoginSession, NewUser, Revocation, UserInfo, UserRecord,
};
pub use error::{AuthError, AuthResult};
