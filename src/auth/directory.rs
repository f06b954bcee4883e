//! Auth Directory
//!
//! User accounts with argon2 password hashes and custom claims, persisted
//! as `auth.json` beside the document snapshot, plus in-memory bearer
//! sessions.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, RwLock};

use super::claims::{fix_claims, Claims, Role, Tenant, ROLE};
use super::error::{AuthError, AuthResult};
use crate::store::DocPath;
use crate::validation::{validate_email, validate_password};

/// Buffered revocations per subscriber
const REVOCATION_CAPACITY: usize = 256;

/// Directory settings
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// `auth.json` location; `None` keeps everything in memory
    pub path: Option<PathBuf>,
    pub session_ttl: Duration,
    pub min_password_length: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            session_ttl: Duration::hours(12),
            min_password_length: 6,
        }
    }
}

/// Stored account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub claims: Claims,
    #[serde(default)]
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Account as exposed over the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub claims: Claims,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserInfo {
    fn from(record: &UserRecord) -> Self {
        Self {
            uid: record.uid.clone(),
            email: record.email.clone(),
            display_name: record.display_name.clone(),
            claims: record.claims.clone(),
            disabled: record.disabled,
            created_at: record.created_at,
        }
    }
}

/// New account request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub claims: Claims,
}

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub claims: Claims,
    pub role: Option<Role>,
    pub tenant: Option<Tenant>,
}

impl AuthUser {
    fn from_record(record: &UserRecord) -> Self {
        Self {
            uid: record.uid.clone(),
            email: record.email.clone(),
            role: Role::from_claims(&record.claims),
            tenant: Tenant::from_claims(&record.claims),
            claims: record.claims.clone(),
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Some(Role::SuperAdmin)
    }

    /// Super admins reach every path, everyone else only their tenant subtree
    pub fn can_access(&self, path: &DocPath) -> bool {
        if self.is_super_admin() {
            return true;
        }
        match self.tenant.as_ref().map(Tenant::root_path) {
            Some(Ok(root)) => path.starts_with(&root),
            _ => false,
        }
    }
}

/// Issued bearer session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSession {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: UserInfo,
}

/// Credentials that stopped being valid
///
/// Published so long-lived connections can drop what they authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revocation {
    /// One bearer token was logged out
    Session(String),
    /// Every session of this uid: disabled, or its claims changed
    User(String),
}

#[derive(Debug, Clone)]
struct Session {
    uid: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Accounts indexed by uid with an email lookup
#[derive(Debug, Clone, Default)]
struct UserRegistry {
    users: HashMap<String, UserRecord>,
    email_to_uid: HashMap<String, String>,
}

impl UserRegistry {
    /// Load from JSON file
    fn load(path: &Path) -> AuthResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let records: Vec<UserRecord> = serde_json::from_str(&content)?;

        let mut registry = Self::default();
        for record in records {
            registry.insert(record);
        }
        Ok(registry)
    }

    /// Save to JSON file
    fn save(&self, path: &Path) -> AuthResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut records: Vec<&UserRecord> = self.users.values().collect();
        records.sort_by(|a, b| a.email.cmp(&b.email));

        let content = serde_json::to_string_pretty(&records)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn insert(&mut self, record: UserRecord) {
        self.email_to_uid.insert(record.email.clone(), record.uid.clone());
        self.users.insert(record.uid.clone(), record);
    }

    fn by_email(&self, email: &str) -> Option<&UserRecord> {
        self.email_to_uid.get(email).and_then(|uid| self.users.get(uid))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password using Argon2id
fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> AuthResult<()> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// User accounts and sessions
pub struct AuthDirectory {
    config: DirectoryConfig,
    registry: RwLock<UserRegistry>,
    sessions: RwLock<HashMap<String, Session>>,
    revocations: broadcast::Sender<Revocation>,
}

impl AuthDirectory {
    /// Open the directory, loading `auth.json` if present
    pub fn open(config: DirectoryConfig) -> AuthResult<Self> {
        let registry = match &config.path {
            Some(path) => UserRegistry::load(path)?,
            None => UserRegistry::default(),
        };

        tracing::info!(users = registry.users.len(), path = ?config.path, "Auth directory opened");
        Ok(Self::with_registry(config, registry))
    }

    /// A directory that never touches the filesystem
    pub fn in_memory(config: DirectoryConfig) -> Self {
        Self::with_registry(DirectoryConfig { path: None, ..config }, UserRegistry::default())
    }

    fn with_registry(config: DirectoryConfig, registry: UserRegistry) -> Self {
        let (revocations, _) = broadcast::channel(REVOCATION_CAPACITY);
        Self {
            config,
            registry: RwLock::new(registry),
            sessions: RwLock::new(HashMap::new()),
            revocations,
        }
    }

    /// Write `record` to disk, then make it live
    ///
    /// On a failed write the in-memory registry is left untouched.
    fn commit(&self, registry: &mut UserRegistry, record: UserRecord) -> AuthResult<()> {
        if let Some(path) = &self.config.path {
            let mut next = registry.clone();
            next.insert(record.clone());
            next.save(path)?;
        }
        registry.insert(record);
        Ok(())
    }

    fn revoke(&self, revocation: Revocation) {
        // no receivers is fine
        let _ = self.revocations.send(revocation);
    }

    /// Receive a [`Revocation`] for every logout, disable and claims change
    pub fn subscribe_revocations(&self) -> broadcast::Receiver<Revocation> {
        self.revocations.subscribe()
    }

    /// Register an account
    pub async fn create_user(&self, new_user: NewUser) -> AuthResult<UserInfo> {
        let email = normalize_email(&new_user.email);
        validate_email(&email)?;
        validate_password(&new_user.password, self.config.min_password_length)?;

        if self.registry.read().await.by_email(&email).is_some() {
            return Err(AuthError::EmailTaken(email));
        }

        let password_hash = hash_password(&new_user.password)?;

        let mut registry = self.registry.write().await;
        if registry.by_email(&email).is_some() {
            return Err(AuthError::EmailTaken(email));
        }

        let record = UserRecord {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            email,
            display_name: new_user.display_name.filter(|n| !n.trim().is_empty()),
            password_hash: Some(password_hash),
            claims: new_user.claims,
            disabled: false,
            created_at: Utc::now(),
        };
        let info = UserInfo::from(&record);
        self.commit(&mut registry, record)?;

        tracing::info!(uid = %info.uid, email = %info.email, "User created");
        Ok(info)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<UserInfo> {
        let registry = self.registry.read().await;
        registry.by_email(&normalize_email(email)).map(UserInfo::from)
    }

    pub async fn get_user(&self, uid: &str) -> Option<UserInfo> {
        self.registry.read().await.users.get(uid).map(UserInfo::from)
    }

    /// All accounts ordered by email
    pub async fn list_users(&self) -> Vec<UserInfo> {
        let registry = self.registry.read().await;
        let mut users: Vec<UserInfo> = registry.users.values().map(UserInfo::from).collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        users
    }

    /// Replace a user's custom claims
    ///
    /// Open connections of this user are revoked so they pick up the new
    /// claims on reconnect.
    pub async fn set_claims(&self, uid: &str, claims: Claims) -> AuthResult<UserInfo> {
        let mut registry = self.registry.write().await;
        let mut record = registry
            .users
            .get(uid)
            .cloned()
            .ok_or_else(|| AuthError::UserNotFound(uid.to_string()))?;
        record.claims = claims;
        let info = UserInfo::from(&record);
        self.commit(&mut registry, record)?;
        drop(registry);

        self.revoke(Revocation::User(uid.to_string()));
        tracing::info!(uid = %uid, "Custom claims updated");
        Ok(info)
    }

    pub async fn set_disabled(&self, uid: &str, disabled: bool) -> AuthResult<UserInfo> {
        let mut registry = self.registry.write().await;
        let mut record = registry
            .users
            .get(uid)
            .cloned()
            .ok_or_else(|| AuthError::UserNotFound(uid.to_string()))?;
        record.disabled = disabled;
        let info = UserInfo::from(&record);
        self.commit(&mut registry, record)?;
        drop(registry);

        if disabled {
            self.sessions.write().await.retain(|_, s| s.uid != uid);
            self.revoke(Revocation::User(uid.to_string()));
            tracing::info!(uid = %uid, "User disabled");
        }
        Ok(info)
    }

    /// Backfill `tenantId` for the account with this email
    ///
    /// Returns the resulting account and whether anything changed.
    pub async fn fix_user_claims(&self, email: &str) -> AuthResult<(UserInfo, bool)> {
        let email = normalize_email(email);
        let mut registry = self.registry.write().await;
        let mut record = registry
            .by_email(&email)
            .cloned()
            .ok_or_else(|| AuthError::UserNotFound(email.clone()))?;

        let fix = fix_claims(&record.claims);
        if !fix.changed {
            return Ok((UserInfo::from(&record), false));
        }

        record.claims = fix.claims;
        let info = UserInfo::from(&record);
        self.commit(&mut registry, record)?;

        tracing::info!(uid = %info.uid, email = %email, "Claims repaired with tenantId");
        Ok((info, true))
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginSession> {
        let email = normalize_email(email);
        let user = {
            let registry = self.registry.read().await;
            let record = registry.by_email(&email).ok_or(AuthError::InvalidCredentials)?;
            if record.disabled {
                return Err(AuthError::Disabled);
            }
            let hash = record
                .password_hash
                .as_deref()
                .ok_or(AuthError::InvalidCredentials)?;
            verify_password(password, hash)?;
            UserInfo::from(record)
        };

        let token = uuid::Uuid::new_v4().to_string();
        let expires_at = Some(Utc::now() + self.config.session_ttl);
        self.sessions.write().await.insert(
            token.clone(),
            Session {
                uid: user.uid.clone(),
                expires_at,
            },
        );

        tracing::info!(uid = %user.uid, "Session issued");
        Ok(LoginSession {
            token,
            expires_at,
            user,
        })
    }

    /// Resolve a bearer token to its user
    pub async fn resolve(&self, token: &str) -> AuthResult<AuthUser> {
        let session = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)?;

        if session.expires_at.is_some_and(|at| at <= Utc::now()) {
            self.sessions.write().await.remove(token);
            return Err(AuthError::SessionExpired);
        }

        let registry = self.registry.read().await;
        let record = registry.users.get(&session.uid).ok_or(AuthError::InvalidToken)?;
        if record.disabled {
            return Err(AuthError::Disabled);
        }
        Ok(AuthUser::from_record(record))
    }

    /// Drop a session; returns whether it existed
    pub async fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token).is_some();
        if removed {
            self.revoke(Revocation::Session(token.to_string()));
        }
        removed
    }

    /// Make sure a super-admin account exists and `token` authenticates it
    ///
    /// The bootstrap session never expires.
    pub async fn ensure_bootstrap_admin(&self, email: &str, token: &str) -> AuthResult<UserInfo> {
        let email = normalize_email(email);
        validate_email(&email)?;
        if token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let mut registry = self.registry.write().await;
        let record = match registry.by_email(&email).cloned() {
            Some(mut record) => {
                record.claims.insert(ROLE.to_string(), Role::SuperAdmin.as_str().into());
                record.disabled = false;
                record
            }
            None => {
                let mut claims = Claims::new();
                claims.insert(ROLE.to_string(), Role::SuperAdmin.as_str().into());
                UserRecord {
                    uid: uuid::Uuid::new_v4().simple().to_string(),
                    email: email.clone(),
                    display_name: Some("Administrator".to_string()),
                    password_hash: None,
                    claims,
                    disabled: false,
                    created_at: Utc::now(),
                }
            }
        };
        let info = UserInfo::from(&record);
        self.commit(&mut registry, record)?;
        drop(registry);

        self.sessions.write().await.insert(
            token.to_string(),
            Session {
                uid: info.uid.clone(),
                expires_at: None,
            },
        );

        tracing::info!(uid = %info.uid, email = %email, "Bootstrap admin ready");
        Ok(info)
    }

    pub async fn user_count(&self) -> usize {
        self.registry.read().await.users.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
