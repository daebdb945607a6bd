use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::ScopeSet;

/// Time source. Everything time-dependent goes through this so tests can
/// pin the clock instead of sleeping across TTL boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A registered third-party integration. Owned by the platform - this crate
/// only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub client_id: String,
    pub active: bool,
    /// redirect targets the application registered up front
    pub redirect_uris: Vec<String>,
}

/// The one challenge transform we support. There is no "plain" mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[default]
    #[serde(rename = "S256")]
    S256,
}

/// Single-use credential proving the resource owner granted consent.
///
/// Stored in cleartext - acceptable because a code lives five minutes and
/// dies on first use. `used` flips exactly once, and only through
/// [`AuthorizationCodeStore::claim_code`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub id: Uuid,
    pub code: String,
    pub application_id: Uuid,
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub scopes: ScopeSet,
    pub redirect_uri: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<CodeChallengeMethod>,
    pub created_at: DateTime<Utc>,
}

/// Token pair record. Only the hashes of the two secrets are ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub id: Uuid,
    pub token_hash: String,
    pub refresh_token_hash: String,
    pub application_id: Uuid,
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub scopes: ScopeSet,
    pub expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// What a successful exchange or refresh hands back to the client.
///
/// The two plaintext secrets exist only in this value; nothing persists or
/// logs them, and once it's dropped they're gone.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token_expires_in: u64,
    pub scopes: ScopeSet,
}

/// Identity bound to a validated access token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenContext {
    pub application_id: Uuid,
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub scopes: ScopeSet,
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn get_application(&self, id: Uuid) -> Result<Option<Application>>;

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>>;
}

#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    async fn insert_code(&self, code: AuthorizationCode) -> Result<()>;

    async fn find_by_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Atomically flip `used` false -> true, returning whether this call did
    /// the flip. Relational backends implement this as
    /// `UPDATE ... SET used = true WHERE id = $1 AND used = false` and report
    /// the affected-row count; two concurrent exchanges must never both see
    /// `true`.
    async fn claim_code(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    async fn insert_token(&self, record: AccessTokenRecord) -> Result<()>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<AccessTokenRecord>>;

    async fn find_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
        application_id: Uuid,
    ) -> Result<Option<AccessTokenRecord>>;

    /// Best-effort bookkeeping; callers tolerate failure.
    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Conditionally revoke one record. Returns whether this call revoked it
    /// (false when the record is missing or already revoked).
    async fn revoke_by_id(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Revoke the non-revoked record matching an access-token hash,
    /// optionally scoped to an application. Returns the revoked id, if any.
    async fn revoke_by_token_hash(
        &self,
        token_hash: &str,
        application_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Option<Uuid>>;

    /// Bulk-revoke every non-revoked token for (application, user, team)
    /// created within `[from, to]`. Returns the revoked ids.
    async fn revoke_created_between(
        &self,
        application_id: Uuid,
        user_id: Uuid,
        team_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>>;
}
