use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::traits::{
    AccessTokenRecord, AccessTokenStore, Application, ApplicationStore, AuthorizationCode,
    AuthorizationCodeStore, Clock,
};

/// In-memory store (doesn't persist). Fine for tests and single-process
/// embedding; anything durable implements the same traits against a real
/// database.
///
/// The conditional mutations (`claim_code`, the revokes) hold the write
/// lock across check-and-set, which gives the same exactly-once guarantee a
/// relational backend gets from a conditional `UPDATE`'s affected-row count.
#[derive(Clone, Default)]
pub struct MemoryStore {
    applications: Arc<RwLock<HashMap<Uuid, Application>>>,
    codes: Arc<RwLock<HashMap<Uuid, AuthorizationCode>>>,
    tokens: Arc<RwLock<HashMap<Uuid, AccessTokenRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registered application. Registration/approval workflow lives
    /// outside this crate; tests and embedders put records in directly.
    pub async fn put_application(&self, application: Application) {
        self.applications
            .write()
            .await
            .insert(application.id, application);
    }

    /// Raw record lookup, mainly for assertions in tests.
    pub async fn get_token_record(&self, id: Uuid) -> Option<AccessTokenRecord> {
        self.tokens.read().await.get(&id).cloned()
    }

    /// Count of non-revoked token records for one (application, user, team).
    pub async fn live_token_count(
        &self,
        application_id: Uuid,
        user_id: Uuid,
        team_id: Uuid,
    ) -> usize {
        self.tokens
            .read()
            .await
            .values()
            .filter(|t| {
                !t.revoked
                    && t.application_id == application_id
                    && t.user_id == user_id
                    && t.team_id == team_id
            })
            .count()
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        Ok(self.applications.read().await.get(&id).cloned())
    }

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>> {
        Ok(self
            .applications
            .read()
            .await
            .values()
            .find(|a| a.client_id == client_id)
            .cloned())
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryStore {
    async fn insert_code(&self, code: AuthorizationCode) -> Result<()> {
        self.codes.write().await.insert(code.id, code);
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        Ok(self
            .codes
            .read()
            .await
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn claim_code(&self, id: Uuid) -> Result<bool> {
        let mut codes = self.codes.write().await;
        match codes.get_mut(&id) {
            Some(code) if !code.used => {
                code.used = true;
                Ok(true)
            }
            // already claimed, or gone - either way nothing was flipped
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AccessTokenStore for MemoryStore {
    async fn insert_token(&self, record: AccessTokenRecord) -> Result<()> {
        self.tokens.write().await.insert(record.id, record);
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<AccessTokenRecord>> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn find_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
        application_id: Uuid,
    ) -> Result<Option<AccessTokenRecord>> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .find(|t| {
                t.refresh_token_hash == refresh_token_hash && t.application_id == application_id
            })
            .cloned())
    }

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(record) = self.tokens.write().await.get_mut(&id) {
            record.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn revoke_by_id(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(&id) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                record.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_by_token_hash(
        &self,
        token_hash: &str,
        application_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        let mut tokens = self.tokens.write().await;
        let record = tokens.values_mut().find(|t| {
            !t.revoked
                && t.token_hash == token_hash
                && application_id.is_none_or(|app| t.application_id == app)
        });
        Ok(record.map(|record| {
            record.revoked = true;
            record.revoked_at = Some(at);
            record.id
        }))
    }

    async fn revoke_created_between(
        &self,
        application_id: Uuid,
        user_id: Uuid,
        team_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let mut tokens = self.tokens.write().await;
        let mut revoked = Vec::new();
        for record in tokens.values_mut() {
            if !record.revoked
                && record.application_id == application_id
                && record.user_id == user_id
                && record.team_id == team_id
                && record.created_at >= from
                && record.created_at <= to
            {
                record.revoked = true;
                record.revoked_at = Some(at);
                revoked.push(record.id);
            }
        }
        Ok(revoked)
    }
}

/// Clock you can move by hand. Tests use this to cross TTL boundaries
/// without sleeping.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}
