use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::OAuthConfig;
use crate::error::{OAuthError, Result};
use crate::scope::ScopeSet;
use crate::secret;
use crate::traits::{
    AccessTokenRecord, AccessTokenStore, ApplicationStore, Clock, TokenContext, TokenPair,
};

/// Creates, validates, refreshes, and revokes access/refresh token pairs.
///
/// Secrets go through exactly one plaintext round trip: generated here,
/// returned to the caller, and from then on only their hashes exist.
pub struct AccessTokenManager {
    tokens: Arc<dyn AccessTokenStore>,
    applications: Arc<dyn ApplicationStore>,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    access_prefix: String,
    refresh_prefix: String,
}

impl AccessTokenManager {
    pub fn new(
        tokens: Arc<dyn AccessTokenStore>,
        applications: Arc<dyn ApplicationStore>,
        clock: Arc<dyn Clock>,
        config: &OAuthConfig,
    ) -> Self {
        Self {
            tokens,
            applications,
            clock,
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
            access_prefix: config.access_token_prefix.clone(),
            refresh_prefix: config.refresh_token_prefix.clone(),
        }
    }

    /// Mint a token pair. The returned plaintext secrets are the only copy
    /// that will ever exist.
    pub async fn create(
        &self,
        application_id: Uuid,
        user_id: Uuid,
        team_id: Uuid,
        scopes: ScopeSet,
    ) -> Result<TokenPair> {
        let access_token = secret::generate_secret(&self.access_prefix);
        let refresh_token = secret::generate_secret(&self.refresh_prefix);
        let now = self.clock.now();

        let record = AccessTokenRecord {
            id: Uuid::new_v4(),
            token_hash: secret::hash_secret(&access_token),
            refresh_token_hash: secret::hash_secret(&refresh_token),
            application_id,
            user_id,
            team_id,
            scopes: scopes.clone(),
            expires_at: now + self.access_ttl,
            refresh_token_expires_at: now + self.refresh_ttl,
            revoked: false,
            revoked_at: None,
            last_used_at: None,
            created_at: now,
        };
        self.tokens.insert_token(record).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds().max(0) as u64,
            refresh_token_expires_in: self.refresh_ttl.num_seconds().max(0) as u64,
            scopes,
        })
    }

    /// Resolve a bearer token to the identity behind it.
    ///
    /// Every rejection is the same `InvalidToken` - not found, revoked,
    /// expired, and inactive application are indistinguishable from outside.
    pub async fn validate(&self, token: &str) -> Result<TokenContext> {
        let token_hash = secret::hash_secret(token);
        let record = match self.tokens.find_by_token_hash(&token_hash).await? {
            Some(record) => record,
            None => return Err(OAuthError::InvalidToken),
        };

        let now = self.clock.now();
        if record.revoked || now >= record.expires_at {
            return Err(OAuthError::InvalidToken);
        }

        // the owning application must still be active
        let application = self.applications.get_application(record.application_id).await?;
        if !application.is_some_and(|a| a.active) {
            return Err(OAuthError::InvalidToken);
        }

        // best-effort bookkeeping; a failed write here must not fail the
        // validation itself
        if let Err(e) = self.tokens.touch_last_used(record.id, now).await {
            tracing::warn!("failed to update last_used_at: {e:#}");
        }

        Ok(TokenContext {
            application_id: record.application_id,
            user_id: record.user_id,
            team_id: record.team_id,
            scopes: record.scopes,
        })
    }

    /// Rotate a refresh token into a fresh pair. The old pair dies when the
    /// revocation lands, whatever happens after - a refresh token gets one
    /// use.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        application_id: Uuid,
        requested_scopes: Option<ScopeSet>,
    ) -> Result<TokenPair> {
        let refresh_hash = secret::hash_secret(refresh_token);
        let record = self
            .tokens
            .find_by_refresh_hash(&refresh_hash, application_id)
            .await?
            .ok_or(OAuthError::InvalidGrant("unknown refresh token"))?;

        if record.revoked {
            return Err(OAuthError::InvalidGrant("refresh token revoked"));
        }
        if self.clock.now() > record.refresh_token_expires_at {
            return Err(OAuthError::InvalidGrant("refresh token expired"));
        }

        // a refresh may narrow the grant, never widen it
        let scopes = match requested_scopes {
            Some(requested) if !requested.is_empty() => {
                record.scopes.authorize_subset(&requested)?;
                requested
            }
            _ => record.scopes.clone(),
        };

        // the conditional revoke is also the race arbiter: of two concurrent
        // refreshes with the same token, only the one that flips the flag
        // proceeds to mint
        if !self
            .tokens
            .revoke_by_id(record.id, self.clock.now())
            .await?
        {
            return Err(OAuthError::InvalidGrant("refresh token revoked"));
        }

        self.create(application_id, record.user_id, record.team_id, scopes)
            .await
    }

    /// Revoke by access-token plaintext, optionally scoped to an
    /// application. Idempotent: unknown and already-revoked tokens are a
    /// no-op (`Ok(false)`), not an error.
    pub async fn revoke(&self, token: &str, application_id: Option<Uuid>) -> Result<bool> {
        let token_hash = secret::hash_secret(token);
        let revoked = self
            .tokens
            .revoke_by_token_hash(&token_hash, application_id, self.clock.now())
            .await?;

        if let Some(id) = revoked {
            tracing::debug!(token_id = %id, "access token revoked");
        }

        Ok(revoked.is_some())
    }
}
