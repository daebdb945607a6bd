use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::OAuthConfig;
use crate::error::{OAuthError, Result};
use crate::replay::ReplayGuard;
use crate::scope::ScopeSet;
use crate::secret;
use crate::token::AccessTokenManager;
use crate::traits::{
    AuthorizationCode, AuthorizationCodeStore, Clock, CodeChallengeMethod, TokenPair,
};

/// Issues short-lived, single-use authorization codes.
pub struct AuthorizationCodeIssuer {
    codes: Arc<dyn AuthorizationCodeStore>,
    clock: Arc<dyn Clock>,
    code_ttl: Duration,
    code_prefix: String,
}

impl AuthorizationCodeIssuer {
    pub fn new(
        codes: Arc<dyn AuthorizationCodeStore>,
        clock: Arc<dyn Clock>,
        config: &OAuthConfig,
    ) -> Self {
        Self {
            codes,
            clock,
            code_ttl: config.authorization_code_ttl,
            code_prefix: config.authorization_code_prefix.clone(),
        }
    }

    /// Create a code binding (application, user, team, scopes, redirect)
    /// together, with an optional PKCE challenge. One insert, no other side
    /// effects; the only way this fails is the store failing.
    ///
    /// When a challenge is present the method is pinned to S256 - there is
    /// no "plain" mode to downgrade to.
    pub async fn issue(
        &self,
        application_id: Uuid,
        user_id: Uuid,
        team_id: Uuid,
        scopes: ScopeSet,
        redirect_uri: String,
        code_challenge: Option<String>,
    ) -> Result<AuthorizationCode> {
        let now = self.clock.now();
        let record = AuthorizationCode {
            id: Uuid::new_v4(),
            code: secret::generate_secret(&self.code_prefix),
            application_id,
            user_id,
            team_id,
            scopes,
            redirect_uri,
            expires_at: now + self.code_ttl,
            used: false,
            code_challenge_method: code_challenge.as_ref().map(|_| CodeChallengeMethod::S256),
            code_challenge,
            created_at: now,
        };
        self.codes.insert_code(record.clone()).await?;

        tracing::debug!(%application_id, "authorization code issued");

        Ok(record)
    }
}

/// Validates and atomically consumes authorization codes, minting the token
/// pair on success and escalating to the replay guard on reuse.
pub struct AuthorizationCodeExchanger {
    codes: Arc<dyn AuthorizationCodeStore>,
    tokens: Arc<AccessTokenManager>,
    replay_guard: Arc<ReplayGuard>,
    clock: Arc<dyn Clock>,
}

impl AuthorizationCodeExchanger {
    pub fn new(
        codes: Arc<dyn AuthorizationCodeStore>,
        tokens: Arc<AccessTokenManager>,
        replay_guard: Arc<ReplayGuard>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codes,
            tokens,
            replay_guard,
            clock,
        }
    }

    /// Exchange a code for a token pair.
    ///
    /// The checks run in a fixed order and the claim at the end is the only
    /// mutation that spends the code - a failure anywhere before it leaves
    /// the code unspent.
    pub async fn exchange(
        &self,
        code: &str,
        redirect_uri: &str,
        application_id: Uuid,
        code_verifier: Option<&str>,
    ) -> Result<TokenPair> {
        let auth_code = self
            .codes
            .find_by_code(code)
            .await?
            .ok_or(OAuthError::InvalidGrant("unknown authorization code"))?;

        if auth_code.application_id != application_id {
            tracing::warn!(
                %application_id,
                "authorization code presented by a different application"
            );
            return Err(OAuthError::InvalidGrant(
                "authorization code does not belong to this application",
            ));
        }

        // reuse outranks every remaining check: a used code showing up again
        // is the abuse signal (RFC 6819), and it must never succeed no
        // matter how valid the rest of the request looks
        if auth_code.used {
            self.replay_guard
                .revoke_suspect_window(
                    auth_code.application_id,
                    auth_code.user_id,
                    auth_code.team_id,
                    auth_code.created_at,
                )
                .await?;
            return Err(OAuthError::SecurityViolation);
        }

        if self.clock.now() > auth_code.expires_at {
            return Err(OAuthError::InvalidGrant("authorization code expired"));
        }

        if auth_code.redirect_uri != redirect_uri {
            tracing::warn!(
                %application_id,
                expected = %auth_code.redirect_uri,
                got = %redirect_uri,
                "redirect_uri mismatch"
            );
            return Err(OAuthError::InvalidGrant("redirect_uri mismatch"));
        }

        if let Some(challenge) = &auth_code.code_challenge {
            let verifier = code_verifier.ok_or(OAuthError::InvalidGrant(
                "code verifier required when code challenge is present",
            ))?;
            if !secret::verify_code_verifier(verifier, challenge) {
                tracing::warn!(%application_id, "PKCE verification failed");
                return Err(OAuthError::InvalidGrant("PKCE verification failed"));
            }
        }

        // the single conditional mutation that spends the code. losing the
        // race here is ordinary contention from a concurrent exchange, not
        // observed reuse - hence invalid_grant, not the security error.
        if !self.codes.claim_code(auth_code.id).await? {
            return Err(OAuthError::InvalidGrant("authorization code already claimed"));
        }

        self.tokens
            .create(
                auth_code.application_id,
                auth_code.user_id,
                auth_code.team_id,
                auth_code.scopes,
            )
            .await
    }
}
