//! OAuth2 authorization-code grant token lifecycle.
//!
//! Issues single-use authorization codes, exchanges them for opaque
//! access/refresh token pairs (hashed at rest, PKCE S256 only), validates,
//! refreshes with rotation, revokes - and on authorization-code reuse
//! revokes the whole window of suspect tokens (RFC 6819).
//!
//! Persistence, hashing, and time sit behind narrow seams
//! ([`ApplicationStore`], [`AuthorizationCodeStore`], [`AccessTokenStore`],
//! [`Clock`]); [`MemoryStore`] and [`SystemClock`] are the batteries
//! included. The HTTP layer is not this crate's business - [`TokenEndpoint`]
//! gives a transport whatever it needs to mount `/token` and `/revoke`.

mod authorization_code;
mod endpoint;
mod error;
mod memory;
mod redirect;
mod replay;
mod scope;
mod secret;
mod token;
mod traits;

pub use authorization_code::{AuthorizationCodeExchanger, AuthorizationCodeIssuer};
pub use endpoint::{
    ErrorBody, GrantType, RevokeRequest, RevokeResponse, TokenEndpoint, TokenRequest,
    TokenResponse,
};
pub use error::{OAuthError, Result};
pub use memory::{ManualClock, MemoryStore};
pub use redirect::validate_redirect_uri;
pub use replay::ReplayGuard;
pub use scope::{Scope, ScopeSet};
pub use secret::{
    compute_code_challenge, generate_secret, hash_secret, verify_code_verifier, verify_secret,
};
pub use token::AccessTokenManager;
pub use traits::{
    AccessTokenRecord, AccessTokenStore, Application, ApplicationStore, AuthorizationCode,
    AuthorizationCodeStore, Clock, CodeChallengeMethod, SystemClock, TokenContext, TokenPair,
};

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

/// Configuration for the token lifecycle.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub authorization_code_ttl: Duration,
    /// How far around an abused code's creation time the replay cascade
    /// reaches, in each direction. A policy knob, not a protocol constant:
    /// wider kills more innocent concurrent sessions, narrower may let the
    /// attacker's token survive.
    pub replay_window: Duration,
    pub access_token_prefix: String,
    pub refresh_token_prefix: String,
    pub authorization_code_prefix: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::hours(2),
            refresh_token_ttl: Duration::days(30),
            authorization_code_ttl: Duration::minutes(5),
            replay_window: Duration::minutes(10),
            access_token_prefix: "gr_access".to_string(),
            refresh_token_prefix: "gr_refresh".to_string(),
            authorization_code_prefix: "gr_code".to_string(),
        }
    }
}

/// Complete token lifecycle service: issuing, exchanging, validating,
/// refreshing, and revoking, wired over one set of stores and one clock.
#[derive(Clone)]
pub struct OAuthService {
    applications: Arc<dyn ApplicationStore>,
    issuer: Arc<AuthorizationCodeIssuer>,
    exchanger: Arc<AuthorizationCodeExchanger>,
    tokens: Arc<AccessTokenManager>,
}

impl OAuthService {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        codes: Arc<dyn AuthorizationCodeStore>,
        tokens: Arc<dyn AccessTokenStore>,
        clock: Arc<dyn Clock>,
        config: OAuthConfig,
    ) -> Self {
        let manager = Arc::new(AccessTokenManager::new(
            tokens.clone(),
            applications.clone(),
            clock.clone(),
            &config,
        ));
        let replay_guard = Arc::new(ReplayGuard::new(
            tokens,
            clock.clone(),
            config.replay_window,
        ));
        let issuer = Arc::new(AuthorizationCodeIssuer::new(
            codes.clone(),
            clock.clone(),
            &config,
        ));
        let exchanger = Arc::new(AuthorizationCodeExchanger::new(
            codes,
            manager.clone(),
            replay_guard,
            clock,
        ));

        Self {
            applications,
            issuer,
            exchanger,
            tokens: manager,
        }
    }

    /// Everything on [`MemoryStore`] and the wall clock, with default
    /// config. Handy for tests and prototypes.
    pub fn in_memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self::new(
            store.clone(),
            store.clone(),
            store,
            Arc::new(SystemClock),
            OAuthConfig::default(),
        )
    }

    // delegate methods for easy access

    pub async fn issue_code(
        &self,
        application_id: Uuid,
        user_id: Uuid,
        team_id: Uuid,
        scopes: ScopeSet,
        redirect_uri: String,
        code_challenge: Option<String>,
    ) -> Result<AuthorizationCode> {
        self.issuer
            .issue(
                application_id,
                user_id,
                team_id,
                scopes,
                redirect_uri,
                code_challenge,
            )
            .await
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        application_id: Uuid,
        code_verifier: Option<&str>,
    ) -> Result<TokenPair> {
        self.exchanger
            .exchange(code, redirect_uri, application_id, code_verifier)
            .await
    }

    pub async fn validate_token(&self, token: &str) -> Result<TokenContext> {
        self.tokens.validate(token).await
    }

    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        application_id: Uuid,
        requested_scopes: Option<ScopeSet>,
    ) -> Result<TokenPair> {
        self.tokens
            .refresh(refresh_token, application_id, requested_scopes)
            .await
    }

    pub async fn revoke_token(
        &self,
        token: &str,
        application_id: Option<Uuid>,
    ) -> Result<bool> {
        self.tokens.revoke(token, application_id).await
    }

    pub async fn application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>> {
        Ok(self.applications.find_by_client_id(client_id).await?)
    }
}
