use serde::{Deserialize, Serialize};
use std::fmt;

use crate::OAuthService;
use crate::error::OAuthError;
use crate::scope::ScopeSet;
use crate::traits::TokenPair;

/// Supported grant types. Anything else fails deserialization, which is the
/// wire's way of saying `unsupported_grant_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::RefreshToken => "refresh_token",
        })
    }
}

/// Token request - the shape a form-encoded `POST /token` body decodes
/// into, shared by both grant types.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: GrantType,
    pub client_id: String,
    /// Authorization code (authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI (authorization_code grant)
    pub redirect_uri: Option<String>,
    /// PKCE code verifier (authorization_code grant)
    pub code_verifier: Option<String>,
    /// Refresh token (refresh_token grant)
    pub refresh_token: Option<String>,
    /// Space-separated scope narrowing (refresh_token grant)
    pub scope: Option<String>,
}

/// Revocation request (`POST /revoke`).
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    pub client_id: Option<String>,
}

/// Successful token response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token_expires_in: u64,
    /// Space-separated granted scopes
    pub scope: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: pair.expires_in,
            refresh_token_expires_in: pair.refresh_token_expires_in,
            scope: pair.scopes.to_string(),
        }
    }
}

/// Revocation response body. There is only the one shape - RFC 7009 wants
/// revocation to succeed whether or not the token meant anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub success: bool,
}

/// OAuth2 error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ErrorBody {
    pub fn new(error: &str, description: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: Some(description.into()),
        }
    }

    fn missing(parameter: &str) -> Self {
        Self::new(
            "invalid_request",
            format!("Missing required parameter: {parameter}"),
        )
    }
}

impl From<&OAuthError> for ErrorBody {
    fn from(err: &OAuthError) -> Self {
        let description = match err {
            // storage details stay in the logs
            OAuthError::Storage(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        Self {
            error: err.wire_code().to_string(),
            error_description: Some(description),
        }
    }
}

/// Transport-agnostic token endpoint: what an HTTP layer would mount at
/// `POST /token` and `POST /revoke`, minus the HTTP.
#[derive(Clone)]
pub struct TokenEndpoint {
    service: OAuthService,
}

impl TokenEndpoint {
    pub fn new(service: OAuthService) -> Self {
        Self { service }
    }

    /// Handle a token request for either grant type.
    pub async fn token(&self, req: TokenRequest) -> Result<TokenResponse, ErrorBody> {
        let application = match self.service.application_by_client_id(&req.client_id).await {
            Ok(Some(application)) if application.active => application,
            // unknown and inactive clients get the same answer
            Ok(_) => return Err(ErrorBody::new("invalid_client", "Client authentication failed")),
            Err(e) => {
                tracing::error!("application lookup failed: {e:#}");
                return Err(ErrorBody::from(&e));
            }
        };

        let result = match req.grant_type {
            GrantType::AuthorizationCode => {
                let code = req.code.as_deref().ok_or_else(|| ErrorBody::missing("code"))?;
                let redirect_uri = req
                    .redirect_uri
                    .as_deref()
                    .ok_or_else(|| ErrorBody::missing("redirect_uri"))?;

                self.service
                    .exchange_code(
                        code,
                        redirect_uri,
                        application.id,
                        req.code_verifier.as_deref(),
                    )
                    .await
            }
            GrantType::RefreshToken => {
                let refresh_token = req
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| ErrorBody::missing("refresh_token"))?;
                let scopes = match req.scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                    Some(raw) => Some(ScopeSet::parse(raw).map_err(|e| ErrorBody::from(&e))?),
                    None => None,
                };

                self.service
                    .refresh_token(refresh_token, application.id, scopes)
                    .await
            }
        };

        match result {
            Ok(pair) => {
                tracing::info!(
                    grant_type = %req.grant_type,
                    client_id = %req.client_id,
                    "token issued"
                );
                Ok(TokenResponse::from(pair))
            }
            Err(e) => Err(ErrorBody::from(&e)),
        }
    }

    /// Handle a revocation request. Per RFC 7009 this succeeds whether the
    /// token existed, was already revoked, or never meant anything; only
    /// the store falling over is an error.
    pub async fn revoke(&self, req: RevokeRequest) -> Result<RevokeResponse, ErrorBody> {
        let application_id = match &req.client_id {
            Some(client_id) => match self.service.application_by_client_id(client_id).await {
                Ok(application) => application.map(|a| a.id),
                Err(e) => {
                    tracing::error!("application lookup failed: {e:#}");
                    return Err(ErrorBody::from(&e));
                }
            },
            None => None,
        };

        match self.service.revoke_token(&req.token, application_id).await {
            Ok(_) => Ok(RevokeResponse { success: true }),
            Err(e @ OAuthError::Storage(_)) => Err(ErrorBody::from(&e)),
            // nothing else can come out of revoke, but the wire contract
            // would still be "ok" if it did
            Err(_) => Ok(RevokeResponse { success: true }),
        }
    }
}
