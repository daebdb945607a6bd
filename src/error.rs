use thiserror::Error;

pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors produced by the token lifecycle.
///
/// `InvalidToken` is reason-free on purpose: callers of validate must not be
/// able to tell a revoked token from an expired or unknown one.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Bad, expired, or mismatched code or refresh token. Recoverable by
    /// sending the user back through authorization.
    #[error("invalid grant: {0}")]
    InvalidGrant(&'static str),

    /// Missing or malformed request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Requested scope outside the originally granted set.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Uniform validation failure.
    #[error("invalid token")]
    InvalidToken,

    /// Authorization code reuse. By the time this surfaces, every token
    /// plausibly minted from the abused code has already been revoked.
    #[error("authorization code already used - all related tokens have been revoked")]
    SecurityViolation,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl OAuthError {
    /// OAuth2 error code for the wire (RFC 6749 / RFC 6750).
    ///
    /// `SecurityViolation` goes out as `invalid_grant`: the response body
    /// must not tell the caller that the replay was noticed. The typed
    /// variant and the warn-level log keep the distinction server-side.
    pub fn wire_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidGrant(_) | OAuthError::SecurityViolation => "invalid_grant",
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::InvalidToken => "invalid_token",
            OAuthError::Storage(_) => "server_error",
        }
    }
}
