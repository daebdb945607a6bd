use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::traits::{AccessTokenStore, Clock};

/// Cascading revocation for authorization-code reuse (RFC 6819).
///
/// A replayed code doesn't tell us which exchange was the attacker's - the
/// first one may well have been. So every token minted for the same
/// (application, user, team) near the code's creation time is treated as
/// suspect and killed. The window is policy, not protocol: widening it
/// revokes more innocent concurrent sessions (think several devices signing
/// in at once), narrowing it risks letting the attacker's token survive.
pub struct ReplayGuard {
    tokens: Arc<dyn AccessTokenStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl ReplayGuard {
    pub fn new(tokens: Arc<dyn AccessTokenStore>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            tokens,
            clock,
            window,
        }
    }

    /// Revoke every live token plausibly derived from the abused code.
    ///
    /// Returns the revoked ids for the exchanger's bookkeeping; they must
    /// never reach the API caller. Logged context is the application id and
    /// a count - no token material.
    pub async fn revoke_suspect_window(
        &self,
        application_id: Uuid,
        user_id: Uuid,
        team_id: Uuid,
        code_created_at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let revoked = self
            .tokens
            .revoke_created_between(
                application_id,
                user_id,
                team_id,
                code_created_at - self.window,
                code_created_at + self.window,
                self.clock.now(),
            )
            .await?;

        tracing::warn!(
            %application_id,
            revoked = revoked.len(),
            "authorization code reuse detected, revoked suspect tokens"
        );

        Ok(revoked)
    }
}
