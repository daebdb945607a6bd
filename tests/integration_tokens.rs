//! Access-token lifecycle: validation, TTL boundaries, refresh rotation,
//! scope narrowing, and idempotent revocation.

use chrono::{Duration, Utc};
use grantor::{
    AccessTokenStore, Application, Clock, ManualClock, MemoryStore, OAuthConfig, OAuthError,
    OAuthService, ScopeSet, TokenPair, hash_secret,
};
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    service: OAuthService,
    store: MemoryStore,
    clock: ManualClock,
    app: Application,
    user_id: Uuid,
    team_id: Uuid,
}

async fn setup() -> Harness {
    let store = MemoryStore::new();
    let clock = ManualClock::at(Utc::now());
    let service = OAuthService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        OAuthConfig::default(),
    );

    let app = Application {
        id: Uuid::new_v4(),
        client_id: "client-abc".to_string(),
        active: true,
        redirect_uris: vec!["https://a/cb".to_string()],
    };
    store.put_application(app.clone()).await;

    Harness {
        service,
        store,
        clock,
        app,
        user_id: Uuid::new_v4(),
        team_id: Uuid::new_v4(),
    }
}

impl Harness {
    /// Issue and exchange a code, handing back a live token pair.
    async fn mint(&self, scopes: &str) -> TokenPair {
        let code = self
            .service
            .issue_code(
                self.app.id,
                self.user_id,
                self.team_id,
                ScopeSet::parse(scopes).unwrap(),
                "https://a/cb".to_string(),
                None,
            )
            .await
            .unwrap();
        self.service
            .exchange_code(&code.code, "https://a/cb", self.app.id, None)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn validate_returns_the_bound_identity() {
    let h = setup().await;
    let pair = h.mint("read write").await;

    let ctx = h.service.validate_token(&pair.access_token).await.unwrap();
    assert_eq!(ctx.application_id, h.app.id);
    assert_eq!(ctx.user_id, h.user_id);
    assert_eq!(ctx.team_id, h.team_id);
    assert_eq!(ctx.scopes, ScopeSet::parse("read write").unwrap());
}

#[tokio::test]
async fn validate_touches_last_used_at() {
    let h = setup().await;
    let pair = h.mint("read").await;

    h.clock.advance(Duration::seconds(42));
    h.service.validate_token(&pair.access_token).await.unwrap();

    let record = h
        .store
        .find_by_token_hash(&hash_secret(&pair.access_token))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.last_used_at, Some(h.clock.now()));
}

#[tokio::test]
async fn validate_respects_the_ttl_boundary() {
    let h = setup().await;
    let pair = h.mint("read").await;

    h.clock.advance(Duration::seconds(7199));
    assert!(h.service.validate_token(&pair.access_token).await.is_ok());

    h.clock.advance(Duration::seconds(2));
    assert!(matches!(
        h.service.validate_token(&pair.access_token).await,
        Err(OAuthError::InvalidToken)
    ));
}

#[tokio::test]
async fn validate_fails_for_inactive_application() {
    let h = setup().await;
    let pair = h.mint("read").await;
    assert!(h.service.validate_token(&pair.access_token).await.is_ok());

    // the platform deactivates the application
    h.store
        .put_application(Application {
            active: false,
            ..h.app.clone()
        })
        .await;

    assert!(matches!(
        h.service.validate_token(&pair.access_token).await,
        Err(OAuthError::InvalidToken)
    ));
}

#[tokio::test]
async fn validate_rejects_garbage_tokens_uniformly() {
    let service = OAuthService::in_memory(MemoryStore::new());
    assert!(matches!(
        service.validate_token("gr_access_not_a_real_one").await,
        Err(OAuthError::InvalidToken)
    ));
    assert!(matches!(
        service.validate_token("").await,
        Err(OAuthError::InvalidToken)
    ));
}

#[tokio::test]
async fn refresh_rotates_and_kills_the_old_pair() {
    let h = setup().await;
    let pair = h.mint("read write").await;

    let new_pair = h
        .service
        .refresh_token(&pair.refresh_token, h.app.id, None)
        .await
        .unwrap();
    assert_ne!(new_pair.access_token, pair.access_token);
    assert_ne!(new_pair.refresh_token, pair.refresh_token);
    assert_eq!(new_pair.scopes, pair.scopes);

    // new access token works, old record is fully dead
    assert!(
        h.service
            .validate_token(&new_pair.access_token)
            .await
            .is_ok()
    );
    assert!(h.service.validate_token(&pair.access_token).await.is_err());

    // rotation means one use, ever
    let err = h
        .service
        .refresh_token(&pair.refresh_token, h.app.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::InvalidGrant(_)));
}

#[tokio::test]
async fn refresh_narrows_scopes_to_the_requested_subset() {
    let h = setup().await;
    let pair = h.mint("read write").await;

    let narrowed = h
        .service
        .refresh_token(
            &pair.refresh_token,
            h.app.id,
            Some(ScopeSet::parse("read").unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(narrowed.scopes, ScopeSet::parse("read").unwrap());

    // and the narrowed grant is what the new token carries
    let ctx = h
        .service
        .validate_token(&narrowed.access_token)
        .await
        .unwrap();
    assert_eq!(ctx.scopes, ScopeSet::parse("read").unwrap());
}

#[tokio::test]
async fn refresh_rejects_scopes_outside_the_original_grant() {
    let h = setup().await;
    let pair = h.mint("read").await;

    let err = h
        .service
        .refresh_token(
            &pair.refresh_token,
            h.app.id,
            Some(ScopeSet::parse("read write").unwrap()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::InvalidScope(_)));

    // the rejection didn't burn the refresh token
    assert!(
        h.service
            .refresh_token(&pair.refresh_token, h.app.id, None)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn refresh_fails_after_refresh_ttl() {
    let h = setup().await;
    let pair = h.mint("read").await;

    h.clock.advance(Duration::days(30) + Duration::seconds(1));

    let err = h
        .service
        .refresh_token(&pair.refresh_token, h.app.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::InvalidGrant(_)));
}

#[tokio::test]
async fn refresh_is_scoped_to_the_owning_application() {
    let h = setup().await;
    let pair = h.mint("read").await;

    let err = h
        .service
        .refresh_token(&pair.refresh_token, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::InvalidGrant(_)));
}

#[tokio::test]
async fn revoke_is_effective_and_idempotent() {
    let h = setup().await;
    let pair = h.mint("read").await;

    assert!(h.service.revoke_token(&pair.access_token, None).await.unwrap());
    assert!(h.service.validate_token(&pair.access_token).await.is_err());

    // second revoke and unknown tokens are quiet no-ops
    assert!(!h.service.revoke_token(&pair.access_token, None).await.unwrap());
    assert!(!h.service.revoke_token("gr_access_never_was", None).await.unwrap());
}

#[tokio::test]
async fn revoke_scoped_to_the_wrong_application_is_a_noop() {
    let h = setup().await;
    let pair = h.mint("read").await;

    assert!(
        !h.service
            .revoke_token(&pair.access_token, Some(Uuid::new_v4()))
            .await
            .unwrap()
    );
    assert!(h.service.validate_token(&pair.access_token).await.is_ok());

    assert!(
        h.service
            .revoke_token(&pair.access_token, Some(h.app.id))
            .await
            .unwrap()
    );
    assert!(h.service.validate_token(&pair.access_token).await.is_err());
}
