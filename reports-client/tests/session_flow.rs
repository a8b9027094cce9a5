//! Keycloak session lifecycle against fake identity and report servers.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use client::{
    FileTokenStore, KeycloakSession, ReportApi, ReportError, ReportView, SessionError,
    SessionProvider, TokenSet, TokenStore, ViewState,
};
use common::{FakeIdentityProvider, FakeReportApi};
use serde_json::json;
use shared::{config::Config, models::ReportQuery};
use tempfile::TempDir;

const REALM: &str = "reports-realm";

struct Harness {
    config: Config,
    idp: FakeIdentityProvider,
    api: FakeReportApi,
    _dir: TempDir,
}

impl Harness {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let idp = FakeIdentityProvider::new(REALM);
        let api = FakeReportApi::ok(&json!({
            "username": "alice",
            "total_usage": 42,
            "active_sessions": 1
        }));

        let mut config = Config::with_defaults();
        config.identity.url = idp.start().await;
        config.identity.redirect_port = 0;
        config.identity.login_timeout_secs = 10;
        config.api.base_url = api.start().await;
        config.api.request_timeout_secs = 5;
        config.session_path = Some(dir.path().join("session.json"));

        Self {
            config,
            idp,
            api,
            _dir: dir,
        }
    }

    fn store(&self) -> FileTokenStore {
        FileTokenStore::from_config(&self.config)
    }

    fn seed(&self, access: &str, expires_in_secs: i64, refresh_expires_in_secs: Option<i64>) {
        let now = Utc::now();
        self.store()
            .save(&TokenSet {
                access_token: access.to_string(),
                refresh_token: Some("r1".into()),
                expires_at: now + Duration::seconds(expires_in_secs),
                refresh_expires_at: refresh_expires_in_secs.map(|secs| now + Duration::seconds(secs)),
            })
            .unwrap();
    }

    fn session(&self) -> KeycloakSession {
        KeycloakSession::init(&self.config, self.store()).unwrap()
    }

    fn view(&self) -> ReportView<KeycloakSession> {
        ReportView::new(self.session(), ReportApi::new(&self.config.api).unwrap())
    }
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_single_request() {
    let harness = Harness::start().await;
    harness.seed("old-token", -10, Some(1800));
    let mut view = harness.view();
    assert_eq!(view.state(), ViewState::Idle);

    view.fetch(&ReportQuery::default()).await.unwrap();

    let seen = harness.api.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer new-token"));

    let grants = harness.idp.token_requests();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0]["grant_type"], "refresh_token");
    assert_eq!(grants[0]["refresh_token"], "r1");
    assert_eq!(grants[0]["client_id"], "reports-frontend");

    let stored = harness.store().load().unwrap().unwrap();
    assert_eq!(stored.access_token, "new-token");
    assert_eq!(stored.refresh_token.as_deref(), Some("r2"));
    assert!(stored.expires_at > Utc::now());
}

#[tokio::test]
async fn test_token_close_to_expiry_is_refreshed() {
    let harness = Harness::start().await;
    harness.seed("old-token", 10, None);
    let mut session = harness.session();

    assert!(session.refresh(30).await.unwrap());
    assert_eq!(session.token().as_deref(), Some("new-token"));
}

#[tokio::test]
async fn test_fresh_token_skips_identity_provider() {
    let harness = Harness::start().await;
    harness.seed("old-token", 600, Some(1800));
    let mut view = harness.view();

    view.fetch(&ReportQuery::default()).await.unwrap();

    assert!(harness.idp.token_requests().is_empty());
    assert_eq!(
        harness.api.seen()[0].authorization.as_deref(),
        Some("Bearer old-token")
    );
}

#[tokio::test]
async fn test_rejected_refresh_ends_session_and_drops_report() {
    let harness = Harness::start().await;
    harness.seed("old-token", 600, None);
    let mut view = harness.view();
    view.fetch(&ReportQuery::default()).await.unwrap();
    assert!(view.result().is_some());

    // Force the next fetch through the refresh path.
    harness.seed("old-token", -10, None);
    *view.session_mut() = harness.session();
    harness.idp.set_token_reply(
        StatusCode::BAD_REQUEST,
        json!({"error": "invalid_grant", "error_description": "Token is not active"}),
    );

    let err = view.fetch(&ReportQuery::default()).await.unwrap_err();
    match err {
        ReportError::TokenRefreshFailed(SessionError::RefreshFailed(reason)) => {
            assert!(reason.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(harness.api.hits(), 1);
    assert!(!view.session().authenticated());
    assert_eq!(view.state(), ViewState::Unauthenticated);
    assert!(view.result().is_none());
    assert!(!harness.store().path().exists());
    assert!(harness.idp.logout_requests().is_empty());
}

#[tokio::test]
async fn test_expired_refresh_token_fails_without_calling_provider() {
    let harness = Harness::start().await;
    harness.seed("old-token", 5, Some(-5));
    let mut session = harness.session();
    assert!(session.authenticated());

    let err = session.refresh(30).await.unwrap_err();
    assert!(matches!(err, SessionError::RefreshFailed(_)));
    assert!(!session.authenticated());
    assert!(harness.idp.token_requests().is_empty());
    assert!(!harness.store().path().exists());
}

#[tokio::test]
async fn test_fully_expired_session_is_discarded_on_startup() {
    let harness = Harness::start().await;
    harness.seed("old-token", -60, Some(-30));

    let session = harness.session();
    assert!(session.initialized());
    assert!(!session.authenticated());
    assert!(!harness.store().path().exists());
}

#[tokio::test]
async fn test_corrupt_store_is_discarded_on_startup() {
    let harness = Harness::start().await;
    std::fs::write(harness.store().path(), "{ truncated").unwrap();

    let session = KeycloakSession::init(&harness.config, harness.store()).unwrap();
    assert!(session.initialized());
    assert!(!session.authenticated());
    assert!(!harness.store().path().exists());
}

#[tokio::test]
async fn test_refresh_without_session_is_not_authenticated() {
    let harness = Harness::start().await;
    let mut session = harness.session();
    assert!(session.initialized());
    assert!(matches!(
        session.refresh(30).await,
        Err(SessionError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_login_completes_pkce_exchange() {
    let harness = Harness::start().await;
    let prompt = Arc::new(|url: &url::Url| {
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["code_challenge_method"], "S256");
        let redirect = format!(
            "{}?code=auth-code&state={}&session_state=s1",
            params["redirect_uri"], params["state"]
        );
        tokio::spawn(async move {
            reqwest::get(redirect).await.unwrap();
        });
    });
    let mut session = harness.session().with_prompt(prompt);
    assert!(!session.authenticated());

    session.login().await.unwrap();

    assert!(session.authenticated());
    assert_eq!(session.token().as_deref(), Some("new-token"));

    let grants = harness.idp.token_requests();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0]["grant_type"], "authorization_code");
    assert_eq!(grants[0]["code"], "auth-code");
    assert!(grants[0]["redirect_uri"].starts_with("http://127.0.0.1:"));
    assert!(!grants[0]["code_verifier"].is_empty());

    let stored = harness.store().load().unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("r2"));
}

#[tokio::test]
async fn test_login_with_forged_state_is_rejected() {
    let harness = Harness::start().await;
    let prompt = Arc::new(|url: &url::Url| {
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        let redirect = format!("{}?code=auth-code&state=forged", params["redirect_uri"]);
        tokio::spawn(async move {
            reqwest::get(redirect).await.unwrap();
        });
    });
    let mut session = harness.session().with_prompt(prompt);

    let err = session.login().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidCallback(_)));
    assert!(!session.authenticated());
    assert!(harness.idp.token_requests().is_empty());
}

#[tokio::test]
async fn test_logout_clears_store_and_ends_provider_session() {
    let harness = Harness::start().await;
    harness.seed("old-token", 600, None);
    let mut session = harness.session();

    session.logout().await.unwrap();

    assert!(!session.authenticated());
    assert!(!harness.store().path().exists());
    let logouts = harness.idp.logout_requests();
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0]["refresh_token"], "r1");
    assert_eq!(logouts[0]["client_id"], "reports-frontend");
}

#[tokio::test]
async fn test_logout_succeeds_when_provider_is_unreachable() {
    let mut harness = Harness::start().await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    harness.config.identity.url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    harness.seed("old-token", 600, None);
    let mut session = harness.session();

    session.logout().await.unwrap();
    assert!(!session.authenticated());
    assert!(!harness.store().path().exists());
}
