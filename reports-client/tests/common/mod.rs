#![allow(dead_code)] // Each test binary uses a different subset of the fakes.

//! In-process fakes for the report API and the identity provider.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Form, Json, Router,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral loopback port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// One request seen by [`FakeReportApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub query: Option<String>,
    pub authorization: Option<String>,
}

/// `GET /reports` with a configurable reply that records every hit.
#[derive(Debug, Clone)]
pub struct FakeReportApi {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    reply: Arc<Mutex<(StatusCode, String)>>,
}

impl FakeReportApi {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            seen: Arc::default(),
            reply: Arc::new(Mutex::new((status, body.into()))),
        }
    }

    pub fn ok(body: &Value) -> Self {
        Self::new(StatusCode::OK, body.to_string())
    }

    pub fn set_reply(&self, status: StatusCode, body: impl Into<String>) {
        *self.reply.lock().unwrap() = (status, body.into());
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// Start serving and return the base URL.
    pub async fn start(&self) -> String {
        let router = Router::new()
            .route("/reports", get(reports))
            .with_state(self.clone());
        format!("http://{}", serve(router).await)
    }
}

async fn reports(
    State(api): State<FakeReportApi>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    api.seen.lock().unwrap().push(SeenRequest {
        query,
        authorization,
    });
    let (status, body) = api.reply.lock().unwrap().clone();
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

/// Keycloak-shaped token and logout endpoints for one realm.
#[derive(Debug, Clone)]
pub struct FakeIdentityProvider {
    realm: String,
    token_requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    logout_requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    token_reply: Arc<Mutex<(StatusCode, Value)>>,
}

impl FakeIdentityProvider {
    /// Provider that issues `new-token` / `r2` on every grant.
    pub fn new(realm: &str) -> Self {
        Self {
            realm: realm.to_string(),
            token_requests: Arc::default(),
            logout_requests: Arc::default(),
            token_reply: Arc::new(Mutex::new((
                StatusCode::OK,
                json!({
                    "access_token": "new-token",
                    "token_type": "bearer",
                    "expires_in": 300,
                    "refresh_token": "r2"
                }),
            ))),
        }
    }

    pub fn set_token_reply(&self, status: StatusCode, body: Value) {
        *self.token_reply.lock().unwrap() = (status, body);
    }

    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.token_requests.lock().unwrap().clone()
    }

    pub fn logout_requests(&self) -> Vec<HashMap<String, String>> {
        self.logout_requests.lock().unwrap().clone()
    }

    /// Start serving and return the identity provider base URL.
    pub async fn start(&self) -> String {
        let base = format!("/realms/{}/protocol/openid-connect", self.realm);
        let router = Router::new()
            .route(&format!("{base}/token"), post(token))
            .route(&format!("{base}/logout"), post(logout))
            .with_state(self.clone());
        format!("http://{}", serve(router).await)
    }
}

async fn token(
    State(idp): State<FakeIdentityProvider>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    idp.token_requests.lock().unwrap().push(form);
    let (status, body) = idp.token_reply.lock().unwrap().clone();
    (status, Json(body))
}

async fn logout(
    State(idp): State<FakeIdentityProvider>,
    Form(form): Form<HashMap<String, String>>,
) -> StatusCode {
    idp.logout_requests.lock().unwrap().push(form);
    StatusCode::NO_CONTENT
}
