//! Report View: the guarded fetch of `GET /reports` and its result state.

use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use shared::{
    config::ApiConfig,
    models::{ReportQuery, ReportResponse},
};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    error::{ReportError, SessionError},
    session::SessionProvider,
};

/// Seconds of validity a token must have left before it is sent.
pub const MIN_TOKEN_VALIDITY_SECS: u64 = 30;

/// HTTP client for the report endpoint.
#[derive(Debug, Clone)]
pub struct ReportApi {
    http: Client,
    endpoint: Url,
}

impl ReportApi {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ReportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("usage-reports/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.reports_endpoint()?,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint URL with only the non-empty date bounds attached.
    #[must_use]
    pub fn report_url(&self, query: &ReportQuery) -> Url {
        let mut url = self.endpoint.clone();
        let params = query.params();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        url
    }

    /// Issue the bearer-authenticated request.
    ///
    /// # Errors
    /// [`ReportError::Unauthorized`] on 401, [`ReportError::Http`] on any
    /// other non-success status, transport and decode errors otherwise.
    #[instrument(skip(self, token), fields(endpoint = %self.endpoint))]
    pub async fn get(&self, token: &str, query: &ReportQuery) -> Result<ReportResponse, ReportError> {
        let response = self
            .http
            .get(self.report_url(query))
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ReportError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        debug!(status = status.as_u16(), len = bytes.len(), "report received");
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Where the view is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Unauthenticated,
    /// Waiting on the identity provider redirect.
    Authenticating,
    Idle,
    Loading,
}

/// Owns the injected session and the last result or error.
///
/// `fetch` takes `&mut self`, so a second fetch cannot start while one is
/// pending.
#[derive(Debug)]
pub struct ReportView<P> {
    session: P,
    api: ReportApi,
    state: ViewState,
    result: Option<ReportResponse>,
    error: Option<ReportError>,
}

impl<P: SessionProvider> ReportView<P> {
    pub fn new(session: P, api: ReportApi) -> Self {
        let state = if session.authenticated() {
            ViewState::Idle
        } else {
            ViewState::Unauthenticated
        };
        Self {
            session,
            api,
            state,
            result: None,
            error: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ViewState {
        self.state
    }

    #[must_use]
    pub fn result(&self) -> Option<&ReportResponse> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&ReportError> {
        self.error.as_ref()
    }

    /// Move the stored error out, keeping its source chain.
    pub fn take_error(&mut self) -> Option<ReportError> {
        self.error.take()
    }

    #[must_use]
    pub fn session(&self) -> &P {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut P {
        &mut self.session
    }

    #[must_use]
    pub fn into_session(self) -> P {
        self.session
    }

    /// # Errors
    /// Propagates the session's login failure.
    pub async fn login(&mut self) -> Result<(), SessionError> {
        self.state = ViewState::Authenticating;
        let outcome = self.session.login().await;
        self.settle();
        outcome
    }

    /// Drops the session and any stored result.
    ///
    /// # Errors
    /// Propagates the session's logout failure.
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        let outcome = self.session.logout().await;
        self.result = None;
        self.error = None;
        self.settle();
        outcome
    }

    /// Fetch the report for `query`.
    ///
    /// On success the stored result is replaced; on failure the error is
    /// stored and the previous result is left untouched, unless the failure
    /// ended the session.
    ///
    /// # Errors
    /// Returns a reference to the stored [`ReportError`].
    pub async fn fetch(&mut self, query: &ReportQuery) -> Result<&ReportResponse, &ReportError> {
        self.error = None;
        self.state = ViewState::Loading;

        let outcome = self.run(query).await;
        self.settle();

        match outcome {
            Ok(report) => Ok(&*self.result.insert(report)),
            Err(err) => {
                warn!(error = %err, "report fetch failed");
                Err(&*self.error.insert(err))
            }
        }
    }

    async fn run(&mut self, query: &ReportQuery) -> Result<ReportResponse, ReportError> {
        if !self.session.authenticated() {
            return Err(ReportError::NotAuthenticated);
        }

        self.session
            .refresh(MIN_TOKEN_VALIDITY_SECS)
            .await
            .map_err(ReportError::TokenRefreshFailed)?;
        let token = self.session.token().ok_or(ReportError::NotAuthenticated)?;

        match self.api.get(&token, query).await {
            Err(ReportError::Unauthorized) => {
                info!("report API rejected the token; logging out");
                if let Err(err) = self.session.logout().await {
                    warn!(error = %err, "logout after 401 failed");
                }
                Err(ReportError::Unauthorized)
            }
            other => other,
        }
    }

    // A report never outlives the session that fetched it.
    fn settle(&mut self) {
        if self.session.authenticated() {
            self.state = ViewState::Idle;
        } else {
            self.state = ViewState::Unauthenticated;
            self.result = None;
        }
    }
}
