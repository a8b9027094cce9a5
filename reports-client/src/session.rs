//! Session Provider: the owned token lifecycle around the report fetch.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::config::Config;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    callback::CallbackListener,
    claims::TokenClaims,
    error::SessionError,
    oauth::{IdentityClient, PKCE_METHOD},
    store::{FileTokenStore, TokenSet, TokenStore},
};

/// Authentication state and actions the report view depends on.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Whether the startup check against stored state has completed.
    fn initialized(&self) -> bool;

    fn authenticated(&self) -> bool;

    /// Current bearer token. It may be stale; call [`SessionProvider::refresh`] first.
    fn token(&self) -> Option<String>;

    /// Run the authorization-code + PKCE flow.
    ///
    /// # Errors
    /// Returns an error if the redirect never arrives, is invalid, or the code
    /// exchange is rejected.
    async fn login(&mut self) -> Result<(), SessionError>;

    /// Drop the local session and end it at the identity provider.
    ///
    /// # Errors
    /// Returns an error only when the local session cannot be cleared.
    async fn logout(&mut self) -> Result<(), SessionError>;

    /// Ensure the token stays valid for at least `min_validity_secs`.
    ///
    /// Returns `true` when a new token was obtained.
    ///
    /// # Errors
    /// Fails when there is no session, the refresh token is expired or
    /// revoked, or the exchange cannot be completed.
    async fn refresh(&mut self, min_validity_secs: u64) -> Result<bool, SessionError>;
}

/// Called with the authorization URL the user has to open.
pub type AuthorizePrompt = Arc<dyn Fn(&Url) + Send + Sync>;

fn print_authorize_url(url: &Url) {
    eprintln!("Open the following URL in your browser to sign in:\n\n  {url}\n");
}

/// Keycloak-backed session, created once and replaced wholesale on login/logout.
pub struct KeycloakSession<S = FileTokenStore> {
    identity: IdentityClient,
    store: S,
    tokens: Option<TokenSet>,
    initialized: bool,
    redirect_port: u16,
    login_timeout: Duration,
    prompt: AuthorizePrompt,
}

impl<S> fmt::Debug for KeycloakSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakSession")
            .field("realm", &self.identity.realm())
            .field("client_id", &self.identity.client_id())
            .field("tokens", &self.tokens)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl<S: TokenStore> KeycloakSession<S> {
    /// Build an uninitialised session; call [`KeycloakSession::initialize`] next.
    ///
    /// # Errors
    /// Returns an error when the identity configuration is unusable.
    pub fn new(config: &Config, store: S) -> Result<Self, SessionError> {
        Ok(Self {
            identity: IdentityClient::new(config)?,
            store,
            tokens: None,
            initialized: false,
            redirect_port: config.identity.redirect_port,
            login_timeout: Duration::from_secs(config.identity.login_timeout_secs),
            prompt: Arc::new(print_authorize_url),
        })
    }

    /// Build and initialise in one step.
    ///
    /// # Errors
    /// See [`KeycloakSession::new`] and [`KeycloakSession::initialize`].
    pub fn init(config: &Config, store: S) -> Result<Self, SessionError> {
        let mut session = Self::new(config, store)?;
        session.initialize()?;
        Ok(session)
    }

    /// Replace how the authorization URL is presented.
    #[must_use]
    pub fn with_prompt(mut self, prompt: AuthorizePrompt) -> Self {
        self.prompt = prompt;
        self
    }

    /// Startup check: resume a stored session if either token is still usable.
    ///
    /// A store that cannot be parsed is removed and the session starts signed
    /// out.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or cleared.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        let now = Utc::now();
        let stored = match self.store.load() {
            Err(err @ SessionError::StoreFormat { .. }) => {
                warn!(error = %err, "discarding unreadable stored session");
                self.store.clear()?;
                None
            }
            other => other?,
        };
        self.tokens = match stored {
            Some(tokens) if tokens.is_resumable(now) => {
                debug!(expires_at = %tokens.expires_at, "resumed stored session");
                Some(tokens)
            }
            Some(_) => {
                info!("stored session has fully expired; discarding it");
                self.store.clear()?;
                None
            }
            None => None,
        };
        self.initialized = true;
        Ok(())
    }

    /// Unverified claims of the current access token.
    #[must_use]
    pub fn claims(&self) -> Option<TokenClaims> {
        self.tokens.as_ref().and_then(TokenSet::claims)
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.as_ref().map(|tokens| tokens.expires_at)
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.identity
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn replace_tokens(&mut self, tokens: TokenSet) -> Result<(), SessionError> {
        self.store.save(&tokens)?;
        self.tokens = Some(tokens);
        Ok(())
    }

    /// Forget a session that can no longer be refreshed. The provider-side
    /// session is left alone.
    fn discard(&mut self) {
        self.tokens = None;
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to remove unusable session");
        }
    }
}

#[async_trait]
impl<S: TokenStore> SessionProvider for KeycloakSession<S> {
    fn initialized(&self) -> bool {
        self.initialized
    }

    fn authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    fn token(&self) -> Option<String> {
        self.tokens.as_ref().map(|tokens| tokens.access_token.clone())
    }

    #[instrument(skip_all)]
    async fn login(&mut self) -> Result<(), SessionError> {
        let listener = CallbackListener::bind(self.redirect_port).await?;
        let redirect = listener.redirect_url()?;
        let pending = self.identity.authorize(&redirect);

        info!(
            pkce_method = PKCE_METHOD,
            client_id = %self.identity.client_id(),
            realm = %self.identity.realm(),
            redirect_uri = %redirect.as_str(),
            "login initiated"
        );
        (self.prompt)(&pending.url);

        let params = listener.wait(self.login_timeout).await?;
        let code = params.into_code(pending.csrf_state.secret())?;
        let tokens = self
            .identity
            .exchange_code(code, pending.verifier, &redirect)
            .await?;

        let who = tokens
            .claims()
            .and_then(|claims| claims.display_name().map(str::to_string))
            .unwrap_or_default();
        self.replace_tokens(tokens)?;
        info!(user = %who, "login completed");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn logout(&mut self) -> Result<(), SessionError> {
        let previous = self.tokens.take();
        self.store.clear()?;

        if let Some(refresh_token) = previous.and_then(|tokens| tokens.refresh_token) {
            if let Err(err) = self.identity.end_session(&refresh_token).await {
                warn!(error = %err, "identity provider logout failed; local session cleared");
            }
        }
        info!(realm = %self.identity.realm(), "logged out");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn refresh(&mut self, min_validity_secs: u64) -> Result<bool, SessionError> {
        let now = Utc::now();
        let tokens = self.tokens.as_ref().ok_or(SessionError::NotAuthenticated)?;
        if !tokens.expires_within(min_validity_secs, now) {
            debug!(remaining_secs = tokens.remaining(now).num_seconds(), "token still fresh");
            return Ok(false);
        }

        let Some(refresh_token) = tokens.usable_refresh_token(now).map(str::to_string) else {
            self.discard();
            return Err(SessionError::RefreshFailed(
                "refresh token is missing or expired".into(),
            ));
        };

        match self.identity.refresh(&refresh_token).await {
            Ok(mut fresh) => {
                // Some providers omit the refresh token when it is not rotated.
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token = Some(refresh_token);
                    fresh.refresh_expires_at =
                        self.tokens.as_ref().and_then(|old| old.refresh_expires_at);
                }
                self.replace_tokens(fresh)?;
                debug!("access token refreshed");
                Ok(true)
            }
            Err(err @ SessionError::Rejected { .. }) => {
                self.discard();
                Err(SessionError::RefreshFailed(err.to_string()))
            }
            Err(err) => Err(SessionError::RefreshFailed(err.to_string())),
        }
    }
}
