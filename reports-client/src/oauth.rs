//! Authorization-code + PKCE (S256) exchanges against the identity provider.

use std::{borrow::Cow, time::Duration};

use chrono::Utc;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
    basic::{BasicClient, BasicErrorResponse, BasicTokenResponse},
};
use reqwest::Client;
use shared::config::Config;
use tracing::{debug, instrument};
use url::Url;

use crate::{error::SessionError, store::TokenSet};

type KeycloakClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Method announced in the authorization request.
pub const PKCE_METHOD: &str = "S256";

/// An authorization request waiting for its redirect.
#[derive(Debug)]
pub struct PendingAuthorization {
    /// Where the browser must go.
    pub url: Url,
    /// Expected `state` on the redirect.
    pub csrf_state: CsrfToken,
    /// Secret half of the PKCE pair, sent with the code exchange.
    pub verifier: PkceCodeVerifier,
}

/// OAuth client bound to one realm and public client id.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    oauth: KeycloakClient,
    http: Client,
    end_session: Url,
    client_id: String,
    realm: String,
    scopes: Vec<String>,
}

impl IdentityClient {
    /// Build the client from configuration.
    ///
    /// # Errors
    /// Returns an error when an endpoint URL is malformed or the HTTP client
    /// cannot be built.
    pub fn new(config: &Config) -> Result<Self, SessionError> {
        let identity = &config.identity;
        let oauth = BasicClient::new(ClientId::new(identity.client_id.clone()))
            .set_auth_uri(AuthUrl::from_url(identity.authorization_endpoint()?))
            .set_token_uri(TokenUrl::from_url(identity.token_endpoint()?));

        Ok(Self {
            oauth,
            http: create_http_client(Duration::from_secs(config.api.request_timeout_secs))?,
            end_session: identity.end_session_endpoint()?,
            client_id: identity.client_id.clone(),
            realm: identity.realm.clone(),
            scopes: identity.scopes.clone(),
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Start an authorization request with a fresh S256 challenge and state.
    #[must_use]
    pub fn authorize(&self, redirect: &RedirectUrl) -> PendingAuthorization {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf_state) = self
            .oauth
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(challenge)
            .set_redirect_uri(Cow::Borrowed(redirect))
            .url();

        PendingAuthorization {
            url,
            csrf_state,
            verifier,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    /// Returns [`SessionError::Rejected`] when the provider refuses the code,
    /// [`SessionError::Transport`] for anything else.
    #[instrument(skip_all, fields(realm = %self.realm))]
    pub async fn exchange_code(
        &self,
        code: String,
        verifier: PkceCodeVerifier,
        redirect: &RedirectUrl,
    ) -> Result<TokenSet, SessionError> {
        let response = self
            .oauth
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .set_redirect_uri(Cow::Borrowed(redirect))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;
        debug!("authorization code exchanged");
        Ok(token_set(&response))
    }

    /// Exchange a refresh token for a new token set.
    ///
    /// # Errors
    /// Same classification as [`IdentityClient::exchange_code`].
    #[instrument(skip_all, fields(realm = %self.realm))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, SessionError> {
        let response = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;
        debug!("refresh token exchanged");
        Ok(token_set(&response))
    }

    /// End the provider-side session tied to `refresh_token`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the provider answers non-2xx.
    #[instrument(skip_all, fields(realm = %self.realm))]
    pub async fn end_session(&self, refresh_token: &str) -> Result<(), SessionError> {
        let response = self
            .http
            .post(self.end_session.clone())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|err| SessionError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("identity provider session ended");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SessionError::Rejected {
                error: status.to_string(),
                description: Some(body).filter(|text| !text.is_empty()),
            })
        }
    }
}

/// Creates an HTTP client for identity provider calls.
///
/// Redirects are disabled: token endpoints never legitimately redirect.
///
/// # Errors
/// Returns [`SessionError::Transport`] if the TLS backend fails to initialise.
pub fn create_http_client(timeout: Duration) -> Result<Client, SessionError> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .user_agent(concat!("usage-reports/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| SessionError::Transport(err.to_string()))
}

fn token_set(response: &BasicTokenResponse) -> TokenSet {
    TokenSet::issued(
        response.access_token().secret().clone(),
        response.refresh_token().map(|token| token.secret().clone()),
        response.expires_in(),
        Utc::now(),
    )
}

fn map_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> SessionError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => SessionError::Rejected {
            error: response.error().to_string(),
            description: response.error_description().cloned(),
        },
        other => SessionError::Transport(other.to_string()),
    }
}
