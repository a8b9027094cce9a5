//! Loopback listener receiving the authorization redirect.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use oauth2::RedirectUrl;
use serde::Deserialize;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{debug, warn};

use crate::error::SessionError;

const CALLBACK_PATH: &str = "/callback";

const DONE_PAGE: &str = "<!doctype html><html><body>\
<p>Sign-in complete. You can close this window and return to the terminal.</p>\
</body></html>";

/// Query parameters of the redirect back from the identity provider.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Validate the redirect and hand back the authorization code.
    ///
    /// # Errors
    /// Returns [`SessionError::Rejected`] for an `error=` redirect and
    /// [`SessionError::InvalidCallback`] for a missing code or state mismatch.
    pub fn into_code(self, expected_state: &str) -> Result<String, SessionError> {
        if let Some(error) = self.error {
            return Err(SessionError::Rejected {
                error,
                description: self.error_description,
            });
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(SessionError::InvalidCallback(
                "state does not match the authorization request".into(),
            ));
        }
        self.code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| SessionError::InvalidCallback("missing authorization code".into()))
    }
}

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// One-shot HTTP listener on `127.0.0.1` for a single redirect.
#[derive(Debug)]
pub struct CallbackListener {
    addr: SocketAddr,
    receiver: oneshot::Receiver<CallbackParams>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind on `127.0.0.1:port`; port `0` picks a free port.
    ///
    /// # Errors
    /// Returns [`SessionError::Listener`] when the port cannot be bound.
    pub async fn bind(port: u16) -> Result<Self, SessionError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(SessionError::Listener)?;
        let addr = listener.local_addr().map_err(SessionError::Listener)?;

        let (sender, receiver) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(sender)));
        let router = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .with_state(slot);

        let (shutdown, shutdown_signal) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let graceful = axum::serve(listener, router).with_graceful_shutdown(async {
                shutdown_signal.await.ok();
            });
            if let Err(err) = graceful.await {
                warn!(error = %err, "callback listener stopped with an error");
            }
        });

        debug!(%addr, "callback listener bound");
        Ok(Self {
            addr,
            receiver,
            shutdown,
            server,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Redirect URI pointing at this listener.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidCallback`] if the URI cannot be built.
    pub fn redirect_url(&self) -> Result<RedirectUrl, SessionError> {
        RedirectUrl::new(format!("http://{}{CALLBACK_PATH}", self.addr))
            .map_err(|err| SessionError::InvalidCallback(err.to_string()))
    }

    /// Wait for the redirect, then shut the listener down.
    ///
    /// # Errors
    /// Returns [`SessionError::LoginTimedOut`] when nothing arrives in time.
    pub async fn wait(self, timeout: Duration) -> Result<CallbackParams, SessionError> {
        let outcome = tokio::time::timeout(timeout, self.receiver).await;

        self.shutdown.send(()).ok();
        if let Err(err) = self.server.await {
            warn!(error = %err, "callback listener task failed");
        }

        match outcome {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(SessionError::InvalidCallback(
                "callback listener closed before a redirect arrived".into(),
            )),
            Err(_) => Err(SessionError::LoginTimedOut(timeout.as_secs())),
        }
    }
}

async fn handle_callback(
    State(slot): State<CallbackSlot>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let sender = slot.lock().ok().and_then(|mut guard| guard.take());
    match sender {
        Some(sender) => {
            sender.send(params).ok();
        }
        None => debug!("ignoring repeated authorization redirect"),
    }
    Html(DONE_PAGE)
}
