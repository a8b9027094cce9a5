#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Session and report client for the Usage Reports API.
//!
//! [`session::KeycloakSession`] owns the token lifecycle (PKCE login, refresh,
//! logout) and is injected into [`report::ReportView`], which drives the
//! single report request.

pub mod callback;
pub mod claims;
pub mod error;
pub mod oauth;
pub mod report;
pub mod session;
pub mod store;

pub use error::{ReportError, SessionError};
pub use report::{ReportApi, ReportView, ViewState};
pub use session::{KeycloakSession, SessionProvider};
pub use store::{FileTokenStore, TokenSet, TokenStore};
