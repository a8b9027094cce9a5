use anyhow::{Context, Result};
use chrono::{Local, Utc};
use client::{KeycloakSession, SessionProvider, TokenStore, oauth::PKCE_METHOD};
use shared::config::Config;

use super::open_session;

pub async fn login(config: &Config) -> Result<()> {
    let mut session = open_session(config)?;
    session.login().await.context("login failed")?;
    print_session_summary(&session, config);
    Ok(())
}

pub async fn logout(config: &Config) -> Result<()> {
    let mut session = open_session(config)?;
    let was_signed_in = session.authenticated();
    session.logout().await.context("logout failed")?;

    if was_signed_in {
        println!("Signed out of realm {}", config.identity.realm);
    } else {
        println!("No active session");
    }
    Ok(())
}

pub fn status(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    if session.authenticated() {
        print_session_summary(&session, config);
    } else {
        println!("Not signed in. Run `reports login` to sign in.");
    }
    println!("PKCE method: {PKCE_METHOD}");
    println!("redirect URI: {}", config.identity.redirect_uri()?);
    Ok(())
}

fn print_session_summary<S: TokenStore>(session: &KeycloakSession<S>, config: &Config) {
    let who = session
        .claims()
        .and_then(|claims| claims.display_name().map(str::to_string))
        .unwrap_or_else(|| "unknown user".to_string());
    println!("Signed in as {who}");
    println!(
        "realm: {} (client {})",
        config.identity.realm, config.identity.client_id
    );
    if let Some(expires_at) = session.expires_at() {
        let state = if expires_at > Utc::now() {
            "access token expires at"
        } else {
            "access token expired at"
        };
        println!(
            "{state}: {}",
            expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }
}
