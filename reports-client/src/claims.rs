use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Claims read from a JWT payload without verifying its signature.
///
/// Used only for display and expiry bookkeeping; the report API remains the
/// authority on whether a token is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    pub sub: Option<String>,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub exp: Option<i64>,
    pub azp: Option<String>,
}

impl TokenClaims {
    /// Decode the payload segment of `token`, or `None` if it is not a JWT.
    #[must_use]
    pub fn decode_unverified(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// `exp` as a timestamp. Keycloak uses `0` for non-expiring offline tokens.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .filter(|exp| *exp > 0)
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Best human-readable identity: username, then email, then subject.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.preferred_username
            .as_deref()
            .or(self.email.as_deref())
            .or(self.sub.as_deref())
    }
}

#[cfg(test)]
pub(crate) fn fake_jwt(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_reads_identity_and_expiry() {
        let token = fake_jwt(&json!({
            "sub": "f1c2",
            "preferred_username": "alice",
            "email": "alice@example.com",
            "exp": 1_714_557_600
        }));

        let claims = TokenClaims::decode_unverified(&token).unwrap();
        assert_eq!(claims.display_name(), Some("alice"));
        assert_eq!(
            claims.expires_at().unwrap().to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_display_name_falls_back() {
        let claims = TokenClaims {
            email: Some("bob@example.com".into()),
            sub: Some("b0b".into()),
            ..TokenClaims::default()
        };
        assert_eq!(claims.display_name(), Some("bob@example.com"));

        let claims = TokenClaims {
            sub: Some("b0b".into()),
            ..TokenClaims::default()
        };
        assert_eq!(claims.display_name(), Some("b0b"));
    }

    #[test]
    fn test_zero_exp_means_no_expiry() {
        let token = fake_jwt(&json!({"exp": 0}));
        let claims = TokenClaims::decode_unverified(&token).unwrap();
        assert!(claims.expires_at().is_none());
    }

    #[test]
    fn test_opaque_tokens_are_not_decoded() {
        assert!(TokenClaims::decode_unverified("opaque-token").is_none());
        assert!(TokenClaims::decode_unverified("a.!!!.c").is_none());
    }
}
