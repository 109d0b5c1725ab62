use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::TokenError;

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Read the expiry of a compact token WITHOUT verifying its signature.
///
/// Only used to decide when to refresh a cached token. Never use it to
/// decide whether a token is trustworthy; the agent owns that.
pub fn unsafe_token_expiry(token: &str) -> Result<OffsetDateTime, TokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() < 2 {
        return Err(TokenError::Malformed { parts: parts.len() });
    }
    let payload = URL_SAFE_NO_PAD.decode(parts[1])?;
    let claims: Claims = serde_json::from_slice(&payload)?;
    let exp = claims.exp.ok_or(TokenError::NoExpiry)?;
    OffsetDateTime::from_unix_timestamp(exp).map_err(|_| TokenError::NoExpiry)
}

#[cfg(test)]
pub(crate) fn test_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"sub":"user"}}"#));
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_expiry() {
        let exp = unsafe_token_expiry(&test_token(1_700_000_000)).unwrap();
        assert_eq!(exp.unix_timestamp(), 1_700_000_000);
        // Stable across calls and surrounding whitespace.
        let again = unsafe_token_expiry(&format!("{}\n", test_token(1_700_000_000))).unwrap();
        assert_eq!(exp, again);
    }

    #[test]
    fn error_messages() {
        assert_eq!(unsafe_token_expiry("").unwrap_err().to_string(), "jwt: empty token");
        assert_eq!(
            unsafe_token_expiry("abc").unwrap_err().to_string(),
            "jwt: malformed token, expected 3 parts, got 1"
        );
        assert!(unsafe_token_expiry("a.!!!.c")
            .unwrap_err()
            .to_string()
            .starts_with("jwt: decode payload"));

        let no_exp = format!("a.{}.c", URL_SAFE_NO_PAD.encode(br#"{"sub":"x"}"#));
        assert_eq!(
            unsafe_token_expiry(&no_exp).unwrap_err().to_string(),
            "jwt: no expiry time found"
        );

        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode(b"nope"));
        assert!(unsafe_token_expiry(&not_json)
            .unwrap_err()
            .to_string()
            .starts_with("jwt: unmarshal claims"));
    }
}
