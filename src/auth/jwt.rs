//! Unverified JWT claim inspection.
//!
//! The client never validates signatures; it only peeks at the payload to
//! report expiry and the identity the server minted the token for.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

/// The subset of access-token claims the client cares about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
}

/// Decode the payload segment of a compact JWT. Returns `None` for opaque or
/// malformed tokens.
pub fn peek_claims(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}
