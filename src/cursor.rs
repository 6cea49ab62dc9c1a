use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::analytics::EventCursor;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid cursor format")]
    Malformed,
    #[error("cursor signature verification failed")]
    BadSignature,
    #[error("failed to encode cursor")]
    Encode,
    #[error("invalid cursor signing key")]
    InvalidKey,
}

/// Signs and verifies opaque log-viewer cursors.
///
/// A cursor is `payload.signature`, where the payload is the JSON encoded
/// [`EventCursor`] and the signature is HMAC-SHA256 over the payload, both
/// base64url without padding.
#[derive(Clone)]
pub struct CursorSigner {
    key: Vec<u8>,
}

impl CursorSigner {
    /// Use `secret` as the HMAC key, or a random key when none is given
    /// (cursors then do not survive a restart)
    pub fn new(secret: Option<&str>) -> Self {
        let key = match secret {
            Some(s) => s.as_bytes().to_vec(),
            None => rand::random::<[u8; 32]>().to_vec(),
        };
        Self { key }
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, CursorError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| CursorError::InvalidKey)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, cursor: &EventCursor) -> Result<String, CursorError> {
        let json = serde_json::to_vec(cursor).map_err(|_| CursorError::Encode)?;
        let payload = BASE64_URL_SAFE_NO_PAD.encode(json);
        let signature = BASE64_URL_SAFE_NO_PAD.encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    pub fn verify(&self, token: &str) -> Result<EventCursor, CursorError> {
        let (payload, signature_b64) = token.split_once('.').ok_or(CursorError::Malformed)?;
        if signature_b64.contains('.') {
            return Err(CursorError::Malformed);
        }

        let provided = BASE64_URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| CursorError::Malformed)?;
        let expected = self.mac(payload)?.finalize().into_bytes();

        if !bool::from(expected.as_slice().ct_eq(&provided)) {
            return Err(CursorError::BadSignature);
        }

        let json = BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CursorError::Malformed)?;
        serde_json::from_slice(&json).map_err(|_| CursorError::Malformed)
    }
}
