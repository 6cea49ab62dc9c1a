//! Visitor keys used to approximate unique visitor counts

use base64::prelude::*;
use sha2::{Digest, Sha256};

use crate::analytics::models::ClickEvent;

/// Derive the visitor key for an event.
///
/// Two events share a key when they have the same visitor hash, the same
/// user agent, and fall on the same UTC calendar day.
pub fn visitor_key(event: &ClickEvent) -> String {
    let day = event.timestamp.date_naive().format("%Y-%m-%d").to_string();

    let mut hasher = Sha256::new();
    hasher.update(event.visitor_hash.as_bytes());
    hasher.update([0u8]);
    hasher.update(event.user_agent.as_bytes());
    hasher.update([0u8]);
    hasher.update(day.as_bytes());

    BASE64_URL_SAFE_NO_PAD.encode(hasher.finalize())
}
