//! Knock-digest matching against the user registry.

use crate::gate::store::UserSecret;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

const DIGEST_HEX_LEN: usize = 64;

/// Render the knock digest for one registry entry: SHA-256 over
/// `<knock>` or `<knock>:<salt>`, lowercase hex.
///
/// Clients compute the same digest, so the salt must match between client and
/// server when salting is enabled.
#[must_use]
pub fn knock_digest(knock: &str, salt: Option<&str>) -> String {
    let material = match salt {
        Some(salt) => format!("{knock}:{salt}"),
        None => knock.to_string(),
    };
    hex::encode(Sha256::digest(material.as_bytes()))
}

/// Find the registry entry whose knock digest equals the request path.
///
/// Ordinary string equality is fine here: the path is already public to
/// anyone observing the request, so no secret is being compared. The scan is
/// O(n) over a small registry and rare per client thanks to rate limiting;
/// first match wins (digests are assumed unique in practice).
#[must_use]
pub fn find_match(digest_path: &str, registry: &[UserSecret], salt: Option<&str>) -> Option<String> {
    // Anything that is not 64 lowercase hex chars can never be a digest.
    if digest_path.len() != DIGEST_HEX_LEN
        || !digest_path
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }

    registry
        .iter()
        .find(|user| knock_digest(user.knock.expose_secret(), salt) == digest_path)
        .map(|user| user.username.clone())
}
