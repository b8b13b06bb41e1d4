//! # Frapi (Single-Packet Authorization Gateway)
//!
//! `frapi` gates access to a VPN concentrator behind a two-factor admission
//! check: a shared pre-key presented in the `VPNAuth` request header, plus a
//! per-user "knock" value whose SHA-256 digest must appear as the request
//! path.
//!
//! ## Admission flow
//!
//! Every inbound request walks a fixed pipeline: method check, constant-time
//! pre-key verification, knock-digest match against the user registry, and on
//! success a time-limited allowlist write (client address → username) that the
//! downstream VPN concentrator consumes out of band.
//!
//! - **Fail closed:** any backend failure along the pipeline reads as a
//!   denial, never as an admission and never as a 5xx that would leak
//!   internal detail.
//! - **Rate limiting:** every failure path (missing or wrong pre-key,
//!   unmatched digest) drops a self-expiring marker keyed by client address
//!   and target host; a second failed attempt inside the TTL window is
//!   answered with `429` before any secret is examined again.
//! - **Enumeration resistance:** an unmatched digest returns `404` with a
//!   fixed body, indistinguishable for registered and unregistered users.

pub mod cli;
pub mod frapi;
pub mod gate;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
