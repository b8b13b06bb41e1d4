//! The admission-control pipeline.
//!
//! Every inbound request walks the same sequence: method check, constant-time
//! pre-key verification, knock-digest match, allowlist write. An allowlist
//! entry is never created without a successful pre-key check AND a successful
//! knock match, in that order. Every failure past the method check runs the
//! rate limiter before the denial is returned; backend failures read as
//! denials (fail closed), never as admissions or 5xx.

pub mod authenticator;
pub mod matcher;
pub mod memory;
pub mod store;

use crate::gate::store::{AllowlistStore, RateLimitDecision, RateLimiter, SecretStore};
use axum::http::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Header carrying the shared pre-key.
pub const PRE_KEY_HEADER: &str = "vpnauth";

/// Salt appended to knock material unless disabled; must match the client.
pub const DEFAULT_SALT: &str = "default-salt-value";

/// Rate-limit marker lifetime: 4 hours.
pub const DEFAULT_RATE_LIMIT_TTL: Duration = Duration::from_secs(14400);

/// Allowlist entry lifetime: 8 hours.
pub const DEFAULT_ALLOWLIST_TTL: Duration = Duration::from_secs(28800);

#[derive(Clone, Debug)]
pub struct GateConfig {
    pub pre_key: SecretString,
    /// `None` runs the unsalted variant; keep in sync with deployed clients.
    pub salt: Option<String>,
    pub rate_limit_ttl: Duration,
    pub allowlist_ttl: Duration,
}

impl GateConfig {
    #[must_use]
    pub fn new(pre_key: SecretString) -> Self {
        Self {
            pre_key,
            salt: Some(DEFAULT_SALT.to_string()),
            rate_limit_ttl: DEFAULT_RATE_LIMIT_TTL,
            allowlist_ttl: DEFAULT_ALLOWLIST_TTL,
        }
    }
}

/// The per-request inputs the pipeline decides on.
pub struct KnockRequest<'a> {
    pub method: Method,
    /// Request path with the leading slash stripped.
    pub digest_path: &'a str,
    /// Raw `VPNAuth` header bytes, if present.
    pub pre_key: Option<&'a [u8]>,
    pub client_addr: &'a str,
    /// Target hostname; separate virtual hosts throttle independently.
    pub host: &'a str,
}

impl fmt::Debug for KnockRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnockRequest")
            .field("method", &self.method)
            .field("digest_path", &self.digest_path)
            .field("pre_key", &self.pre_key.map(|_| "REDACTED"))
            .field("client_addr", &self.client_addr)
            .field("host", &self.host)
            .finish()
    }
}

/// Terminal outcome of the pipeline, carrying its HTTP mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Admitted { username: String },
    Unauthorized,
    Rejected,
    RateLimited,
    MethodNotAllowed,
}

impl Decision {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Admitted { .. } => StatusCode::OK,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Rejected => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Fixed body text; denial bodies never vary with the failure reason
    /// beyond the status itself, to avoid aiding enumeration.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Admitted { .. } => {
                "Authenticated successfully. Please wait 2 minutes before connecting."
            }
            Self::Unauthorized => "Unauthorized",
            Self::Rejected => "Rejected",
            Self::RateLimited => "Rate limit exceeded. Try again later.",
            Self::MethodNotAllowed => "Method not allowed",
        }
    }
}

/// The admission gate: pipeline configuration plus injected backends.
pub struct Gate {
    config: GateConfig,
    secrets: Arc<dyn SecretStore>,
    allowlist: Arc<dyn AllowlistStore>,
    limiter: Arc<dyn RateLimiter>,
}

impl Gate {
    #[must_use]
    pub fn new(
        config: GateConfig,
        secrets: Arc<dyn SecretStore>,
        allowlist: Arc<dyn AllowlistStore>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            config,
            secrets,
            allowlist,
            limiter,
        }
    }

    /// Run the pipeline for one request. Infallible by construction: every
    /// backend error collapses into a denial.
    pub async fn decide(&self, request: &KnockRequest<'_>) -> Decision {
        // 1. Method check; terminal, no rate-limit interaction.
        if request.method != Method::GET {
            return Decision::MethodNotAllowed;
        }

        // 2. Pre-key check. Missing and oversized headers take the same
        // denial path as a wrong key.
        let candidate = request.pre_key.unwrap_or_default();
        if !authenticator::authenticate(candidate, self.config.pre_key.expose_secret().as_bytes())
        {
            return self.deny(request, Decision::Unauthorized).await;
        }

        // 3. Knock match over the registry snapshot.
        let registry = match self.secrets.list().await {
            Ok(registry) => registry,
            Err(err) => {
                error!("Secret registry unavailable: {err:#}");
                return self.deny(request, Decision::Rejected).await;
            }
        };

        let Some(username) =
            matcher::find_match(request.digest_path, &registry, self.config.salt.as_deref())
        else {
            return self.deny(request, Decision::Rejected).await;
        };

        // 4. Admit. A failed write must not read as success.
        if let Err(err) = self
            .allowlist
            .admit(request.client_addr, &username, self.config.allowlist_ttl)
            .await
        {
            error!("Allowlist write failed for {username}: {err:#}");
            return self.deny(request, Decision::Rejected).await;
        }

        info!(
            username,
            client = request.client_addr,
            "Admitted for {:?}",
            self.config.allowlist_ttl
        );
        Decision::Admitted { username }
    }

    /// Uniform denial path: drop a rate-limit marker for this (client, host)
    /// pair; an existing marker, or an unreachable limiter, wins over the
    /// underlying denial.
    async fn deny(&self, request: &KnockRequest<'_>, denial: Decision) -> Decision {
        let key = rate_limit_key(request.host, request.client_addr);
        match self
            .limiter
            .check_and_mark(&key, self.config.rate_limit_ttl)
            .await
        {
            Ok(RateLimitDecision::Allowed) => denial,
            Ok(RateLimitDecision::Limited) => Decision::RateLimited,
            Err(err) => {
                // Fail closed: an unreachable limiter must not become a
                // brute-force bypass.
                warn!("Rate limiter unavailable, failing closed: {err:#}");
                Decision::RateLimited
            }
        }
    }
}

fn rate_limit_key(host: &str, client_addr: &str) -> String {
    format!("ratelimit:{host}:{client_addr}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::memory::{MemoryAllowlist, MemoryRateLimiter, MemorySecrets};
    use crate::gate::store::UserSecret;
    use anyhow::anyhow;
    use async_trait::async_trait;

    const PRE_KEY: &str = "a-very-long-pre-shared-key";

    struct Backends {
        gate: Gate,
        allowlist: Arc<MemoryAllowlist>,
    }

    fn gate_with(config: GateConfig, users: &[&str]) -> Backends {
        let allowlist = Arc::new(MemoryAllowlist::default());
        let secrets = Arc::new(MemorySecrets::new(
            users.iter().map(|name| UserSecret::from_username(*name)).collect(),
        ));
        let gate = Gate::new(
            config,
            secrets,
            allowlist.clone(),
            Arc::new(MemoryRateLimiter::default()),
        );
        Backends { gate, allowlist }
    }

    fn default_gate() -> Backends {
        gate_with(GateConfig::new(SecretString::from(PRE_KEY)), &["alice"])
    }

    fn knock<'a>(method: Method, path: &'a str, pre_key: Option<&'a [u8]>) -> KnockRequest<'a> {
        KnockRequest {
            method,
            digest_path: path,
            pre_key,
            client_addr: "203.0.113.7",
            host: "vpn.example.com",
        }
    }

    fn alice_digest() -> String {
        matcher::knock_digest("alice", Some(DEFAULT_SALT))
    }

    #[tokio::test]
    async fn admits_valid_knock_and_writes_allowlist() {
        let backends = default_gate();
        let digest = alice_digest();
        let request = knock(Method::GET, &digest, Some(PRE_KEY.as_bytes()));

        let decision = backends.gate.decide(&request).await;

        assert_eq!(
            decision,
            Decision::Admitted {
                username: "alice".to_string()
            }
        );
        assert_eq!(
            backends.allowlist.admitted("203.0.113.7"),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn rejects_non_get_before_anything_else() {
        let backends = default_gate();
        let digest = alice_digest();
        let request = knock(Method::POST, &digest, Some(PRE_KEY.as_bytes()));

        assert_eq!(
            backends.gate.decide(&request).await,
            Decision::MethodNotAllowed
        );
        assert_eq!(backends.allowlist.admitted("203.0.113.7"), None);
    }

    #[tokio::test]
    async fn wrong_pre_key_never_admits_even_with_valid_digest() {
        let backends = default_gate();
        let digest = alice_digest();
        let request = knock(Method::GET, &digest, Some(b"wrong-key"));

        assert_eq!(backends.gate.decide(&request).await, Decision::Unauthorized);
        assert_eq!(backends.allowlist.admitted("203.0.113.7"), None);
    }

    #[tokio::test]
    async fn missing_pre_key_is_unauthorized() {
        let backends = default_gate();
        let digest = alice_digest();
        let request = knock(Method::GET, &digest, None);

        assert_eq!(backends.gate.decide(&request).await, Decision::Unauthorized);
    }

    #[tokio::test]
    async fn unmatched_digest_is_rejected_without_allowlist_write() {
        let backends = default_gate();
        let digest = matcher::knock_digest("mallory", Some(DEFAULT_SALT));
        let request = knock(Method::GET, &digest, Some(PRE_KEY.as_bytes()));

        assert_eq!(backends.gate.decide(&request).await, Decision::Rejected);
        assert_eq!(backends.allowlist.admitted("203.0.113.7"), None);
    }

    #[tokio::test]
    async fn second_failure_within_ttl_is_rate_limited() {
        let backends = default_gate();
        let request = knock(Method::GET, "", Some(b"wrong-key"));

        assert_eq!(backends.gate.decide(&request).await, Decision::Unauthorized);
        assert_eq!(backends.gate.decide(&request).await, Decision::RateLimited);
    }

    #[tokio::test]
    async fn knock_failure_shares_the_limiter_with_auth_failure() {
        let backends = default_gate();
        let bad_digest = matcher::knock_digest("mallory", Some(DEFAULT_SALT));
        let rejected = knock(Method::GET, &bad_digest, Some(PRE_KEY.as_bytes()));
        assert_eq!(backends.gate.decide(&rejected).await, Decision::Rejected);

        // Same (client, host) pair: the marker from the knock failure now
        // gates the auth-failure path too.
        let unauthorized = knock(Method::GET, "", Some(b"wrong-key"));
        assert_eq!(
            backends.gate.decide(&unauthorized).await,
            Decision::RateLimited
        );
    }

    #[tokio::test]
    async fn marker_does_not_block_successful_knock() {
        let backends = default_gate();
        let failed = knock(Method::GET, "", Some(b"wrong-key"));
        assert_eq!(backends.gate.decide(&failed).await, Decision::Unauthorized);

        // The limiter only gates failure paths; a correct knock still lands.
        let digest = alice_digest();
        let request = knock(Method::GET, &digest, Some(PRE_KEY.as_bytes()));
        assert_eq!(
            backends.gate.decide(&request).await,
            Decision::Admitted {
                username: "alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn successive_knocks_overwrite_allowlist_entry() {
        let backends = gate_with(
            GateConfig::new(SecretString::from(PRE_KEY)),
            &["alice", "bob"],
        );
        let alice = alice_digest();
        let bob = matcher::knock_digest("bob", Some(DEFAULT_SALT));

        let first = knock(Method::GET, &alice, Some(PRE_KEY.as_bytes()));
        backends.gate.decide(&first).await;
        let second = knock(Method::GET, &bob, Some(PRE_KEY.as_bytes()));
        backends.gate.decide(&second).await;

        assert_eq!(
            backends.allowlist.admitted("203.0.113.7"),
            Some("bob".to_string())
        );
    }

    #[tokio::test]
    async fn unsalted_variant_matches_bare_digest() {
        let mut config = GateConfig::new(SecretString::from(PRE_KEY));
        config.salt = None;
        let backends = gate_with(config, &["alice"]);
        let digest = matcher::knock_digest("alice", None);
        let request = knock(Method::GET, &digest, Some(PRE_KEY.as_bytes()));

        assert_eq!(
            backends.gate.decide(&request).await,
            Decision::Admitted {
                username: "alice".to_string()
            }
        );
    }

    struct FailingLimiter;

    #[async_trait]
    impl store::RateLimiter for FailingLimiter {
        async fn check_and_mark(
            &self,
            _key: &str,
            _ttl: Duration,
        ) -> anyhow::Result<RateLimitDecision> {
            Err(anyhow!("backend unreachable"))
        }
    }

    #[tokio::test]
    async fn unreachable_limiter_fails_closed() {
        let gate = Gate::new(
            GateConfig::new(SecretString::from(PRE_KEY)),
            Arc::new(MemorySecrets::new(vec![UserSecret::from_username("alice")])),
            Arc::new(MemoryAllowlist::default()),
            Arc::new(FailingLimiter),
        );
        let request = knock(Method::GET, "", Some(b"wrong-key"));
        assert_eq!(gate.decide(&request).await, Decision::RateLimited);
    }

    struct FailingSecrets;

    #[async_trait]
    impl SecretStore for FailingSecrets {
        async fn list(&self) -> anyhow::Result<Vec<UserSecret>> {
            Err(anyhow!("registry unreachable"))
        }
    }

    #[tokio::test]
    async fn unreachable_registry_denies_instead_of_erroring() {
        let gate = Gate::new(
            GateConfig::new(SecretString::from(PRE_KEY)),
            Arc::new(FailingSecrets),
            Arc::new(MemoryAllowlist::default()),
            Arc::new(MemoryRateLimiter::default()),
        );
        let digest = matcher::knock_digest("alice", Some(DEFAULT_SALT));
        let request = knock(Method::GET, &digest, Some(PRE_KEY.as_bytes()));
        assert_eq!(gate.decide(&request).await, Decision::Rejected);
    }

    #[test]
    fn decision_http_mapping() {
        assert_eq!(
            Decision::Admitted {
                username: "alice".to_string()
            }
            .status(),
            StatusCode::OK
        );
        assert_eq!(Decision::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Decision::Rejected.status(), StatusCode::NOT_FOUND);
        assert_eq!(Decision::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            Decision::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(Decision::Rejected.message(), "Rejected");
    }
}
