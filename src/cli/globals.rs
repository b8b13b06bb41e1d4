use crate::gate::store::UserSecret;
use crate::gate::{DEFAULT_ALLOWLIST_TTL, DEFAULT_RATE_LIMIT_TTL, DEFAULT_SALT, GateConfig};
use secrecy::SecretString;
use std::time::Duration;

/// Runtime configuration assembled from CLI arguments and environment.
#[derive(Clone, Debug)]
pub struct GlobalArgs {
    pub pre_key: SecretString,
    pub users: Vec<UserSecret>,
    pub salt: Option<String>,
    pub rate_limit_ttl: Duration,
    pub allowlist_ttl: Duration,
    /// Trust `x-forwarded-for`/`x-real-ip` for client addresses; only safe
    /// behind a proxy that overwrites them.
    pub behind_proxy: bool,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(pre_key: SecretString, users: Vec<UserSecret>) -> Self {
        Self {
            pre_key,
            users,
            salt: Some(DEFAULT_SALT.to_string()),
            rate_limit_ttl: DEFAULT_RATE_LIMIT_TTL,
            allowlist_ttl: DEFAULT_ALLOWLIST_TTL,
            behind_proxy: false,
        }
    }

    #[must_use]
    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            pre_key: self.pre_key.clone(),
            salt: self.salt.clone(),
            rate_limit_ttl: self.rate_limit_ttl,
            allowlist_ttl: self.allowlist_ttl,
        }
    }
}
