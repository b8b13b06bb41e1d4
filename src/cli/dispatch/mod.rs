use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::gate::authenticator::MAX_PRE_KEY_LEN;
use crate::gate::store::UserSecret;
use anyhow::{Result, anyhow};
use secrecy::SecretString;
use std::time::Duration;

/// Parse one `--users` entry: `<name>` or `<name>=<knock>`.
///
/// Usernames are lowercased to match what clients hash.
fn parse_user(entry: &str) -> Result<UserSecret> {
    let entry = entry.trim();
    let (name, knock) = match entry.split_once('=') {
        Some((name, knock)) => (name.trim(), Some(knock.trim())),
        None => (entry, None),
    };
    if name.is_empty() {
        return Err(anyhow!("empty username in --users entry: {entry:?}"));
    }
    let name = name.to_lowercase();
    Ok(match knock {
        Some(knock) if !knock.is_empty() => UserSecret::new(name, knock),
        Some(_) => return Err(anyhow!("empty knock in --users entry: {entry:?}")),
        None => UserSecret::from_username(name),
    })
}

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let pre_key = matches
        .get_one::<String>("pre-key")
        .ok_or_else(|| anyhow!("missing required argument: --pre-key"))?;
    if pre_key.is_empty() || pre_key.len() > MAX_PRE_KEY_LEN {
        return Err(anyhow!(
            "--pre-key must be between 1 and {MAX_PRE_KEY_LEN} bytes"
        ));
    }

    let users = matches
        .get_many::<String>("users")
        .ok_or_else(|| anyhow!("missing required argument: --users"))?
        .map(|entry| parse_user(entry))
        .collect::<Result<Vec<_>>>()?;

    let mut globals = GlobalArgs::new(SecretString::from(pre_key.as_str()), users);

    globals.salt = if matches.get_flag("no-salt") {
        None
    } else {
        matches.get_one::<String>("salt").cloned()
    };

    globals.behind_proxy = matches.get_flag("behind-proxy");

    if let Some(ttl) = matches.get_one::<u64>("rate-limit-ttl") {
        globals.rate_limit_ttl = Duration::from_secs(*ttl);
    }
    if let Some(ttl) = matches.get_one::<u64>("allowlist-ttl") {
        globals.allowlist_ttl = Duration::from_secs(*ttl);
    }

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        globals,
    })
}
