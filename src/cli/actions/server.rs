use crate::cli::actions::Action;
use crate::frapi::new;
use anyhow::Result;
use tracing::info;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { port, globals } => {
            info!(
                users = globals.users.len(),
                salted = globals.salt.is_some(),
                rate_limit_ttl = globals.rate_limit_ttl.as_secs(),
                allowlist_ttl = globals.allowlist_ttl.as_secs(),
                "Starting gateway"
            );

            new(port, &globals).await?;
        }
    }

    Ok(())
}
