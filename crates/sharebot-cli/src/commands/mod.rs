//! CLI subcommands

pub mod config;
pub mod send;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use sharebot_core::config::Config;
use sharebot_core::usecases::RemoteShareClient;

/// Share client for the configured backend
///
/// Only the share settings are validated; the CLI does not need a bot token.
pub fn share_client(config: &Config) -> Result<Arc<RemoteShareClient>> {
    let errors = config.validate_share();
    if !errors.is_empty() {
        let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Share is not configured: {}", joined.join("; "));
    }

    let connector = sharebot_share::connector_for(&config.share)?;
    let backup_root = config
        .share
        .backup_path()
        .context("Invalid backup directory")?;

    Ok(Arc::new(RemoteShareClient::new(
        connector,
        config.transfer.connect_retry.clone(),
        backup_root,
    )))
}
