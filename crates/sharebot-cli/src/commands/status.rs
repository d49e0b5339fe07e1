//! Status command - Check the configured file share
//!
//! Runs one status report: connects to the share, lists the backup
//! directory and prints the result.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use sharebot_core::config::Config;
use sharebot_core::usecases::{OutcomeTracker, ShareHealth, StatusReport, StatusReporter};
use tracing::info;

use super::share_client;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let config = Config::resolve(config_path)?;

        let share = share_client(&config)?;
        info!(endpoint = %share.endpoint(), "Checking share");

        let reporter = StatusReporter::new(
            share,
            Arc::new(OutcomeTracker::new()),
            config.share.summary(),
        );
        let report = reporter.report().await;

        if format.is_json() {
            let json = serde_json::to_value(&report).context("Failed to serialize status")?;
            formatter.print_json(&json);
        } else {
            print_human(&report, &*formatter);
        }

        if report.share_status.is_healthy() {
            Ok(())
        } else {
            anyhow::bail!("File share is not healthy")
        }
    }
}

fn print_human(report: &StatusReport, formatter: &dyn OutputFormatter) {
    match &report.share_status {
        ShareHealth::Healthy => formatter.success("File share is reachable"),
        ShareHealth::Degraded { reason } => {
            formatter.warn(&format!("File share is reachable but degraded: {reason}"))
        }
        ShareHealth::Unreachable { reason } => {
            formatter.error(&format!("File share is unreachable: {reason}"))
        }
    }

    let share = &report.share;
    formatter.field("Endpoint", &share.endpoint);
    if let Some(name) = &share.server_name {
        formatter.field("Server name", name);
    }
    formatter.field("Backup directory", &share.backup_directory);
    formatter.field(
        "Checked at",
        &report.checked_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
}
