//! ShareBot Daemon - Telegram to file share relay
//!
//! This binary runs as a service (systemd, container) and handles:
//! - Long polling the Telegram Bot API
//! - Relaying every received file onto the configured share
//! - Answering `/status` with share health and transfer counters
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Configuration is resolved once at start-up (`.env`, YAML file,
//! environment). The daemon then wires connector → share client →
//! pipeline → reporter → bot and runs the bot until a
//! `CancellationToken` is triggered by SIGTERM or SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sharebot_core::config::{Config, LoggingConfig};
use sharebot_core::domain::{FileNamer, SingleUserAuthorizer};
use sharebot_core::usecases::{
    OutcomeTracker, RemoteShareClient, ShareHealth, StatusReporter, TransferPipeline,
};
use sharebot_telegram::{Bot, BotClient, BotSettings};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "sharebotd", version, about = "ShareBot relay daemon")]
struct Args {
    /// Path to a YAML configuration file (overrides SHAREBOT_CONFIG)
    #[arg(long, short)]
    config: Option<PathBuf>,
}

// ============================================================================
// RelayService
// ============================================================================

/// Owns the resolved configuration and the shutdown token
struct RelayService {
    config: Config,
    shutdown: CancellationToken,
}

impl RelayService {
    /// Validates `config`; every problem is reported at once
    fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                error!(field = %e.field, "{}", e.message);
            }
            anyhow::bail!("Invalid configuration ({} problem(s))", errors.len());
        }
        Ok(Self { config, shutdown })
    }

    /// Builds the object graph
    fn wire(&self) -> Result<(Bot, Arc<StatusReporter>)> {
        let config = &self.config;

        let connector = sharebot_share::connector_for(&config.share)?;
        let backup_root = config
            .share
            .backup_path()
            .context("Invalid backup directory")?;

        let share = Arc::new(RemoteShareClient::new(
            connector,
            config.transfer.connect_retry.clone(),
            backup_root.clone(),
        ));
        let tracker = Arc::new(OutcomeTracker::new());
        let pipeline = Arc::new(TransferPipeline::new(
            Arc::clone(&share),
            FileNamer::new(backup_root, config.naming.date_subdirectories),
            config.transfer.settings(),
            Arc::clone(&tracker),
        ));
        let reporter = Arc::new(StatusReporter::new(share, tracker, config.share.summary()));

        let client = BotClient::with_base_url(config.bot.token.expose(), &config.bot.api_url);
        let authorizer = Arc::new(SingleUserAuthorizer::new(config.bot.authorized_sender()));

        let bot = Bot::new(
            client,
            pipeline,
            Arc::clone(&reporter),
            authorizer,
            BotSettings::from_config(&config.bot),
        );
        Ok((bot, reporter))
    }

    async fn run(&self) -> Result<()> {
        let (bot, reporter) = self.wire()?;

        info!(
            endpoint = %self.config.share.endpoint(),
            backup_directory = %self.config.share.backup_directory,
            max_file_size_mb = self.config.transfer.max_file_size_mb,
            authorized_user_id = ?self.config.bot.authorized_user_id,
            "Relay configured"
        );

        // A share that is down at start-up is not fatal; transfers reconnect
        match reporter.report().await.share_status {
            ShareHealth::Healthy => info!("File share reachable"),
            ShareHealth::Degraded { reason } => warn!(%reason, "File share degraded"),
            ShareHealth::Unreachable { reason } => {
                warn!(%reason, "File share unreachable, will retry per transfer")
            }
        }

        bot.run(self.shutdown.clone()).await
    }
}

// ============================================================================
// Logging
// ============================================================================

/// RUST_LOG wins; otherwise `logging.level` applies to every target
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::resolve(args.config.as_deref())?;

    init_tracing(&config.logging);
    info!("ShareBot daemon starting (sharebotd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = RelayService::new(config, shutdown_token)?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("ShareBot daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "ShareBot daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sharebot_core::config::ConfigBuilder;

    fn mounted_config(root: &std::path::Path) -> Config {
        ConfigBuilder::new()
            .mount_point(root)
            .backup_directory("/backups")
            .bot_token("123:abc")
            .authorized_user_id(42)
            .build()
    }

    #[test]
    fn test_args_accept_config_path() {
        let args = Args::parse_from(["sharebotd", "--config", "/etc/sharebot.yaml"]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/sharebot.yaml")));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = RelayService::new(Config::default(), CancellationToken::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_wires_mounted_backend() {
        let dir = tempfile::tempdir().unwrap();
        let service =
            RelayService::new(mounted_config(dir.path()), CancellationToken::new()).unwrap();
        assert!(service.wire().is_ok());
    }

    #[tokio::test]
    async fn test_start_up_report_sees_mounted_share() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("backups")).unwrap();
        let service =
            RelayService::new(mounted_config(dir.path()), CancellationToken::new()).unwrap();

        let (_bot, reporter) = service.wire().unwrap();
        let report = reporter.report().await;

        assert_eq!(report.share_status, ShareHealth::Healthy);
        assert_eq!(report.share.backup_directory, "/backups");
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_running_service() {
        use std::time::Duration;

        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"id": 1, "is_bot": true, "first_name": "ShareBot", "username": "share_bot"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": []}))
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("backups")).unwrap();
        let mut config = mounted_config(dir.path());
        config.bot.api_url = server.uri();

        let shutdown = CancellationToken::new();
        let service = RelayService::new(config, shutdown.clone()).unwrap();
        let running = tokio::spawn(async move { service.run().await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!running.is_finished());
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("service kept running after shutdown")
            .unwrap();
        assert!(result.is_ok());

        let polls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with("/getUpdates"))
            .count();
        assert!(polls >= 1);
    }
}
