//! Send command - Back up a local file
//!
//! Feeds a local file through the same [`TransferPipeline`] the bot uses,
//! so naming, collision handling and size limits behave identically.
//! Ctrl+C cancels the transfer and removes the partial file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use sharebot_core::config::Config;
use sharebot_core::domain::{FileNamer, InboundFile, MediaKind, SenderId, TransferOutcome};
use sharebot_core::ports::{ByteStream, IFileSource};
use sharebot_core::usecases::{OutcomeTracker, TransferPipeline};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::share_client;
use crate::output::{get_formatter, OutputFormat};

/// Read buffer for local files
const READ_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Args)]
pub struct SendCommand {
    /// File to back up
    pub file: PathBuf,

    /// Name to store the file under (defaults to the local file name)
    #[arg(long)]
    pub name: Option<String>,
}

/// Local file as a re-openable byte source
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl IFileSource for LocalFileSource {
    async fn open(&self) -> Result<ByteStream> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        Ok(Box::pin(ReaderStream::with_capacity(file, READ_CAPACITY)))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

impl SendCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let config = Config::resolve(config_path)?;

        let inbound = self.inbound(&config).await?;
        let pipeline = pipeline(&config)?;

        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        info!(file = %self.file.display(), "Sending file");
        let outcome = pipeline.execute_with_cancel(inbound, &cancel).await;

        if format.is_json() {
            let json = serde_json::to_value(&outcome).context("Failed to serialize outcome")?;
            formatter.print_json(&json);
        }

        match outcome {
            TransferOutcome::Success {
                bytes_written,
                target_path,
                duration,
                leftover,
            } => {
                formatter.success(&format!("Backed up to {target_path}"));
                formatter.field("Bytes", &bytes_written.to_string());
                formatter.field("Duration", &format!("{} ms", duration.as_millis()));
                if let Some(path) = leftover {
                    formatter.warn(&format!("Partial file left at {path}"));
                }
                Ok(())
            }
            TransferOutcome::Failure {
                error_kind,
                message,
                leftover,
                ..
            } => {
                debug!(%message, "Transfer failed");
                if let Some(path) = leftover {
                    formatter.warn(&format!("Partial file left at {path}"));
                }
                Err(anyhow::anyhow!("{message}")
                    .context(format!("Backup failed: {}", error_kind.describe())))
            }
        }
    }

    async fn inbound(&self, config: &Config) -> Result<InboundFile> {
        let metadata = tokio::fs::metadata(&self.file)
            .await
            .with_context(|| format!("Cannot read {}", self.file.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("{} is not a regular file", self.file.display());
        }

        let name = match &self.name {
            Some(name) => name.clone(),
            None => self
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let sender = config.bot.authorized_sender().unwrap_or(SenderId::new(0));

        Ok(InboundFile::new(
            Arc::new(LocalFileSource::new(&self.file)),
            MediaKind::Document,
            sender,
        )
        .with_original_name(name)
        .with_declared_size(metadata.len()))
    }
}

fn pipeline(config: &Config) -> Result<TransferPipeline> {
    let share = share_client(config)?;
    let namer = FileNamer::new(
        share.backup_root().clone(),
        config.naming.date_subdirectories,
    );
    Ok(TransferPipeline::new(
        share,
        namer,
        config.transfer.settings(),
        Arc::new(OutcomeTracker::new()),
    ))
}
