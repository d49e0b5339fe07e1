//! Update dispatcher
//!
//! Long-polls the Bot API and routes every message:
//!
//! 1. Unauthorized senders get a refusal (and a warn-level log line)
//! 2. `/start`, `/help`, `/status` are answered directly
//! 3. Every attachment is relayed by its own task through the
//!    [`TransferPipeline`]; the task posts "Processing ..." and edits it
//!    into the final outcome
//!
//! ## Shutdown
//!
//! When the shutdown token fires, polling stops and in-flight transfers
//! observe the same token and finish as `Cancelled`. The dispatcher then
//! waits up to the grace period for every task to post its reply.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sharebot_core::config::BotConfig;
use sharebot_core::domain::{Authorizer, FileNamer, InboundFile, SenderId, TransferOutcome};
use sharebot_core::usecases::{StatusReporter, TransferPipeline};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::BotClient;
use crate::media::{attachments_of, expected_files, message_time};
use crate::replies;
use crate::types::{Message, Update};
use crate::TelegramError;

/// Dispatcher timing knobs
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Long-polling timeout passed to `getUpdates`
    pub poll_timeout: Duration,
    /// How long shutdown waits for in-flight tasks
    pub shutdown_grace: Duration,
    /// Pause after a failed poll
    pub error_backoff: Duration,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(30),
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl BotSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
            ..Self::default()
        }
    }
}

/// Telegram front end of the relay
pub struct Bot {
    client: BotClient,
    pipeline: Arc<TransferPipeline>,
    reporter: Arc<StatusReporter>,
    authorizer: Arc<dyn Authorizer>,
    settings: BotSettings,
}

/// Parsed bot command (`/status@MyBot` -> `status`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    Status,
    Unknown,
}

fn parse_command(text: &str) -> Option<Command> {
    let word = text.trim_start().split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    Some(match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "status" => Command::Status,
        _ => Command::Unknown,
    })
}

impl Bot {
    pub fn new(
        client: BotClient,
        pipeline: Arc<TransferPipeline>,
        reporter: Arc<StatusReporter>,
        authorizer: Arc<dyn Authorizer>,
        settings: BotSettings,
    ) -> Self {
        Self {
            client,
            pipeline,
            reporter,
            authorizer,
            settings,
        }
    }

    /// Polls and dispatches until `shutdown` is cancelled
    ///
    /// # Errors
    /// Fails when the bot token is rejected, at start-up or later.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let me = self
            .client
            .get_me()
            .await
            .context("Failed to reach the Telegram Bot API with the configured token")?;
        info!(
            bot = %me.username.as_deref().unwrap_or(&me.first_name),
            "Telegram bot online"
        );

        let mut tasks = JoinSet::new();
        let mut offset: Option<i64> = None;
        let poll_secs = self.settings.poll_timeout.as_secs();

        let result = loop {
            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }

            let polled = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                polled = self.client.get_updates(offset, poll_secs) => polled,
            };

            match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.dispatch(update, &mut tasks, &shutdown).await;
                    }
                }
                Err(TelegramError::Unauthorized(description)) => {
                    error!(%description, "Bot token rejected");
                    break Err(anyhow::anyhow!("Telegram rejected the bot token: {description}"));
                }
                Err(e) => {
                    warn!(error = %e, "Polling for updates failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(self.settings.error_backoff) => {}
                    }
                }
            }
        };

        info!("Stopping update polling");
        self.drain(tasks).await;
        self.acknowledge(offset).await;
        result
    }

    /// Confirms handled updates so they are not redelivered after restart
    async fn acknowledge(&self, offset: Option<i64>) {
        if offset.is_none() {
            return;
        }
        if let Err(e) = self.client.get_updates(offset, 0).await {
            debug!(error = %e, "Could not acknowledge last updates");
        }
    }

    async fn drain(&self, mut tasks: JoinSet<()>) {
        if tasks.is_empty() {
            return;
        }
        info!(pending = tasks.len(), "Waiting for in-flight tasks");

        let wait_all = async {
            while let Some(joined) = tasks.join_next().await {
                log_join(joined);
            }
        };
        if tokio::time::timeout(self.settings.shutdown_grace, wait_all)
            .await
            .is_err()
        {
            warn!(
                grace_secs = self.settings.shutdown_grace.as_secs(),
                "Grace period elapsed, aborting remaining tasks"
            );
            tasks.abort_all();
        }
    }

    async fn dispatch(&self, update: Update, tasks: &mut JoinSet<()>, shutdown: &CancellationToken) {
        let Some(message) = update.message else {
            return;
        };
        let Some(from) = message.from.as_ref() else {
            return;
        };
        let sender = SenderId::new(from.id);
        let chat_id = message.chat.id;
        let command = message.text.as_deref().and_then(parse_command);
        let attachments = attachments_of(&message);

        if !self.authorizer.is_authorized(sender) {
            warn!(%sender, "Unauthorized access attempt");
            if command.is_some() || !attachments.is_empty() || expected_files(&message) {
                send(&self.client, chat_id, replies::UNAUTHORIZED, Some(message.message_id)).await;
            }
            return;
        }

        if let Some(command) = command {
            self.handle_command(command, &message, tasks).await;
            return;
        }

        if attachments.is_empty() {
            if expected_files(&message) {
                send(&self.client, chat_id, replies::NO_FILES, Some(message.message_id)).await;
            }
            return;
        }

        let received_at = message_time(&message);
        debug!(%sender, count = attachments.len(), "Relaying attachments");
        for attachment in attachments {
            let inbound = attachment.into_inbound(self.client.clone(), sender, received_at);
            tasks.spawn(relay(
                self.client.clone(),
                Arc::clone(&self.pipeline),
                chat_id,
                message.message_id,
                inbound,
                shutdown.clone(),
            ));
        }
    }

    async fn handle_command(&self, command: Command, message: &Message, tasks: &mut JoinSet<()>) {
        let chat_id = message.chat.id;
        let reply_to = Some(message.message_id);
        match command {
            Command::Start => {
                let first_name = message
                    .from
                    .as_ref()
                    .map(|u| u.first_name.as_str())
                    .unwrap_or("there");
                send(&self.client, chat_id, &replies::greeting(first_name), reply_to).await;
            }
            Command::Help => send(&self.client, chat_id, replies::HELP, reply_to).await,
            Command::Status => {
                // Health checks can take a connect timeout; keep polling meanwhile
                let client = self.client.clone();
                let reporter = Arc::clone(&self.reporter);
                tasks.spawn(async move {
                    let report = reporter.report().await;
                    debug!(share_status = ?report.share_status, "Status requested");
                    send(&client, chat_id, &replies::status(&report), reply_to).await;
                });
            }
            Command::Unknown => {
                send(&self.client, chat_id, replies::UNKNOWN_COMMAND, reply_to).await;
            }
        }
    }
}

/// Relays one attachment and reports the outcome in the chat
async fn relay(
    client: BotClient,
    pipeline: Arc<TransferPipeline>,
    chat_id: i64,
    reply_to: i64,
    inbound: InboundFile,
    cancel: CancellationToken,
) {
    let name = FileNamer::base_name(&inbound).to_string();
    let progress = match client
        .send_message(chat_id, &replies::processing(&name), Some(reply_to))
        .await
    {
        Ok(sent) => Some(sent.message_id),
        Err(e) => {
            warn!(error = %e, "Could not post progress message");
            None
        }
    };

    let outcome = pipeline.execute_with_cancel(inbound, &cancel).await;
    match &outcome {
        TransferOutcome::Success {
            bytes_written,
            target_path,
            ..
        } => info!(file = %name, path = %target_path, bytes = bytes_written, "Backed up"),
        TransferOutcome::Failure {
            error_kind,
            message,
            retries_attempted,
            ..
        } => warn!(
            file = %name,
            kind = %error_kind,
            retries = retries_attempted,
            detail = %message,
            "Backup failed"
        ),
    }

    let text = replies::outcome(&name, &outcome);
    if let Some(message_id) = progress {
        match client.edit_message_text(chat_id, message_id, &text).await {
            Ok(()) => return,
            Err(e) => debug!(error = %e, "Edit failed, sending a new message"),
        }
    }
    send(&client, chat_id, &text, Some(reply_to)).await;
}

async fn send(client: &BotClient, chat_id: i64, text: &str, reply_to: Option<i64>) {
    if let Err(e) = client.send_message(chat_id, text, reply_to).await {
        warn!(chat_id, error = %e, "Failed to send reply");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Task panicked");
        }
    }
}
