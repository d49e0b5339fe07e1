//! Telegram Bot API client
//!
//! Typed wrapper over `reqwest` for the handful of Bot API methods ShareBot
//! needs. Every method goes through [`BotClient::call`], which unwraps the
//! `{ok, result}` envelope and honours flood-control back-off.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sharebot_telegram::client::BotClient;
//!
//! # async fn example() -> Result<(), sharebot_telegram::TelegramError> {
//! let client = BotClient::new("123:abc");
//! let me = client.get_me().await?;
//! println!("Running as @{}", me.username.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use std::io;
use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sharebot_core::ports::ByteStream;
use tracing::{debug, info, warn};

use crate::types::{
    ApiResponse, EditMessageTextParams, File, GetFileParams, GetUpdatesParams, Message,
    SendMessageParams, Update, User,
};
use crate::TelegramError;

/// Public Bot API endpoint
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Maximum number of retries for 429 responses
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound on a single flood-control pause
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Slack added on top of the long-polling timeout for the HTTP request
const POLL_GRACE: Duration = Duration::from_secs(10);

/// TCP/TLS connection establishment limit
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Telegram Bot API
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct BotClient {
    client: Client,
    base_url: String,
    token: String,
    max_retries: u32,
}

impl std::fmt::Debug for BotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BotClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, TELEGRAM_API_URL)
    }

    /// Creates a client against a custom API server (local Bot API server, tests)
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }

    /// Calls a Bot API method and returns its `result`
    ///
    /// On HTTP 429 the call sleeps for `parameters.retry_after` (capped)
    /// and retries up to `max_retries` times before giving up with
    /// [`TelegramError::TooManyRequests`].
    pub async fn call<P, T>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut attempt: u32 = 0;
        loop {
            let mut request = self.client.post(self.method_url(method)).json(params);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            // reqwest errors carry the URL, which contains the token
            let response = request.send().await.map_err(|e| e.without_url())?;
            let status = response.status();
            let body = response.text().await.map_err(|e| e.without_url())?;

            let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
                TelegramError::InvalidResponse(format!("{method} (HTTP {status}): {e}"))
            })?;

            if envelope.ok {
                return envelope.result.ok_or_else(|| {
                    TelegramError::InvalidResponse(format!("{method}: ok without result"))
                });
            }

            let code = envelope.error_code.unwrap_or(status.as_u16());
            let description = envelope.description.unwrap_or_default();
            let retry_after = envelope.parameters.and_then(|p| p.retry_after);

            if code == 429 && attempt < self.max_retries {
                let wait = Duration::from_secs(retry_after.unwrap_or(1)).min(MAX_RETRY_AFTER);
                attempt += 1;
                info!(
                    method,
                    attempt,
                    retry_after_ms = wait.as_millis() as u64,
                    "Received 429, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if code == 429 {
                warn!(method, attempts = attempt + 1, "429 retry limit exhausted");
            }
            return Err(TelegramError::from_api(code, description, retry_after));
        }
    }

    /// Returns the bot's own user (validates the token)
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Long-polls for updates starting at `offset`
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let params = GetUpdatesParams {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        let timeout = Duration::from_secs(timeout_secs) + POLL_GRACE;
        let updates: Vec<Update> = self.call("getUpdates", &params, Some(timeout)).await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), ?offset, "Received updates");
        }
        Ok(updates)
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Result<Message, TelegramError> {
        let params = SendMessageParams {
            chat_id,
            text,
            reply_to_message_id,
        };
        self.call("sendMessage", &params, None).await
    }

    /// Replaces the text of a message previously sent by the bot
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        let params = EditMessageTextParams {
            chat_id,
            message_id,
            text,
        };
        // The result is the edited Message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &params, None).await?;
        Ok(())
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &GetFileParams { file_id }, None).await
    }

    /// Opens a streaming download of a file returned by [`get_file`](Self::get_file)
    pub async fn download_stream(&self, file_path: &str) -> Result<ByteStream, TelegramError> {
        let response = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::from_api(
                status.as_u16(),
                format!("download of {file_path} failed"),
                None,
            ));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.without_url()));
        Ok(Box::pin(stream))
    }
}
