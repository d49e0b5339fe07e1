//! ShareBot Telegram - Bot API adapter
//!
//! Provides:
//! - A typed long-polling client for the Telegram Bot API
//! - Attachment extraction from incoming messages
//! - An [`IFileSource`](sharebot_core::ports::IFileSource) backed by
//!   Telegram file downloads
//! - The [`Bot`](bot::Bot) dispatcher that wires chat commands and
//!   attachments to the core use cases
//!
//! ## Modules
//!
//! - [`client`] - Bot API HTTP client
//! - [`types`] - Bot API wire types
//! - [`media`] - Attachment extraction and naming
//! - [`source`] - Telegram download as a file source
//! - [`replies`] - Chat reply texts
//! - [`bot`] - Update dispatcher

pub mod bot;
pub mod client;
pub mod media;
pub mod replies;
pub mod source;
pub mod types;

use std::time::Duration;
use thiserror::Error;

pub use bot::{Bot, BotSettings};
pub use client::BotClient;

/// Errors that can occur when talking to the Telegram Bot API
#[derive(Debug, Error)]
pub enum TelegramError {
    /// The bot token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The bot may not act in this chat (blocked by the user, kicked, ...)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Method or file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was malformed or referenced stale data
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Flood control; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// Any other API-level failure
    #[error("Telegram API error {code}: {description}")]
    Api { code: u16, description: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TelegramError {
    /// Builds the error for a failed API call
    pub fn from_api(code: u16, description: String, retry_after: Option<u64>) -> Self {
        match code {
            401 => Self::Unauthorized(description),
            403 => Self::Forbidden(description),
            404 => Self::NotFound(description),
            400 => Self::BadRequest(description),
            429 => Self::TooManyRequests {
                retry_after: Duration::from_secs(retry_after.unwrap_or(1)),
            },
            _ => Self::Api { code, description },
        }
    }

    /// Errors worth another polling round after a pause
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::TooManyRequests { .. } => true,
            Self::Api { code, .. } => *code >= 500,
            _ => false,
        }
    }

    /// The API refused the request itself; repeating it cannot help
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Unauthorized(_) | Self::Forbidden(_) | Self::NotFound(_) | Self::BadRequest(_) => {
                true
            }
            Self::Api { code, .. } => (400..500).contains(code),
            _ => false,
        }
    }
}
