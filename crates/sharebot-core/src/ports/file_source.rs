//! File source port
//!
//! An inbound file does not carry its bytes. It carries an [`IFileSource`]
//! that can be opened (and re-opened on retry) to obtain a byte stream.

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;

/// Stream of file content chunks as produced by a source
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// The source refused to hand out the file (gone, too big, forbidden)
///
/// Sources return it, wrapped in the `anyhow` chain, for failures that a
/// retry cannot fix. Any other `open` error is treated as transient.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct SourceRejected {
    pub reason: String,
}

impl SourceRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Whether `err` or anything it wraps is a rejection
    pub fn is_in(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| cause.is::<SourceRejected>())
    }
}

/// Re-openable factory for the bytes of one inbound file
///
/// Implementations: a chat-platform download link, a local file for the
/// CLI `send` command, in-memory buffers in tests.
#[async_trait::async_trait]
pub trait IFileSource: Send + Sync {
    /// Opens a fresh stream positioned at the first byte
    ///
    /// Each call must start from the beginning so a failed transfer can be
    /// retried from scratch.
    async fn open(&self) -> anyhow::Result<ByteStream>;

    /// Short human-readable description for logs (never contains secrets)
    fn describe(&self) -> String;
}
