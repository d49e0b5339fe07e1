//! Transfer outcomes
//!
//! Every pipeline execution ends in exactly one [`TransferOutcome`]. It is
//! returned to the caller (and remembered by the status tracker), never
//! persisted.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::target_path::TargetPath;

/// Failure category shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferErrorKind {
    /// Share unreachable or connection dropped (retried before surfacing)
    ConnectionError,
    /// Share credentials rejected
    AuthError,
    /// Permission or other non-transient share failure
    StorageError,
    /// No free target name could be found
    CollisionError,
    /// File larger than the configured limit
    SizeExceeded,
    /// The inbound file could not be downloaded
    SourceUnavailable,
    /// Bytes did not make it to the share intact
    PartialWrite,
    /// Aborted because the bot is shutting down
    Cancelled,
}

impl TransferErrorKind {
    /// Plain-language description used in replies
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::ConnectionError => "the file share could not be reached",
            Self::AuthError => "the file share rejected the configured credentials",
            Self::StorageError => "the file share refused to store the file",
            Self::CollisionError => "no free file name could be found in the backup folder",
            Self::SizeExceeded => "the file is larger than the configured size limit",
            Self::SourceUnavailable => "the file could not be downloaded",
            Self::PartialWrite => "the upload was interrupted",
            Self::Cancelled => "the bot is shutting down",
        }
    }
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConnectionError => "connection_error",
            Self::AuthError => "auth_error",
            Self::StorageError => "storage_error",
            Self::CollisionError => "collision_error",
            Self::SizeExceeded => "size_exceeded",
            Self::SourceUnavailable => "source_unavailable",
            Self::PartialWrite => "partial_write",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of one pipeline execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Success {
        bytes_written: u64,
        target_path: TargetPath,
        #[serde(with = "duration_millis")]
        duration: Duration,
        /// Partial file of an earlier attempt that could not be removed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        leftover: Option<TargetPath>,
    },
    Failure {
        error_kind: TransferErrorKind,
        /// Diagnostic detail for logs and the CLI, not for chat replies
        message: String,
        retries_attempted: u32,
        /// Partial file that could not be removed, if any
        leftover: Option<TargetPath>,
    },
}

impl TransferOutcome {
    pub fn failure(error_kind: TransferErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            error_kind,
            message: message.into(),
            retries_attempted: 0,
            leftover: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Partial file left on the share, whatever the outcome
    #[must_use]
    pub fn leftover(&self) -> Option<&TargetPath> {
        match self {
            Self::Success { leftover, .. } | Self::Failure { leftover, .. } => leftover.as_ref(),
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<TransferErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_kind, .. } => Some(*error_kind),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
