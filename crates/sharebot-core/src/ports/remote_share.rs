//! Remote share port (driven/secondary port)
//!
//! This module defines the interface for talking to the network file share
//! that stores the backups. Implementations live in `sharebot-share`
//! (SMB via libsmbclient, or a locally mounted share).
//!
//! ## Design Notes
//!
//! - Unlike the other ports this one returns a classified [`ShareError`]
//!   instead of `anyhow::Error`: the transfer pipeline decides retry and
//!   cleanup behaviour from the error kind.
//! - A connector produces sessions; a session produces sinks. Sinks are
//!   independent, so writes to different files never contend on a lock.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::newtypes::SharePath;
use crate::domain::TargetPath;

// ============================================================================
// ShareError
// ============================================================================

/// Classification of a share failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareErrorKind {
    /// The operation did not complete in time
    Timeout,
    /// The connection was reset or dropped mid-operation
    ConnectionLost,
    /// The server could not be reached at all
    Unreachable,
    /// Credentials were rejected
    AuthenticationFailed,
    /// The account may not perform the operation
    PermissionDenied,
    /// The path does not exist
    NotFound,
    /// Create-new target already exists
    AlreadyExists,
    /// The session is no longer valid and must be re-established
    SessionExpired,
    /// Any other I/O failure
    Io,
}

/// Error returned by share adapters
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ShareError {
    pub kind: ShareErrorKind,
    pub message: String,
}

impl ShareError {
    pub fn new(kind: ShareErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether retrying the same operation may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ShareErrorKind::Timeout
                | ShareErrorKind::ConnectionLost
                | ShareErrorKind::Unreachable
                | ShareErrorKind::SessionExpired
        )
    }

    /// Whether the failure is about who we are rather than where we write
    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.kind == ShareErrorKind::AuthenticationFailed
    }

    /// Classifies a `std::io::Error` raised by a filesystem-backed adapter
    pub fn from_io(err: &io::Error, context: &str) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ShareErrorKind::NotFound,
            io::ErrorKind::AlreadyExists => ShareErrorKind::AlreadyExists,
            io::ErrorKind::PermissionDenied => ShareErrorKind::PermissionDenied,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ShareErrorKind::Timeout,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => ShareErrorKind::ConnectionLost,
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotConnected => {
                ShareErrorKind::Unreachable
            }
            _ => match err.raw_os_error() {
                // ESTALE: the CIFS mount lost its server-side handle
                Some(116) => ShareErrorKind::SessionExpired,
                // EHOSTDOWN / EHOSTUNREACH
                Some(112) | Some(113) => ShareErrorKind::Unreachable,
                // ETIMEDOUT
                Some(110) => ShareErrorKind::Timeout,
                _ => ShareErrorKind::Io,
            },
        };
        Self::new(kind, format!("{context}: {err}"))
    }
}

// ============================================================================
// Connector / Session / Sink
// ============================================================================

/// Establishes sessions against one configured share
#[async_trait::async_trait]
pub trait IShareConnector: Send + Sync {
    /// Opens a new session (one attempt, no retries)
    async fn connect(&self) -> Result<Arc<dyn IShareSession>, ShareError>;

    /// Human-readable endpoint, e.g. `smb://nas:445/backup`
    fn endpoint(&self) -> String;
}

/// A live connection to the share
#[async_trait::async_trait]
pub trait IShareSession: Send + Sync {
    /// Creates the single directory `path`; parents must already exist
    ///
    /// Fails with [`ShareErrorKind::AlreadyExists`] if it is already there.
    async fn create_directory(&self, path: &SharePath) -> Result<(), ShareError>;

    /// Returns whether anything exists at `target`
    async fn exists(&self, target: &TargetPath) -> Result<bool, ShareError>;

    /// Creates `target` empty with create-new semantics and returns a sink
    ///
    /// Must fail with [`ShareErrorKind::AlreadyExists`] when the file exists.
    async fn open_write(&self, target: &TargetPath) -> Result<Box<dyn IShareSink>, ShareError>;

    /// Deletes the file at `target`
    async fn remove(&self, target: &TargetPath) -> Result<(), ShareError>;

    /// Lists `path` to prove the session is usable; returns the entry count
    async fn probe(&self, path: &SharePath) -> Result<usize, ShareError>;

    /// Whether the session knows it can no longer be used
    fn is_stale(&self) -> bool;
}

/// Write handle for one remote file
#[async_trait::async_trait]
pub trait IShareSink: Send {
    /// Appends a chunk; the whole slice must be written or an error returned
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ShareError>;

    /// Flushes and closes the file, returning the total bytes the sink wrote
    async fn finish(self: Box<Self>) -> Result<u64, ShareError>;
}
