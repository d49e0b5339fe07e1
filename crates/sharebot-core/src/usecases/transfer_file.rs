//! File transfer pipeline
//!
//! Relays one inbound file onto the share:
//! 1. Rejects files whose declared size exceeds the limit (no share contact)
//! 2. Connects to the share
//! 3. Computes a collision-free target path and ensures its directory
//! 4. Opens the source, then the remote sink (create-new)
//! 5. Copies in bounded chunks, enforcing the size limit on the way
//! 6. Closes the sink and verifies byte counts
//!
//! Any failure after the sink was opened removes the partial file. Transient
//! failures retry the whole transfer with backoff. Every share and source
//! await observes the cancellation token, and reads and writes that make no
//! progress for `idle_timeout` fail the attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::share_client::RemoteShareClient;
use super::tracker::OutcomeTracker;
use crate::domain::newtypes::TransferId;
use crate::domain::{
    FileNamer, InboundFile, RetryPolicy, TargetPath, TransferErrorKind, TransferOutcome,
};
use crate::ports::{IShareSink, ShareError, ShareErrorKind, SourceRejected};

/// How many times a create-new race is resolved by renaming
pub const MAX_COLLISION_RENAMES: u32 = 16;

/// Tunables for [`TransferPipeline`]
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub max_file_size: u64,
    pub chunk_size: usize,
    /// Retries of the whole transfer after a transient failure
    pub max_transfer_retries: u32,
    /// Longest wait for one source read, sink write or sink close
    pub idle_timeout: Duration,
    /// Delay schedule between whole-transfer retries
    pub backoff: RetryPolicy,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_file_size: 2000 * 1024 * 1024,
            chunk_size: 1024 * 1024,
            max_transfer_retries: 2,
            idle_timeout: Duration::from_secs(60),
            backoff: RetryPolicy::default(),
        }
    }
}

/// Why one attempt failed
#[derive(Debug)]
struct AttemptError {
    kind: TransferErrorKind,
    message: String,
    transient: bool,
    leftover: Option<TargetPath>,
}

impl AttemptError {
    fn new(kind: TransferErrorKind, message: impl Into<String>, transient: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            transient,
            leftover: None,
        }
    }

    fn cancelled() -> Self {
        Self::new(TransferErrorKind::Cancelled, "transfer cancelled", false)
    }

    fn stalled(what: &str, idle: Duration) -> Self {
        Self::new(
            TransferErrorKind::PartialWrite,
            format!("{what} made no progress for {}s", idle.as_secs()),
            true,
        )
    }

    /// Classifies a share failure outside the copy phase
    fn from_share(err: &ShareError, context: &str) -> Self {
        let kind = match err.kind {
            ShareErrorKind::AuthenticationFailed => TransferErrorKind::AuthError,
            _ if err.is_transient() => TransferErrorKind::ConnectionError,
            _ => TransferErrorKind::StorageError,
        };
        Self::new(kind, format!("{context}: {err}"), err.is_transient())
    }
}

/// Orchestrates relaying inbound files onto the share
pub struct TransferPipeline {
    share: Arc<RemoteShareClient>,
    namer: FileNamer,
    settings: TransferSettings,
    tracker: Arc<OutcomeTracker>,
}

impl TransferPipeline {
    pub fn new(
        share: Arc<RemoteShareClient>,
        namer: FileNamer,
        settings: TransferSettings,
        tracker: Arc<OutcomeTracker>,
    ) -> Self {
        Self {
            share,
            namer,
            settings,
            tracker,
        }
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &Arc<OutcomeTracker> {
        &self.tracker
    }

    /// Relays `inbound` and returns its outcome
    pub async fn execute(&self, inbound: InboundFile) -> TransferOutcome {
        self.execute_with_cancel(inbound, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), aborting with `Cancelled` when `cancel` fires
    pub async fn execute_with_cancel(
        &self,
        inbound: InboundFile,
        cancel: &CancellationToken,
    ) -> TransferOutcome {
        let transfer_id = TransferId::new();
        let span = info_span!(
            "transfer",
            %transfer_id,
            kind = %inbound.kind,
            sender = %inbound.sender_id,
        );

        let _in_flight = self.tracker.begin();
        let outcome = self.run(&inbound, cancel).instrument(span).await;
        self.tracker.record(&outcome);
        outcome
    }

    async fn run(&self, inbound: &InboundFile, cancel: &CancellationToken) -> TransferOutcome {
        let started = Instant::now();
        debug!(
            source = %inbound.source.describe(),
            name = ?inbound.original_name,
            "Transfer started"
        );

        if let Some(declared) = inbound.declared_size {
            if declared > self.settings.max_file_size {
                warn!(
                    declared,
                    limit = self.settings.max_file_size,
                    "Declared size exceeds limit"
                );
                return TransferOutcome::failure(
                    TransferErrorKind::SizeExceeded,
                    format!(
                        "declared size {declared} exceeds limit {}",
                        self.settings.max_file_size
                    ),
                );
            }
        }

        let mut attempt: u32 = 0;
        let mut leftover: Option<TargetPath> = None;
        loop {
            attempt += 1;
            match self.attempt(inbound, cancel).await {
                Ok((bytes_written, target_path)) => {
                    let duration = started.elapsed();
                    info!(
                        path = %target_path,
                        bytes = bytes_written,
                        duration_ms = duration.as_millis() as u64,
                        attempt,
                        "Transfer complete"
                    );
                    if let Some(partial) = &leftover {
                        warn!(path = %partial, "Partial file from an earlier attempt remains");
                    }
                    return TransferOutcome::Success {
                        bytes_written,
                        target_path,
                        duration,
                        leftover,
                    };
                }
                Err(err) => {
                    leftover = err.leftover.clone().or(leftover);
                    let retries_left = attempt <= self.settings.max_transfer_retries;
                    if err.transient && retries_left && !cancel.is_cancelled() {
                        let delay = self.settings.backoff.delay_for(attempt);
                        warn!(
                            attempt,
                            kind = %err.kind,
                            error = %err.message,
                            delay_ms = delay.as_millis() as u64,
                            "Transient transfer failure, retrying"
                        );
                        if sleep_or_cancel(delay, cancel).await {
                            continue;
                        }
                        return self.failure(AttemptError::cancelled(), attempt, leftover);
                    }
                    return self.failure(err, attempt, leftover);
                }
            }
        }
    }

    fn failure(
        &self,
        err: AttemptError,
        attempts: u32,
        leftover: Option<TargetPath>,
    ) -> TransferOutcome {
        let message = match &leftover {
            Some(path) => format!("{}; partial file left at {path}", err.message),
            None => err.message,
        };
        warn!(kind = %err.kind, attempts, error = %message, "Transfer failed");
        TransferOutcome::Failure {
            error_kind: err.kind,
            message,
            retries_attempted: attempts.saturating_sub(1),
            leftover,
        }
    }

    /// One full try: connect, name, open, copy, close
    async fn attempt(
        &self,
        inbound: &InboundFile,
        cancel: &CancellationToken,
    ) -> Result<(u64, TargetPath), AttemptError> {
        if cancel.is_cancelled() {
            return Err(AttemptError::cancelled());
        }

        or_cancel(self.share.connect(), cancel).await?.map_err(|e| {
            let kind = match e.kind {
                ShareErrorKind::AuthenticationFailed | ShareErrorKind::PermissionDenied => {
                    TransferErrorKind::AuthError
                }
                _ => TransferErrorKind::ConnectionError,
            };
            // Connect already retried with its own backoff
            AttemptError::new(kind, format!("connect {}: {e}", self.share.endpoint()), false)
        })?;

        let mut target = or_cancel(self.pick_target(inbound), cancel).await??;
        or_cancel(self.share.ensure_directory(&target.directory), cancel)
            .await?
            .map_err(|e| AttemptError::from_share(&e, "ensure directory"))?;

        let mut source = or_cancel(inbound.source.open(), cancel).await?.map_err(|e| {
            AttemptError::new(
                TransferErrorKind::SourceUnavailable,
                format!("open source: {e:#}"),
                !SourceRejected::is_in(&e),
            )
        })?;

        let idle = self.settings.idle_timeout;
        let mut renames = 0;
        let mut sink = loop {
            // Not raced against the token: a dropped create could still land
            // and leave a file nobody owns
            let opened = tokio::time::timeout(idle, self.share.open_write_stream(&target))
                .await
                .map_err(|_| AttemptError::stalled("creating the remote file", idle))?;
            match opened {
                Ok(sink) if cancel.is_cancelled() => {
                    return Err(self.abort(AttemptError::cancelled(), &target, sink).await);
                }
                Ok(sink) => break sink,
                Err(e) if e.kind == ShareErrorKind::AlreadyExists => {
                    if renames >= MAX_COLLISION_RENAMES {
                        return Err(AttemptError::new(
                            TransferErrorKind::CollisionError,
                            format!("{target} kept colliding after {renames} renames"),
                            false,
                        ));
                    }
                    renames += 1;
                    debug!(path = %target, renames, "Target created concurrently, renaming");
                    target = or_cancel(self.pick_target(inbound), cancel).await??;
                }
                Err(e) => return Err(AttemptError::from_share(&e, "open remote file")),
            }
        };
        debug!(path = %target, "Remote file created");

        let chunk_size = self.settings.chunk_size.max(1);
        let mut buffer = BytesMut::with_capacity(chunk_size);
        let mut consumed: u64 = 0;

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.abort(AttemptError::cancelled(), &target, sink).await);
                }
                item = tokio::time::timeout(idle, source.next()) => item,
            };

            match item {
                Ok(Some(Ok(bytes))) => {
                    consumed += bytes.len() as u64;
                    if consumed > self.settings.max_file_size {
                        let err = AttemptError::new(
                            TransferErrorKind::SizeExceeded,
                            format!("stream exceeded limit {}", self.settings.max_file_size),
                            false,
                        );
                        return Err(self.abort(err, &target, sink).await);
                    }
                    buffer.extend_from_slice(&bytes);
                    while buffer.len() >= chunk_size {
                        let chunk = buffer.split_to(chunk_size);
                        if let Err(err) = write_chunk(sink.as_mut(), &chunk, idle, cancel).await {
                            return Err(self.abort(err, &target, sink).await);
                        }
                    }
                }
                Ok(Some(Err(e))) => {
                    let err = AttemptError::new(
                        TransferErrorKind::PartialWrite,
                        format!("source read failed after {consumed} bytes: {e}"),
                        true,
                    );
                    return Err(self.abort(err, &target, sink).await);
                }
                Ok(None) => break,
                Err(_) => {
                    let err = AttemptError::stalled("source", idle);
                    return Err(self.abort(err, &target, sink).await);
                }
            }
        }

        if !buffer.is_empty() {
            if let Err(err) = write_chunk(sink.as_mut(), &buffer, idle, cancel).await {
                return Err(self.abort(err, &target, sink).await);
            }
        }

        let closed = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AttemptError::cancelled()),
            closed = tokio::time::timeout(idle, sink.finish()) => match closed {
                Ok(result) => result.map_err(|e| {
                    AttemptError::new(
                        TransferErrorKind::PartialWrite,
                        format!("closing remote file failed: {e}"),
                        e.is_transient(),
                    )
                }),
                Err(_) => Err(AttemptError::stalled("closing the remote file", idle)),
            },
        };
        let written = match closed {
            Ok(n) => n,
            Err(err) => return Err(self.discard(err, &target).await),
        };

        if written != consumed {
            let err = AttemptError::new(
                TransferErrorKind::PartialWrite,
                format!("wrote {written} bytes but consumed {consumed}"),
                true,
            );
            return Err(self.discard(err, &target).await);
        }
        if let Some(declared) = inbound.declared_size {
            if declared != consumed {
                let err = AttemptError::new(
                    TransferErrorKind::PartialWrite,
                    format!("source declared {declared} bytes but delivered {consumed}"),
                    true,
                );
                return Err(self.discard(err, &target).await);
            }
        }

        Ok((written, target))
    }

    async fn pick_target(&self, inbound: &InboundFile) -> Result<TargetPath, AttemptError> {
        let share = &self.share;
        self.namer
            .compute_target_path(inbound, |candidate| async move {
                share.exists(&candidate).await
            })
            .await
            .map_err(|e| AttemptError::from_share(&e, "check target"))
    }

    /// Drops the open sink, then removes the partial file
    async fn abort(
        &self,
        err: AttemptError,
        target: &TargetPath,
        sink: Box<dyn IShareSink>,
    ) -> AttemptError {
        drop(sink);
        self.discard(err, target).await
    }

    /// Removes the partial file, noting it as leftover when that fails
    ///
    /// Bounded by the idle timeout so a hung share cannot hold back the
    /// outcome of a cancelled transfer.
    async fn discard(&self, mut err: AttemptError, target: &TargetPath) -> AttemptError {
        let removed = tokio::time::timeout(self.settings.idle_timeout, self.share.remove(target))
            .await
            .unwrap_or_else(|_| Err(ShareError::new(ShareErrorKind::Timeout, "remove timed out")));
        match removed {
            Ok(()) => debug!(path = %target, "Partial file removed"),
            Err(e) if e.kind == ShareErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %target, error = %e, "Could not remove partial file");
                err.leftover = Some(target.clone());
            }
        }
        err
    }
}

/// Awaits `fut` unless `cancel` fires first
async fn or_cancel<T>(
    fut: impl Future<Output = T>,
    cancel: &CancellationToken,
) -> Result<T, AttemptError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AttemptError::cancelled()),
        out = fut => Ok(out),
    }
}

async fn write_chunk(
    sink: &mut dyn IShareSink,
    chunk: &[u8],
    idle: Duration,
    cancel: &CancellationToken,
) -> Result<(), AttemptError> {
    match or_cancel(tokio::time::timeout(idle, sink.write_chunk(chunk)), cancel).await? {
        Ok(result) => result.map_err(|e| {
            AttemptError::new(
                TransferErrorKind::PartialWrite,
                format!("remote write failed: {e}"),
                e.is_transient(),
            )
        }),
        Err(_) => Err(AttemptError::stalled("remote write", idle)),
    }
}

/// Sleeps for `delay`; returns false if cancelled first
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
