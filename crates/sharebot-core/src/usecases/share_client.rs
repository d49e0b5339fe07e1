//! Remote share client
//!
//! Owns the single cached session to the share. Every operation goes
//! through [`RemoteShareClient::connect`], which reuses the cached session
//! unless it reports itself stale, and re-establishes it with bounded
//! exponential backoff otherwise.
//!
//! Session (re)establishment happens under an async mutex so concurrent
//! callers never race to reconnect. The lock is released before any I/O on
//! the session, so independent writes do not serialize.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::newtypes::SharePath;
use crate::domain::{RetryPolicy, TargetPath};
use crate::ports::{IShareConnector, IShareSession, IShareSink, ShareError, ShareErrorKind};

/// Result of a share health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShareHealth {
    /// Connected and the backup root is listable
    Healthy,
    /// Connected, but the backup root could not be listed
    Degraded { reason: String },
    /// No session could be established
    Unreachable { reason: String },
}

impl ShareHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Client for the remote share with a cached, self-healing session
pub struct RemoteShareClient {
    connector: Arc<dyn IShareConnector>,
    retry: RetryPolicy,
    backup_root: SharePath,
    session: Mutex<Option<Arc<dyn IShareSession>>>,
}

impl RemoteShareClient {
    pub fn new(
        connector: Arc<dyn IShareConnector>,
        retry: RetryPolicy,
        backup_root: SharePath,
    ) -> Self {
        Self {
            connector,
            retry,
            backup_root,
            session: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    pub fn backup_root(&self) -> &SharePath {
        &self.backup_root
    }

    /// Returns the cached session or establishes a new one
    ///
    /// Transient failures are retried per the retry policy; authentication
    /// and permission failures are returned immediately.
    pub async fn connect(&self) -> Result<Arc<dyn IShareSession>, ShareError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if !session.is_stale() {
                return Ok(Arc::clone(session));
            }
            debug!(endpoint = %self.connector.endpoint(), "Cached share session is stale");
            *guard = None;
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.connector.connect().await {
                Ok(session) => {
                    if attempt > 1 {
                        info!(attempt, "Share connection succeeded after retry");
                    } else {
                        debug!(endpoint = %self.connector.endpoint(), "Share session established");
                    }
                    *guard = Some(Arc::clone(&session));
                    return Ok(session);
                }
                Err(err) if err.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient share connection error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Share connection failed");
                    return Err(err);
                }
            }
        }
    }

    /// Drops the cached session so the next call reconnects
    pub async fn invalidate(&self) {
        if self.session.lock().await.take().is_some() {
            debug!("Share session invalidated");
        }
    }

    /// Drops the cached session only if it is still `stale`
    async fn invalidate_if_current(&self, stale: &Arc<dyn IShareSession>) {
        let mut guard = self.session.lock().await;
        let is_current = guard
            .as_ref()
            .is_some_and(|s| Arc::as_ptr(s) as *const () == Arc::as_ptr(stale) as *const ());
        if is_current {
            *guard = None;
            debug!("Expired share session dropped");
        }
    }

    /// Runs `op` on a session, reconnecting once if the session expired
    async fn with_session<T, F, Fut>(&self, op: F) -> Result<T, ShareError>
    where
        F: Fn(Arc<dyn IShareSession>) -> Fut,
        Fut: Future<Output = Result<T, ShareError>>,
    {
        let session = self.connect().await?;
        match op(Arc::clone(&session)).await {
            Err(err) if err.kind == ShareErrorKind::SessionExpired => {
                warn!(error = %err, "Share session expired, reconnecting");
                self.invalidate_if_current(&session).await;
                let fresh = self.connect().await?;
                op(fresh).await
            }
            other => other,
        }
    }

    /// Creates `path` and every missing parent; no-op when present
    pub async fn ensure_directory(&self, path: &SharePath) -> Result<(), ShareError> {
        let ancestors = path.ancestors_inclusive();
        self.with_session(|session| {
            let ancestors = ancestors.clone();
            async move {
                for dir in &ancestors {
                    match session.create_directory(dir).await {
                        Ok(()) => debug!(path = %dir, "Created directory on share"),
                        Err(e) if e.kind == ShareErrorKind::AlreadyExists => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
        })
        .await
    }

    pub async fn exists(&self, target: &TargetPath) -> Result<bool, ShareError> {
        self.with_session(|session| {
            let target = target.clone();
            async move { session.exists(&target).await }
        })
        .await
    }

    /// Creates `target` empty (create-new) and returns a sink for its bytes
    pub async fn open_write_stream(
        &self,
        target: &TargetPath,
    ) -> Result<Box<dyn IShareSink>, ShareError> {
        self.with_session(|session| {
            let target = target.clone();
            async move { session.open_write(&target).await }
        })
        .await
    }

    /// Best-effort deletion of a (partial) file
    pub async fn remove(&self, target: &TargetPath) -> Result<(), ShareError> {
        self.with_session(|session| {
            let target = target.clone();
            async move { session.remove(&target).await }
        })
        .await
    }

    /// Connects (with retries) and lists the backup root
    pub async fn health_check(&self) -> ShareHealth {
        let session = match self.connect().await {
            Ok(session) => session,
            Err(err) => {
                return ShareHealth::Unreachable {
                    reason: connect_failure_reason(&err).to_string(),
                };
            }
        };

        match session.probe(&self.backup_root).await {
            Ok(entries) => {
                debug!(entries, root = %self.backup_root, "Share probe succeeded");
                ShareHealth::Healthy
            }
            Err(err) => {
                warn!(error = %err, root = %self.backup_root, "Share probe failed");
                if err.is_transient() {
                    self.invalidate_if_current(&session).await;
                }
                ShareHealth::Degraded {
                    reason: probe_failure_reason(&err).to_string(),
                }
            }
        }
    }
}

fn connect_failure_reason(err: &ShareError) -> &'static str {
    match err.kind {
        ShareErrorKind::AuthenticationFailed => "credentials rejected",
        ShareErrorKind::PermissionDenied => "access to the share denied",
        ShareErrorKind::NotFound => "share not found",
        ShareErrorKind::Timeout => "connection timed out",
        _ => "server unreachable",
    }
}

fn probe_failure_reason(err: &ShareError) -> &'static str {
    match err.kind {
        ShareErrorKind::NotFound => "backup directory does not exist",
        ShareErrorKind::PermissionDenied => "backup directory is not accessible",
        ShareErrorKind::SessionExpired => "session expired",
        _ if err.is_transient() => "connection dropped while listing",
        _ => "backup directory could not be listed",
    }
}
