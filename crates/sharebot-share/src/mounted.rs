//! Mounted share adapter (secondary/driven adapter)
//!
//! Implements the share ports on top of a locally mounted share using
//! `tokio::fs`. Share paths resolve under the mount point; they are
//! validated `SharePath`s, so they cannot escape it.
//!
//! ## Design Decisions
//!
//! - **Create-new**: sinks open with `create_new(true)` so an existing file
//!   is reported as `AlreadyExists` instead of being truncated.
//! - **Staleness**: a session is stale once the mount point is no longer a
//!   directory (unmounted, or the automounter dropped it).
//! - **Durability**: `finish` flushes and calls `sync_all` before reporting
//!   the byte count.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sharebot_core::domain::newtypes::SharePath;
use sharebot_core::domain::TargetPath;
use sharebot_core::ports::{
    IShareConnector, IShareSession, IShareSink, ShareError, ShareErrorKind,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Connector for a share mounted at `mount_point`
#[derive(Debug, Clone)]
pub struct MountedShareConnector {
    mount_point: PathBuf,
}

impl MountedShareConnector {
    #[must_use]
    pub fn new(mount_point: PathBuf) -> Self {
        Self { mount_point }
    }
}

#[async_trait::async_trait]
impl IShareConnector for MountedShareConnector {
    #[instrument(skip(self), fields(mount_point = %self.mount_point.display()))]
    async fn connect(&self) -> Result<Arc<dyn IShareSession>, ShareError> {
        let metadata = tokio::fs::metadata(&self.mount_point).await.map_err(|e| {
            let mut err = ShareError::from_io(&e, &format!("stat {}", self.mount_point.display()));
            if err.kind == ShareErrorKind::NotFound {
                err.kind = ShareErrorKind::Unreachable;
            }
            err
        })?;
        if !metadata.is_dir() {
            return Err(ShareError::new(
                ShareErrorKind::Unreachable,
                format!("{} is not a directory", self.mount_point.display()),
            ));
        }

        debug!("Mounted share available");
        Ok(Arc::new(MountedSession {
            root: self.mount_point.clone(),
        }))
    }

    fn endpoint(&self) -> String {
        format!("file://{}", self.mount_point.display())
    }
}

/// Session over a mounted share
#[derive(Debug)]
pub struct MountedSession {
    root: PathBuf,
}

impl MountedSession {
    fn resolve_dir(&self, path: &SharePath) -> PathBuf {
        path.components()
            .fold(self.root.clone(), |acc, component| acc.join(component))
    }

    fn resolve(&self, target: &TargetPath) -> PathBuf {
        self.resolve_dir(&target.directory)
            .join(target.file_name.as_str())
    }
}

fn io_err(e: &std::io::Error, op: &str, path: &Path) -> ShareError {
    ShareError::from_io(e, &format!("{op} {}", path.display()))
}

#[async_trait::async_trait]
impl IShareSession for MountedSession {
    async fn create_directory(&self, path: &SharePath) -> Result<(), ShareError> {
        let dir = self.resolve_dir(path);
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| io_err(&e, "mkdir", &dir))
    }

    async fn exists(&self, target: &TargetPath) -> Result<bool, ShareError> {
        let path = self.resolve(target);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_err(&e, "stat", &path))
    }

    async fn open_write(&self, target: &TargetPath) -> Result<Box<dyn IShareSink>, ShareError> {
        let path = self.resolve(target);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| io_err(&e, "create", &path))?;
        debug!(path = %path.display(), "Opened file for writing");

        Ok(Box::new(MountedSink {
            file,
            path,
            written: 0,
        }))
    }

    async fn remove(&self, target: &TargetPath) -> Result<(), ShareError> {
        let path = self.resolve(target);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_err(&e, "remove", &path))
    }

    async fn probe(&self, path: &SharePath) -> Result<usize, ShareError> {
        let dir = self.resolve_dir(path);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_err(&e, "list", &dir))?;
        let mut count = 0;
        while entries
            .next_entry()
            .await
            .map_err(|e| io_err(&e, "list", &dir))?
            .is_some()
        {
            count += 1;
        }
        Ok(count)
    }

    fn is_stale(&self) -> bool {
        !self.root.is_dir()
    }
}

struct MountedSink {
    file: tokio::fs::File,
    path: PathBuf,
    written: u64,
}

#[async_trait::async_trait]
impl IShareSink for MountedSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ShareError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| io_err(&e, "write", &self.path))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<u64, ShareError> {
        let MountedSink {
            mut file,
            path,
            written,
        } = *self;
        file.flush().await.map_err(|e| io_err(&e, "flush", &path))?;
        file.sync_all()
            .await
            .map_err(|e| io_err(&e, "sync", &path))?;
        Ok(written)
    }
}
