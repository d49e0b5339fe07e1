//! In-memory fakes for the core ports
//!
//! `MemoryShare` stands in for the remote share and `MemorySource` for an
//! inbound download. Both support failure injection so pipeline retry and
//! cleanup paths can be driven deterministically.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{stream, StreamExt};

use crate::domain::newtypes::SharePath;
use crate::domain::TargetPath;
use crate::ports::{
    ByteStream, IFileSource, IShareConnector, IShareSession, IShareSink, ShareError,
    ShareErrorKind, SourceRejected,
};

// ============================================================================
// MemorySource
// ============================================================================

/// Source backed by a byte buffer
pub struct MemorySource {
    data: Bytes,
    chunk_size: usize,
    delay: Option<Duration>,
    failing_opens: AtomicU32,
    mid_stream_failure: Option<usize>,
    failing_streams: AtomicU32,
    rejects: bool,
    stall_after: Option<usize>,
    opens: AtomicU32,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            chunk_size: 7,
            delay: None,
            failing_opens: AtomicU32::new(0),
            mid_stream_failure: None,
            failing_streams: AtomicU32::new(0),
            rejects: false,
            stall_after: None,
            opens: AtomicU32::new(0),
        }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sleeps before yielding each chunk
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The first `times` calls to `open` fail
    pub fn failing_opens(self, times: u32) -> Self {
        self.failing_opens.store(times, Ordering::SeqCst);
        self
    }

    /// The first `times` opened streams fail once `after` bytes were yielded
    pub fn failing_mid_stream(mut self, after: usize, times: u32) -> Self {
        self.mid_stream_failure = Some(after);
        self.failing_streams.store(times, Ordering::SeqCst);
        self
    }

    /// Every `open` fails with [`SourceRejected`]
    pub fn rejecting(mut self) -> Self {
        self.rejects = true;
        self
    }

    /// Streams stop yielding, without ending, once `after` bytes went out
    pub fn stalling_after(mut self, after: usize) -> Self {
        self.stall_after = Some(after);
        self
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait::async_trait]
impl IFileSource for MemorySource {
    async fn open(&self) -> anyhow::Result<ByteStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.rejects {
            return Err(SourceRejected::new("file is too big").into());
        }
        if take_one(&self.failing_opens) {
            anyhow::bail!("download link expired");
        }

        let cut = match self.mid_stream_failure {
            Some(after) if take_one(&self.failing_streams) => Some(after.min(self.data.len())),
            _ => None,
        };
        let body = match cut.or(self.stall_after) {
            Some(after) => self.data.slice(..after.min(self.data.len())),
            None => self.data.clone(),
        };

        let mut items: Vec<io::Result<Bytes>> = body
            .chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        if cut.is_some() {
            items.push(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "download interrupted",
            )));
        }

        let delay = self.delay;
        let s = stream::iter(items).then(move |item| async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            item
        });
        if self.stall_after.is_some() {
            return Ok(Box::pin(s.chain(stream::pending())));
        }
        Ok(Box::pin(s))
    }

    fn describe(&self) -> String {
        format!("memory ({} bytes)", self.data.len())
    }
}

// ============================================================================
// MemoryShare
// ============================================================================

#[derive(Default)]
struct ShareState {
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
    connect_failures: VecDeque<ShareErrorKind>,
    connects: u32,
    generation: u32,
    open_races: u32,
    write_failure: Option<(usize, ShareErrorKind, u32)>,
    finish_failure: Option<ShareErrorKind>,
    under_report: bool,
    remove_fails: bool,
    probe_failure: Option<ShareErrorKind>,
    session_expired_once: bool,
    hang_connects: bool,
    stall_writes: bool,
}

/// In-memory share; also its own connector
#[derive(Clone)]
pub struct MemoryShare {
    state: Arc<Mutex<ShareState>>,
}

impl Default for MemoryShare {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryShare {
    pub fn new() -> Self {
        let mut state = ShareState::default();
        state.dirs.insert("/".to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut ShareState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Queues connect failures, consumed one per connect attempt
    pub fn fail_connects(&self, kinds: &[ShareErrorKind]) {
        self.with(|s| s.connect_failures.extend(kinds.iter().copied()));
    }

    /// Next `times` create-new opens report AlreadyExists even if free
    pub fn race_opens(&self, times: u32) {
        self.with(|s| s.open_races = times);
    }

    /// The next `times` sinks fail with `kind` once `after` bytes are written
    pub fn fail_writes(&self, after: usize, kind: ShareErrorKind, times: u32) {
        self.with(|s| s.write_failure = Some((after, kind, times)));
    }

    /// Connect attempts never complete
    pub fn hang_connects(&self) {
        self.with(|s| s.hang_connects = true);
    }

    /// Sink writes never complete
    pub fn stall_writes(&self) {
        self.with(|s| s.stall_writes = true);
    }

    pub fn fail_finish(&self, kind: ShareErrorKind) {
        self.with(|s| s.finish_failure = Some(kind));
    }

    /// Sinks report one byte less than they received
    pub fn under_report(&self) {
        self.with(|s| s.under_report = true);
    }

    pub fn fail_removes(&self) {
        self.with(|s| s.remove_fails = true);
    }

    pub fn fail_probe(&self, kind: Option<ShareErrorKind>) {
        self.with(|s| s.probe_failure = kind);
    }

    /// Marks every existing session stale
    pub fn expire_sessions(&self) {
        self.with(|s| s.generation += 1);
    }

    /// The next `exists` call fails with SessionExpired
    pub fn expire_on_next_call(&self) {
        self.with(|s| s.session_expired_once = true);
    }

    pub fn put_file(&self, path: &str, data: &[u8]) {
        self.with(|s| s.files.insert(path.to_string(), data.to_vec()));
    }

    pub fn put_dir(&self, path: &str) {
        self.with(|s| s.dirs.insert(path.to_string()));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.with(|s| s.files.get(path).cloned())
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.with(|s| s.dirs.contains(path))
    }

    pub fn file_count(&self) -> usize {
        self.with(|s| s.files.len())
    }

    pub fn connects(&self) -> u32 {
        self.with(|s| s.connects)
    }
}

#[async_trait::async_trait]
impl IShareConnector for MemoryShare {
    async fn connect(&self) -> Result<Arc<dyn IShareSession>, ShareError> {
        if self.with(|s| s.hang_connects) {
            std::future::pending::<()>().await;
        }
        self.with(|s| {
            if let Some(kind) = s.connect_failures.pop_front() {
                return Err(ShareError::new(kind, "injected connect failure"));
            }
            s.connects += 1;
            Ok(Arc::new(MemorySession {
                share: self.clone(),
                generation: s.generation,
            }) as Arc<dyn IShareSession>)
        })
    }

    fn endpoint(&self) -> String {
        "memory://share".to_string()
    }
}

struct MemorySession {
    share: MemoryShare,
    generation: u32,
}

#[async_trait::async_trait]
impl IShareSession for MemorySession {
    async fn create_directory(&self, path: &SharePath) -> Result<(), ShareError> {
        self.share.with(|s| {
            let parent = path.parent().map(String::from).unwrap_or_default();
            if !parent.is_empty() && !s.dirs.contains(&parent) {
                return Err(ShareError::new(ShareErrorKind::NotFound, parent));
            }
            if !s.dirs.insert(path.to_string()) {
                return Err(ShareError::new(ShareErrorKind::AlreadyExists, path.to_string()));
            }
            Ok(())
        })
    }

    async fn exists(&self, target: &TargetPath) -> Result<bool, ShareError> {
        self.share.with(|s| {
            if std::mem::take(&mut s.session_expired_once) {
                return Err(ShareError::new(ShareErrorKind::SessionExpired, "expired"));
            }
            let full = target.full_path();
            Ok(s.files.contains_key(&full) || s.dirs.contains(&full))
        })
    }

    async fn open_write(&self, target: &TargetPath) -> Result<Box<dyn IShareSink>, ShareError> {
        let path = target.full_path();
        let failure = self.share.with(|s| {
            if !s.dirs.contains(target.directory.as_str()) {
                return Err(ShareError::new(ShareErrorKind::NotFound, path.clone()));
            }
            if s.open_races > 0 || s.files.contains_key(&path) {
                s.open_races = s.open_races.saturating_sub(1);
                return Err(ShareError::new(ShareErrorKind::AlreadyExists, path.clone()));
            }
            s.files.insert(path.clone(), Vec::new());
            let failure = match s.write_failure.as_mut() {
                Some((after, kind, times)) if *times > 0 => {
                    *times -= 1;
                    Some((*after, *kind))
                }
                _ => None,
            };
            Ok(failure)
        })?;

        Ok(Box::new(MemorySink {
            share: self.share.clone(),
            path,
            written: 0,
            failure,
        }))
    }

    async fn remove(&self, target: &TargetPath) -> Result<(), ShareError> {
        self.share.with(|s| {
            if s.remove_fails {
                return Err(ShareError::new(ShareErrorKind::Io, "remove refused"));
            }
            s.files.remove(&target.full_path());
            Ok(())
        })
    }

    async fn probe(&self, path: &SharePath) -> Result<usize, ShareError> {
        self.share.with(|s| {
            if let Some(kind) = s.probe_failure {
                return Err(ShareError::new(kind, "injected probe failure"));
            }
            if !s.dirs.contains(path.as_str()) {
                return Err(ShareError::new(ShareErrorKind::NotFound, path.to_string()));
            }
            let prefix = if path.is_root() {
                "/".to_string()
            } else {
                format!("{path}/")
            };
            Ok(s.files.keys().filter(|k| k.starts_with(&prefix)).count())
        })
    }

    fn is_stale(&self) -> bool {
        self.share.with(|s| s.generation != self.generation)
    }
}

struct MemorySink {
    share: MemoryShare,
    path: String,
    written: usize,
    failure: Option<(usize, ShareErrorKind)>,
}

#[async_trait::async_trait]
impl IShareSink for MemorySink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ShareError> {
        if self.share.with(|s| s.stall_writes) {
            std::future::pending::<()>().await;
        }
        let accepted = match self.failure {
            Some((after, _)) if self.written + chunk.len() > after => {
                after.saturating_sub(self.written)
            }
            _ => chunk.len(),
        };
        self.share.with(|s| {
            if let Some(file) = s.files.get_mut(&self.path) {
                file.extend_from_slice(&chunk[..accepted]);
            }
        });
        self.written += accepted;
        match self.failure {
            Some((_, kind)) if accepted < chunk.len() => {
                Err(ShareError::new(kind, "injected write failure"))
            }
            _ => Ok(()),
        }
    }

    async fn finish(self: Box<Self>) -> Result<u64, ShareError> {
        let (finish_failure, under_report) = self.share.with(|s| (s.finish_failure, s.under_report));
        if let Some(kind) = finish_failure {
            return Err(ShareError::new(kind, "injected close failure"));
        }
        let written = self.written as u64;
        Ok(if under_report {
            written.saturating_sub(1)
        } else {
            written
        })
    }
}
