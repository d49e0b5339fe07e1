//! SMB share adapter (libsmbclient via `pavao`)
//!
//! libsmbclient is blocking and its file handles borrow the client context,
//! so each session owns one worker running on `spawn_blocking`. The worker
//! holds the `SmbClient` and every open file; async callers talk to it over
//! a command channel and get answers on oneshot channels.
//!
//! Only built with the `smb` cargo feature.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use pavao::{SmbClient, SmbCredentials, SmbFile, SmbMode, SmbOpenOptions, SmbOptions};
use sharebot_core::config::ShareConfig;
use sharebot_core::domain::newtypes::SharePath;
use sharebot_core::domain::TargetPath;
use sharebot_core::ports::{
    IShareConnector, IShareSession, IShareSink, ShareError, ShareErrorKind,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Connection parameters for one SMB share
#[derive(Clone)]
pub struct SmbShareConnector {
    server: String,
    port: u16,
    share: String,
    username: String,
    password: String,
    workgroup: Option<String>,
}

impl std::fmt::Debug for SmbShareConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmbShareConnector")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("share", &self.share)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SmbShareConnector {
    pub fn from_config(config: &ShareConfig) -> Self {
        Self {
            server: config.server.clone(),
            port: config.port,
            share: config.share.clone(),
            username: config.username.clone(),
            password: config.password.expose().to_string(),
            workgroup: config.workgroup.clone(),
        }
    }

    /// `server_name` from the config is not part of the credentials:
    /// libsmbclient always addresses the host in `server`
    fn credentials(&self) -> SmbCredentials {
        let share = if self.share.starts_with('/') {
            self.share.clone()
        } else {
            format!("/{}", self.share)
        };
        let mut creds = SmbCredentials::default()
            .server(format!("smb://{}:{}", self.server, self.port))
            .share(share)
            .username(self.username.clone())
            .password(self.password.clone());
        if let Some(workgroup) = &self.workgroup {
            creds = creds.workgroup(workgroup.clone());
        }
        creds
    }
}

#[async_trait::async_trait]
impl IShareConnector for SmbShareConnector {
    async fn connect(&self) -> Result<Arc<dyn IShareSession>, ShareError> {
        let (tx, rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let creds = self.credentials();
        let worker_alive = Arc::clone(&alive);

        tokio::task::spawn_blocking(move || {
            run_worker(creds, rx, ready_tx);
            worker_alive.store(false, Ordering::SeqCst);
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                info!(endpoint = %self.endpoint(), "SMB session established");
                Ok(Arc::new(SmbSession { tx, alive }))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ShareError::new(
                ShareErrorKind::ConnectionLost,
                "SMB worker exited during connect",
            )),
        }
    }

    fn endpoint(&self) -> String {
        format!("smb://{}:{}/{}", self.server, self.port, self.share)
    }
}

// ============================================================================
// Worker
// ============================================================================

type Reply<T> = oneshot::Sender<Result<T, ShareError>>;

enum Command {
    Mkdir(String, Reply<()>),
    Exists(String, Reply<bool>),
    Create(String, Reply<u64>),
    Write(u64, Vec<u8>, Reply<()>),
    Close(u64, Reply<()>),
    Discard(u64),
    Unlink(String, Reply<()>),
    List(String, Reply<usize>),
}

fn run_worker(
    creds: SmbCredentials,
    rx: mpsc::Receiver<Command>,
    ready: oneshot::Sender<Result<(), ShareError>>,
) {
    let client = match SmbClient::new(creds, SmbOptions::default().one_share_per_server(true)) {
        Ok(client) => client,
        Err(e) => {
            let _ = ready.send(Err(classify(&e.to_string(), "init")));
            return;
        }
    };
    // libsmbclient connects lazily; listing the share root forces the login.
    if let Err(e) = client.list_dir("/") {
        let _ = ready.send(Err(classify(&e.to_string(), "connect")));
        return;
    }
    if ready.send(Ok(())).is_err() {
        return;
    }

    let mut files: HashMap<u64, SmbFile<'_>> = HashMap::new();
    let mut next_handle: u64 = 0;

    // Runs until every sender (the session and its sinks) is dropped
    while let Ok(command) = rx.recv() {
        match command {
            Command::Mkdir(path, reply) => {
                let result = client
                    .mkdir(&path, SmbMode::from(0o755))
                    .map_err(|e| classify(&e.to_string(), &format!("mkdir {path}")));
                let _ = reply.send(result);
            }
            Command::Exists(path, reply) => {
                let result = match client.stat(&path) {
                    Ok(_) => Ok(true),
                    Err(e) => {
                        let err = classify(&e.to_string(), &format!("stat {path}"));
                        if err.kind == ShareErrorKind::NotFound {
                            Ok(false)
                        } else {
                            Err(err)
                        }
                    }
                };
                let _ = reply.send(result);
            }
            Command::Create(path, reply) => {
                let options = SmbOpenOptions::default()
                    .create(true)
                    .exclusive(true)
                    .write(true);
                let result = client
                    .open_with(&path, options)
                    .map(|file| {
                        next_handle += 1;
                        files.insert(next_handle, file);
                        next_handle
                    })
                    .map_err(|e| classify(&e.to_string(), &format!("create {path}")));
                let _ = reply.send(result);
            }
            Command::Write(handle, data, reply) => {
                let result = match files.get_mut(&handle) {
                    Some(file) => file
                        .write_all(&data)
                        .map_err(|e| classify(&e.to_string(), "write")),
                    None => Err(ShareError::new(ShareErrorKind::Io, "write on closed handle")),
                };
                let _ = reply.send(result);
            }
            Command::Close(handle, reply) => {
                let result = match files.remove(&handle) {
                    Some(mut file) => file
                        .flush()
                        .map_err(|e| classify(&e.to_string(), "close")),
                    None => Err(ShareError::new(ShareErrorKind::Io, "close on closed handle")),
                };
                let _ = reply.send(result);
            }
            Command::Discard(handle) => {
                files.remove(&handle);
            }
            Command::Unlink(path, reply) => {
                let result = client
                    .unlink(&path)
                    .map_err(|e| classify(&e.to_string(), &format!("unlink {path}")));
                let _ = reply.send(result);
            }
            Command::List(path, reply) => {
                let result = client
                    .list_dir(&path)
                    .map(|entries| {
                        entries
                            .iter()
                            .filter(|e| e.name() != "." && e.name() != "..")
                            .count()
                    })
                    .map_err(|e| classify(&e.to_string(), &format!("list {path}")));
                let _ = reply.send(result);
            }
        }
    }
    debug!("SMB worker stopped");
}

/// Maps a libsmbclient error message onto the share error taxonomy
///
/// libsmbclient reports failures through errno, so the text is the
/// strerror of the underlying code.
pub(crate) fn classify(message: &str, context: &str) -> ShareError {
    let lower = message.to_ascii_lowercase();
    let kind = if lower.contains("logon failure")
        || lower.contains("authentication")
        || lower.contains("nt_status_logon")
    {
        ShareErrorKind::AuthenticationFailed
    } else if lower.contains("permission denied")
        || lower.contains("access denied")
        || lower.contains("operation not permitted")
    {
        ShareErrorKind::PermissionDenied
    } else if lower.contains("file exists") || lower.contains("already exists") {
        ShareErrorKind::AlreadyExists
    } else if lower.contains("no such file") || lower.contains("not found") {
        ShareErrorKind::NotFound
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ShareErrorKind::Timeout
    } else if lower.contains("connection reset")
        || lower.contains("broken pipe")
        || lower.contains("connection aborted")
    {
        ShareErrorKind::ConnectionLost
    } else if lower.contains("connection refused")
        || lower.contains("no route to host")
        || lower.contains("unreachable")
        || lower.contains("host is down")
        || lower.contains("name or service not known")
    {
        ShareErrorKind::Unreachable
    } else if lower.contains("stale") || lower.contains("bad file descriptor") {
        ShareErrorKind::SessionExpired
    } else {
        ShareErrorKind::Io
    };
    ShareError::new(kind, format!("{context}: {message}"))
}

// ============================================================================
// Session / Sink
// ============================================================================

struct SmbSession {
    tx: mpsc::Sender<Command>,
    alive: Arc<AtomicBool>,
}

fn worker_gone() -> ShareError {
    ShareError::new(ShareErrorKind::SessionExpired, "SMB worker is gone")
}

async fn call<T>(
    tx: &mpsc::Sender<Command>,
    alive: &AtomicBool,
    make: impl FnOnce(Reply<T>) -> Command,
) -> Result<T, ShareError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(make(reply_tx)).map_err(|_| worker_gone())?;
    let result = reply_rx.await.map_err(|_| worker_gone())?;
    if let Err(e) = &result {
        if e.is_transient() {
            warn!(error = %e, "SMB session marked stale");
            alive.store(false, Ordering::SeqCst);
        }
    }
    result
}

#[async_trait::async_trait]
impl IShareSession for SmbSession {
    async fn create_directory(&self, path: &SharePath) -> Result<(), ShareError> {
        let path = path.to_string();
        call(&self.tx, &self.alive, |r| Command::Mkdir(path, r)).await
    }

    async fn exists(&self, target: &TargetPath) -> Result<bool, ShareError> {
        let path = target.full_path();
        call(&self.tx, &self.alive, |r| Command::Exists(path, r)).await
    }

    async fn open_write(&self, target: &TargetPath) -> Result<Box<dyn IShareSink>, ShareError> {
        let path = target.full_path();
        let handle = call(&self.tx, &self.alive, |r| Command::Create(path, r)).await?;
        Ok(Box::new(SmbSink {
            tx: self.tx.clone(),
            alive: Arc::clone(&self.alive),
            handle,
            written: 0,
            closed: false,
        }))
    }

    async fn remove(&self, target: &TargetPath) -> Result<(), ShareError> {
        let path = target.full_path();
        call(&self.tx, &self.alive, |r| Command::Unlink(path, r)).await
    }

    async fn probe(&self, path: &SharePath) -> Result<usize, ShareError> {
        let path = path.to_string();
        call(&self.tx, &self.alive, |r| Command::List(path, r)).await
    }

    fn is_stale(&self) -> bool {
        !self.alive.load(Ordering::SeqCst)
    }
}

struct SmbSink {
    tx: mpsc::Sender<Command>,
    alive: Arc<AtomicBool>,
    handle: u64,
    written: u64,
    closed: bool,
}

#[async_trait::async_trait]
impl IShareSink for SmbSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ShareError> {
        let data = chunk.to_vec();
        let handle = self.handle;
        call(&self.tx, &self.alive, |r| Command::Write(handle, data, r)).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<u64, ShareError> {
        let mut this = self;
        let handle = this.handle;
        this.closed = true;
        call(&this.tx, &this.alive, |r| Command::Close(handle, r)).await?;
        Ok(this.written)
    }
}

impl Drop for SmbSink {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.tx.send(Command::Discard(self.handle));
        }
    }
}
