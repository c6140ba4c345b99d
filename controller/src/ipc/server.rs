//! IPC server: Unix socket listener + per-client state + message framing.
//!
//! Runs on its own thread, polling a non-blocking listener and non-blocking
//! client sockets.  All state it shares with the frame loop goes through
//! `SharedState` (atomics, the voice inbox and the status board).

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use super::dispatch;
use crate::gesture::controller::SharedState;

/// Maximum message payload size (1 MiB).
const MAX_MESSAGE_SIZE: u32 = 1_048_576;

/// Maximum pending output per client before responses are dropped (64 KiB).
const MAX_WRITE_BUFFER: usize = 65_536;

/// Default rate limit: messages per second per client.
const DEFAULT_RATE_LIMIT: u32 = 200;

/// Rate limit window duration in seconds.
const RATE_LIMIT_WINDOW_SECS: u64 = 1;

/// Sleep between polls when no socket had data.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Per-client rate limiter.
pub struct RateLimiter {
    window_start: Instant,
    message_count: u32,
    pub max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            window_start: Instant::now(),
            message_count: 0,
            max_per_second,
        }
    }

    /// Check if a message is allowed.  Returns true if within rate limit.
    fn check(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.window_start);
        if elapsed.as_secs() >= RATE_LIMIT_WINDOW_SECS {
            self.window_start = now;
            self.message_count = 1;
            true
        } else {
            self.message_count += 1;
            self.message_count <= self.max_per_second
        }
    }
}

/// Read peer credentials from a Unix socket using SO_PEERCRED (Linux)
/// or return None on unsupported platforms.
fn get_peer_cred(stream: &UnixStream) -> Option<(Option<u32>, Option<i32>)> {
    #[cfg(target_os = "linux")]
    {
        let fd = stream.as_raw_fd();
        // SAFETY: ucred is plain old data; getsockopt writes at most `len` bytes.
        let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                &mut cred as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };
        if ret == 0 {
            Some((Some(cred.uid), Some(cred.pid)))
        } else {
            None
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = stream;
        Some((None, None))
    }
}

/// Per-client IPC connection state.
pub struct IpcClient {
    pub stream: UnixStream,
    pub read_buf: Vec<u8>,
    pub write_buf: Vec<u8>,
    pub authenticated: bool,
    pub id: u64,
    /// Peer UID from SO_PEERCRED (Unix only).
    pub peer_uid: Option<u32>,
    /// Peer PID from SO_PEERCRED (Unix only).
    pub peer_pid: Option<i32>,
    pub rate_limiter: RateLimiter,
}

impl IpcClient {
    pub fn new(stream: UnixStream, id: u64) -> Self {
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(id, "failed to set client socket non-blocking: {}", e);
        }

        let (peer_uid, peer_pid) = get_peer_cred(&stream).unwrap_or_else(|| {
            warn!(id, "failed to read peer credentials");
            (None, None)
        });

        if let Some(uid) = peer_uid {
            debug!(id, peer_uid = uid, peer_pid = ?peer_pid, "peer credentials");
        }

        Self {
            stream,
            read_buf: Vec::with_capacity(4096),
            write_buf: Vec::new(),
            authenticated: false,
            id,
            peer_uid,
            peer_pid,
            rate_limiter: RateLimiter::new(DEFAULT_RATE_LIMIT),
        }
    }

    /// Attempt to flush pending writes.
    pub fn flush_writes(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "write zero")),
                Ok(n) => {
                    self.write_buf.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Enqueue a framed message (length prefix + payload) for sending.
    /// Dropped when the client has stopped reading and the buffer is full.
    pub fn enqueue_message(&mut self, payload: &str) -> bool {
        if self.write_buf.len() > MAX_WRITE_BUFFER {
            warn!(client_id = self.id, "write buffer overflow, dropping response");
            return false;
        }
        self.write_buf.extend_from_slice(&frame_message(payload));
        true
    }

    /// Try to extract complete framed messages from the read buffer.
    ///
    /// Returns `Err` on an oversized length prefix; the client should be
    /// dropped.
    pub fn extract_messages(&mut self) -> Result<Vec<String>, u32> {
        let mut messages = Vec::new();
        while self.read_buf.len() >= 4 {
            let len = u32::from_be_bytes([
                self.read_buf[0],
                self.read_buf[1],
                self.read_buf[2],
                self.read_buf[3],
            ]);
            if len > MAX_MESSAGE_SIZE {
                error!(client_id = self.id, len, "message exceeds maximum size");
                self.read_buf.clear();
                return Err(len);
            }
            let total = 4 + len as usize;
            if self.read_buf.len() < total {
                break;
            }
            let payload = String::from_utf8_lossy(&self.read_buf[4..total]).to_string();
            self.read_buf.drain(..total);
            messages.push(payload);
        }
        Ok(messages)
    }

    /// Read whatever is available.  `Ok(false)` means the peer hung up.
    fn fill(&mut self) -> io::Result<bool> {
        let mut buf = [0u8; 4096];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Ok(false),
                Ok(n) => self.read_buf.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Length-prefix (u32 big-endian) a payload.
pub fn frame_message(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(4 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
    out
}

/// IPC server managing the listener socket and all client connections.
pub struct IpcServer {
    pub socket_path: PathBuf,
    listener: Option<UnixListener>,
    pub clients: HashMap<u64, IpcClient>,
    next_client_id: u64,
    pub ipc_trace: bool,
    shared: SharedState,
}

impl IpcServer {
    /// Create IPC server; `bind` opens the socket.
    pub fn new(socket_path: PathBuf, shared: SharedState) -> Self {
        Self {
            socket_path,
            listener: None,
            clients: HashMap::new(),
            next_client_id: 1,
            ipc_trace: false,
            shared,
        }
    }

    /// Compute the default socket path.
    pub fn default_socket_path() -> PathBuf {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|_| format!("/tmp/handpilot-{}", unsafe { libc::getuid() }));
        PathBuf::from(runtime_dir).join("handpilot-ipc.sock")
    }

    /// Bind the listener socket.
    pub fn bind(&mut self) -> anyhow::Result<()> {
        let listener = bind_listener(&self.socket_path)?;
        info!(socket_path = ?self.socket_path, "IPC server listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Accept every pending connection.
    fn accept_pending(&mut self) {
        let Some(listener) = &self.listener else {
            return;
        };
        loop {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    let client_id = self.next_client_id;
                    self.next_client_id += 1;
                    info!(client_id, "IPC client connected");
                    self.clients
                        .insert(client_id, IpcClient::new(stream, client_id));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("accept error: {}", e);
                    break;
                }
            }
        }
    }

    /// Poll all clients for readable data, dispatch messages, flush writes.
    /// Returns the number of messages handled.
    pub fn poll_clients(&mut self) -> usize {
        let mut handled = 0;
        let mut disconnected = Vec::new();

        for (&client_id, client) in self.clients.iter_mut() {
            match client.fill() {
                Ok(true) => {}
                Ok(false) => {
                    debug!(client_id, "client disconnected: eof");
                    disconnected.push(client_id);
                    continue;
                }
                Err(e) => {
                    debug!(client_id, "client disconnected: {}", e);
                    disconnected.push(client_id);
                    continue;
                }
            }

            let messages = match client.extract_messages() {
                Ok(m) => m,
                Err(_) => {
                    disconnected.push(client_id);
                    continue;
                }
            };

            for msg_str in messages {
                handled += 1;
                if !client.rate_limiter.check() {
                    warn!(client_id, "rate limit exceeded, dropping message");
                    client.enqueue_message(
                        "(:type :response :id 0 :status :error :reason \"rate limit exceeded\")",
                    );
                    continue;
                }

                if self.ipc_trace {
                    info!(client_id, "<< {}", msg_str);
                }
                if let Some(resp) = dispatch::handle_message(&self.shared, client, &msg_str) {
                    if self.ipc_trace {
                        info!(client_id, ">> {}", resp);
                    }
                    client.enqueue_message(&resp);
                }
            }

            if let Err(e) = client.flush_writes() {
                debug!(client_id, "write error: {}", e);
                disconnected.push(client_id);
            }
        }

        for id in disconnected {
            info!(client_id = id, "removing disconnected IPC client");
            self.clients.remove(&id);
        }
        handled
    }

    /// Serve until `shutdown` is set.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            self.accept_pending();
            if self.poll_clients() == 0 {
                std::thread::sleep(IDLE_POLL);
            }
        }
        info!("IPC server stopping");
    }

    /// Bind and serve on a background thread.
    pub fn spawn(mut self, shutdown: Arc<AtomicBool>) -> anyhow::Result<JoinHandle<()>> {
        self.bind()?;
        std::thread::Builder::new()
            .name("handpilot-ipc".to_string())
            .spawn(move || self.run(shutdown))
            .context("failed to spawn IPC thread")
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.listener.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                debug!(socket_path = ?self.socket_path, "socket cleanup failed: {}", e);
            }
        }
    }
}

/// Bind a listener at `path`, replacing a stale socket, with mode 0700.
fn bind_listener(path: &Path) -> anyhow::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("failed to bind IPC socket {}", path.display()))?;
    listener.set_nonblocking(true)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(listener)
}
