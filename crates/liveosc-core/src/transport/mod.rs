//! UDP transport to AbletonOSC with request/response correlation.
//!
//! A [`Transport`] owns one socket bound to the local listen address and one
//! background receive loop. `send` is fire-and-forget. `query` registers a
//! waiter in the pending table, sends, and blocks on the waiter's channel
//! until the receive loop hands it a matching reply or the timeout passes.
//! Any number of queries may be outstanding at once, from any thread.
//!
//! # Lifecycle
//!
//! ```text
//! Created --start()--> Listening --stop()--> Stopped
//! ```
//!
//! A stopped transport cannot be restarted; build a new one.

mod capture;
mod pending;
mod state;

pub use capture::{CaptureBuffer, CaptureGuard, Captured};
pub use pending::{wire_id, PendingRequests, ReplyMatch, RequestId, Resolution};
pub use state::{ClipSlotInfo, ConnectionState, StateHandle};

use crate::error::{Error, Result};
use crate::osc;
use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use rosc::OscType;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receive timeout so the loop notices `stop()` promptly.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// How long a timed-out query shields newer queries from its late reply.
pub const DEFAULT_STALE_GRACE: Duration = Duration::from_secs(2);

/// Path queried to check whether Live is answering.
pub const HEARTBEAT_PATH: &str = "/live/song/get/tempo";

/// Remote and local addresses, fixed for the life of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub remote_host: String,
    pub remote_port: u16,
    pub listen_host: String,
    /// 0 binds an ephemeral port
    pub listen_port: u16,
}

impl Endpoint {
    /// Both sides on 127.0.0.1.
    pub fn localhost(remote_port: u16, listen_port: u16) -> Self {
        Self {
            remote_host: "127.0.0.1".to_string(),
            remote_port,
            listen_host: "127.0.0.1".to_string(),
            listen_port,
        }
    }

    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.remote_host, self.remote_port)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::localhost(11000, 11001)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Created,
    Listening,
    Stopped,
}

/// A correlated request.
#[derive(Debug, Clone)]
pub struct Query {
    pub path: String,
    pub args: Vec<OscType>,
    /// Defaults to `path`
    pub reply_path: Option<String>,
    pub matching: ReplyMatch,
    pub timeout: Duration,
}

impl Query {
    pub fn new(path: &str, args: Vec<OscType>, timeout: Duration) -> Self {
        Self {
            path: path.to_string(),
            args,
            reply_path: None,
            matching: ReplyMatch::Path,
            timeout,
        }
    }

    pub fn matching(mut self, matching: ReplyMatch) -> Self {
        self.matching = matching;
        self
    }

    pub fn reply_path(mut self, path: &str) -> Self {
        self.reply_path = Some(path.to_string());
        self
    }
}

/// State shared with the receive loop.
struct Shared {
    running: AtomicBool,
    pending: PendingRequests,
    capture: CaptureBuffer,
    state: StateHandle,
}

impl Shared {
    /// State is updated before the waiter wakes, so a caller can read it
    /// straight after its query returns.
    fn dispatch(&self, path: &str, args: &[OscType]) {
        self.capture.record(path, args);
        self.track_state(path, args);

        match self.pending.resolve(path, args) {
            Resolution::Delivered(id) => debug!("[OSC] ← {} answered request #{}", path, id),
            Resolution::Stale => {
                debug!("[OSC] Dropping late reply on {} for a query that already timed out", path)
            }
            Resolution::Unmatched => {}
        }
    }

    /// Passive state tracking, independent of any waiting query.
    fn track_state(&self, path: &str, args: &[OscType]) {
        let first = args.first();
        match path {
            "/live/song/get/tempo" => {
                if let Some(tempo) = first.and_then(osc::arg_f32) {
                    self.state.with_write(|s| s.tempo = Some(tempo));
                }
            }
            "/live/song/get/is_playing" => {
                if let Some(playing) = first.and_then(osc::arg_bool) {
                    self.state.with_write(|s| s.is_playing = Some(playing));
                }
            }
            "/live/song/get/num_tracks" => {
                if let Some(count) = first.and_then(osc::arg_i32) {
                    self.state.with_write(|s| s.track_count = Some(count));
                }
            }
            "/live/view/get/selected_track" => {
                if let Some(track) = first.and_then(osc::arg_i32) {
                    self.state.with_write(|s| s.current_track = Some(track));
                }
            }
            _ => debug!("[OSC] ← {} {}", path, osc::format_args(args)),
        }
    }
}

struct Lifecycle {
    status: TransportStatus,
    socket: Option<Arc<UdpSocket>>,
    thread: Option<JoinHandle<()>>,
}

/// UDP transport with a background receive loop.
pub struct Transport {
    endpoint: Endpoint,
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl Transport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_stale_grace(endpoint, DEFAULT_STALE_GRACE)
    }

    pub fn with_stale_grace(endpoint: Endpoint, stale_grace: Duration) -> Self {
        Self {
            endpoint,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                pending: PendingRequests::new(stale_grace),
                capture: CaptureBuffer::new(),
                state: StateHandle::new(),
            }),
            lifecycle: Mutex::new(Lifecycle {
                status: TransportStatus::Created,
                socket: None,
                thread: None,
            }),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the listen address and spawn the receive loop.
    /// Calling it again while listening is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.status {
            TransportStatus::Listening => return Ok(()),
            TransportStatus::Stopped => return Err(Error::Restart),
            TransportStatus::Created => {}
        }

        let socket = UdpSocket::bind(self.endpoint.listen_addr())?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        let socket = Arc::new(socket);

        self.shared.running.store(true, Ordering::Release);
        let loop_socket = Arc::clone(&socket);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("liveosc-recv".to_string())
            .spawn(move || receive_loop(loop_socket, shared));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                return Err(e.into());
            }
        };

        info!(
            "[Transport] Listening on {} (remote {})",
            socket.local_addr()?,
            self.endpoint.remote_addr()
        );
        lifecycle.socket = Some(socket);
        lifecycle.thread = Some(handle);
        lifecycle.status = TransportStatus::Listening;
        Ok(())
    }

    /// Stop the receive loop and release the socket. Queries still waiting
    /// return [`Error::Interrupted`].
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.status == TransportStatus::Stopped {
            return;
        }
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = lifecycle.thread.take() {
            let _ = handle.join();
        }
        lifecycle.socket = None;
        self.shared.pending.clear();
        if lifecycle.status == TransportStatus::Listening {
            info!("[Transport] Stopped");
        }
        lifecycle.status = TransportStatus::Stopped;
    }

    pub fn status(&self) -> TransportStatus {
        self.lifecycle().status
    }

    pub fn is_listening(&self) -> bool {
        self.status() == TransportStatus::Listening
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The bound listen address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle()
            .socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
    }

    /// Passively tracked Live state.
    pub fn state(&self) -> &StateHandle {
        &self.shared.state
    }

    /// Number of queries currently waiting for a reply.
    pub fn outstanding_queries(&self) -> usize {
        self.shared.pending.outstanding()
    }

    fn socket(&self) -> Result<Arc<UdpSocket>> {
        let lifecycle = self.lifecycle();
        match (&lifecycle.status, &lifecycle.socket) {
            (TransportStatus::Listening, Some(socket)) => Ok(Arc::clone(socket)),
            _ => Err(Error::NotListening),
        }
    }

    fn send_on(&self, socket: &UdpSocket, path: &str, args: Vec<OscType>) -> Result<()> {
        debug!("[OSC] → {} {}", path, osc::format_args(&args));
        let buf = osc::encode_message(path, args)?;
        socket.send_to(&buf, self.endpoint.remote_addr())?;
        Ok(())
    }

    /// Fire-and-forget send. No acknowledgement, no retry.
    pub fn send(&self, path: &str, args: Vec<OscType>) -> Result<()> {
        let socket = self.socket()?;
        self.send_on(&socket, path, args)
    }

    /// Send and wait for a reply on the same path.
    ///
    /// Returns `Ok(None)` on timeout. A reply arriving after the timeout is
    /// never returned to a later query for the same path within the stale
    /// grace period.
    pub fn query(
        &self,
        path: &str,
        args: Vec<OscType>,
        timeout: Duration,
    ) -> Result<Option<Vec<OscType>>> {
        self.query_with(Query::new(path, args, timeout))
    }

    /// Send a [`Query`] and wait for its correlated reply.
    pub fn query_with(&self, query: Query) -> Result<Option<Vec<OscType>>> {
        let socket = self.socket()?;
        let pending = &self.shared.pending;
        let id = pending.next_id();
        let reply_path = query.reply_path.clone().unwrap_or_else(|| query.path.clone());

        let mut args = query.args;
        let key_args = match query.matching {
            ReplyMatch::RequestId => {
                args.insert(0, OscType::Int(wire_id(id)));
                Vec::new()
            }
            ReplyMatch::Path => Vec::new(),
            ReplyMatch::EchoArgs => args.clone(),
        };
        let registration = pending.register(id, &reply_path, key_args, query.matching);

        if let Err(e) = self.send_on(&socket, &query.path, args) {
            pending.deregister(id, false);
            return Err(e);
        }

        match registration.rx.recv_timeout(query.timeout) {
            Ok(payload) => Ok(Some(payload)),
            Err(RecvTimeoutError::Timeout) => {
                pending.deregister(id, true);
                // The reply may have landed between the timeout and deregistering.
                match registration.rx.try_recv() {
                    Ok(payload) => Ok(Some(payload)),
                    Err(_) => {
                        debug!("[OSC] Query #{} on {} timed out after {:?}", id, query.path, query.timeout);
                        Ok(None)
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::Interrupted(query.path)),
        }
    }

    /// Send and collect every inbound message for the whole `window`.
    ///
    /// For operations that answer with an unknown number of messages.
    /// Capture is switched off and the buffer cleared on every exit path.
    pub fn query_raw(
        &self,
        path: &str,
        args: Vec<OscType>,
        window: Duration,
    ) -> Result<Vec<Captured>> {
        let socket = self.socket()?;
        let capture = self.shared.capture.begin();
        self.send_on(&socket, path, args)?;
        thread::sleep(window);
        Ok(capture.take())
    }

    /// Whether capture-all is active. Exposed for diagnostics.
    pub fn is_capturing(&self) -> bool {
        self.shared.capture.is_enabled()
    }

    /// Messages sitting in the capture buffer.
    pub fn captured_len(&self) -> usize {
        self.shared.capture.len()
    }

    /// One tempo query; true iff Live answered in time.
    pub fn test_connection(&self, timeout: Duration) -> bool {
        matches!(self.query(HEARTBEAT_PATH, vec![], timeout), Ok(Some(_)))
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.endpoint)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn receive_loop(socket: Arc<UdpSocket>, shared: Arc<Shared>) {
    let mut buf = vec![0u8; osc::MAX_DATAGRAM];
    while shared.running.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((size, from)) => match osc::decode_messages(&buf[..size]) {
                Ok(messages) => {
                    for message in messages {
                        shared.dispatch(&message.addr, &message.args);
                    }
                }
                Err(e) => warn!("[OSC] Dropping undecodable datagram from {}: {}", from, e),
            },
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                if shared.running.load(Ordering::Acquire) {
                    warn!("[OSC] Receive error: {}", e);
                }
            }
        }
    }
    debug!("[Transport] Receive loop exited");
}
