//! Outstanding queries and reply correlation.
//!
//! Every query registers a waiter with a fresh [`RequestId`] and a
//! single-shot channel. The receive loop offers each inbound message to
//! [`PendingRequests::resolve`], which hands it to the oldest waiter that
//! matches. Waiters deregister themselves on every exit path.
//!
//! A query that times out leaves a stale marker behind for a grace period.
//! A late reply that would otherwise be handed to a newer query for the same
//! path consumes the marker instead and is dropped. Markers only shadow
//! queries registered after them, never an older one still waiting.
//!
//! Replies are assumed to arrive in request order. When the marked reply was
//! lost rather than late, the marker swallows the next query's reply instead.
//! That query is then marked displaced and leaves no marker of its own when
//! it times out, so a single lost reply costs at most one extra query.

use crossbeam_channel::{bounded, Receiver, Sender};
use rosc::OscType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Identifier assigned to each query, increasing per transport.
pub type RequestId = u64;

/// How a reply is attributed to an outstanding query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMatch {
    /// Reply path equals the expected reply path.
    Path,
    /// Reply path matches and the reply arguments begin with the request
    /// arguments. The echoed prefix is stripped from the result.
    EchoArgs,
    /// The request id travels as a leading `Int` argument and the reply must
    /// carry it back in the same position. The id is stripped from the result.
    RequestId,
}

/// The id as carried on the wire. Ids wrap at the `i32` range.
pub fn wire_id(id: RequestId) -> i32 {
    id as i32
}

struct Waiter {
    id: RequestId,
    reply_path: String,
    key_args: Vec<OscType>,
    matching: ReplyMatch,
    tx: Sender<Vec<OscType>>,
    /// A stale marker took a reply this waiter would have accepted
    displaced: bool,
}

impl Waiter {
    /// Payload to deliver if `args` answers this waiter.
    fn accept(&self, path: &str, args: &[OscType]) -> Option<Vec<OscType>> {
        if path != self.reply_path {
            return None;
        }
        match self.matching {
            ReplyMatch::Path => Some(args.to_vec()),
            ReplyMatch::EchoArgs => args
                .starts_with(&self.key_args)
                .then(|| args[self.key_args.len()..].to_vec()),
            ReplyMatch::RequestId => match args.first() {
                Some(OscType::Int(id)) if *id == wire_id(self.id) => Some(args[1..].to_vec()),
                _ => None,
            },
        }
    }
}

struct StaleMarker {
    /// Id of the query that timed out
    id: RequestId,
    reply_path: String,
    key_args: Vec<OscType>,
    matching: ReplyMatch,
    expires: Instant,
}

impl StaleMarker {
    fn covers(&self, path: &str, args: &[OscType]) -> bool {
        path == self.reply_path
            && match self.matching {
                ReplyMatch::EchoArgs => args.starts_with(&self.key_args),
                _ => true,
            }
    }
}

#[derive(Default)]
struct Inner {
    waiters: Vec<Waiter>,
    stale: Vec<StaleMarker>,
}

/// What happened to an inbound message offered to the pending table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Delivered(RequestId),
    /// Matched a query that already timed out
    Stale,
    Unmatched,
}

/// Table of outstanding queries.
pub struct PendingRequests {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
    stale_grace: Duration,
}

/// Handle held by the querying thread while it waits.
pub struct Registration {
    pub id: RequestId,
    pub rx: Receiver<Vec<OscType>>,
}

impl PendingRequests {
    pub fn new(stale_grace: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Mutex::new(Inner::default()),
            stale_grace,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the next request id. `RequestId` queries need it before the
    /// key arguments are known.
    pub fn next_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a waiter under an id from [`Self::next_id`].
    pub fn register(
        &self,
        id: RequestId,
        reply_path: &str,
        key_args: Vec<OscType>,
        matching: ReplyMatch,
    ) -> Registration {
        let (tx, rx) = bounded(1);
        self.lock().waiters.push(Waiter {
            id,
            reply_path: reply_path.to_string(),
            key_args,
            matching,
            tx,
            displaced: false,
        });
        Registration { id, rx }
    }

    /// Remove a waiter. When `timed_out`, a stale marker is left so the late
    /// reply cannot satisfy a newer query. A displaced waiter leaves none.
    pub fn deregister(&self, id: RequestId, timed_out: bool) {
        let mut inner = self.lock();
        let Some(pos) = inner.waiters.iter().position(|w| w.id == id) else {
            return;
        };
        let waiter = inner.waiters.remove(pos);
        if timed_out && waiter.matching != ReplyMatch::RequestId && !waiter.displaced {
            inner.stale.push(StaleMarker {
                id: waiter.id,
                reply_path: waiter.reply_path,
                key_args: waiter.key_args,
                matching: waiter.matching,
                expires: Instant::now() + self.stale_grace,
            });
        }
    }

    /// Offer an inbound message to the outstanding queries.
    pub fn resolve(&self, path: &str, args: &[OscType]) -> Resolution {
        let mut inner = self.lock();
        let now = Instant::now();
        inner.stale.retain(|m| m.expires > now);

        // Waiters are kept in registration order, so the first match is the oldest.
        let waiter = inner
            .waiters
            .iter()
            .position(|w| w.accept(path, args).is_some());

        // Only a marker older than the waiter owns the reply. Markers are
        // pushed in timeout order, so pick the lowest id explicitly.
        let marker = match waiter {
            Some(pos) if inner.waiters[pos].matching == ReplyMatch::RequestId => None,
            Some(pos) => oldest_marker(&inner.stale, path, args, Some(inner.waiters[pos].id)),
            None => oldest_marker(&inner.stale, path, args, None),
        };

        if let Some(marker) = marker {
            inner.stale.remove(marker);
            if let Some(pos) = waiter {
                inner.waiters[pos].displaced = true;
            }
            return Resolution::Stale;
        }

        let Some(pos) = waiter else {
            return Resolution::Unmatched;
        };
        let waiter = inner.waiters.remove(pos);
        if let Some(payload) = waiter.accept(path, args) {
            // The receiver may already be gone if the caller gave up; that is fine.
            let _ = waiter.tx.try_send(payload);
        }
        Resolution::Delivered(waiter.id)
    }

    /// Number of queries currently waiting.
    pub fn outstanding(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Drop every waiter. Their receivers observe disconnection.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.waiters.clear();
        inner.stale.clear();
    }
}

/// Index of the oldest marker covering the reply, limited to markers older
/// than `before` when a live waiter would take it.
fn oldest_marker(
    stale: &[StaleMarker],
    path: &str,
    args: &[OscType],
    before: Option<RequestId>,
) -> Option<usize> {
    stale
        .iter()
        .enumerate()
        .filter(|(_, m)| m.covers(path, args) && before.map_or(true, |id| m.id < id))
        .min_by_key(|(_, m)| m.id)
        .map(|(i, _)| i)
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequests")
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}
