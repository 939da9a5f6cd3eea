//! Registry of active client sessions and the send path into them.
//!
//! [`ConnectionRegistry`] maps [`SessionId`] to a [`SessionHandle`], the
//! sending half of that connection's outbound queue. It is owned by the
//! server boundary and shared with every session task via [`Arc`].
//!
//! # Failure isolation
//!
//! Every send is bounded by the registry's send timeout. A send that finds
//! the connection closed, or that cannot be queued before the deadline,
//! removes that one session and leaves every other session untouched.
//!
//! # Concurrency
//!
//! [`ConnectionRegistry::broadcast`] snapshots the current handles under
//! the read lock and releases it before sending. Sessions added or removed
//! while a broadcast is in flight are simply not part of that snapshot.
//! Removals of already-removed sessions are no-ops.
//!
//! [`Arc`]: std::sync::Arc

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use satstream_types::{PositionSample, SessionId};
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, warn};

/// Why a sample could not be handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionSendError {
    /// The connection's writer has gone away.
    #[error("connection closed")]
    Closed,

    /// The connection did not accept the sample before the deadline.
    #[error("send timed out after {0:?}")]
    TimedOut(Duration),

    /// The session is not (or no longer) in the registry.
    #[error("session not registered")]
    NotRegistered,
}

/// Sending half of one connection's outbound queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<PositionSample>,
    connected_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Create a handle and the receiver the connection writer drains.
    pub fn channel(id: SessionId, capacity: usize) -> (Self, mpsc::Receiver<PositionSample>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            tx,
            connected_at: Utc::now(),
        };
        (handle, rx)
    }

    /// The session this handle belongs to.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// When the connection was registered.
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Whether the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, sample: PositionSample, timeout: Duration) -> Result<(), ConnectionSendError> {
        self.tx
            .send_timeout(sample, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Closed(_) => ConnectionSendError::Closed,
                SendTimeoutError::Timeout(_) => ConnectionSendError::TimedOut(timeout),
            })
    }
}

/// Outcome of one [`ConnectionRegistry::broadcast`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions that accepted the sample.
    pub delivered: usize,
    /// Sessions removed because their send failed.
    pub removed: Vec<SessionId>,
}

/// Concurrency-safe set of active sessions.
#[derive(Debug)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    send_timeout: Duration,
}

impl ConnectionRegistry {
    /// Create an empty registry whose sends give up after `send_timeout`.
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            send_timeout,
        }
    }

    /// Per-send deadline.
    pub const fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Register a session. Returns `false` (and changes nothing) if the
    /// identity is already present.
    pub async fn add(&self, handle: SessionHandle) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(handle.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(session_id = %handle.id, "Session registered");
                slot.insert(handle);
                true
            }
        }
    }

    /// Deregister a session. Returns `false` if it was not present.
    pub async fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Session deregistered");
        }
        removed
    }

    /// Whether `id` is currently registered.
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Identities and registration times of all registered sessions.
    pub async fn sessions(&self) -> Vec<(SessionId, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .sessions
            .read()
            .await
            .values()
            .map(|h| (h.id, h.connected_at))
            .collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }

    /// Deliver `sample` to one session.
    ///
    /// On failure the session is removed before the error is returned.
    pub async fn send_to(
        &self,
        id: SessionId,
        sample: PositionSample,
    ) -> Result<(), ConnectionSendError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ConnectionSendError::NotRegistered)?;

        if let Err(e) = handle.send(sample, self.send_timeout).await {
            warn!(session_id = %id, error = %e, "Send failed, removing session");
            self.remove(id).await;
            return Err(e);
        }
        Ok(())
    }

    /// Deliver `sample` to every registered session.
    ///
    /// Sends run concurrently. Each failing session is removed; the rest
    /// still receive the sample.
    pub async fn broadcast(&self, sample: PositionSample) -> BroadcastReport {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        let timeout = self.send_timeout;

        let results = join_all(handles.iter().map(|handle| async move {
            (handle.id, handle.send(sample, timeout).await)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (id, result) in results {
            match result {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Broadcast send failed, removing session");
                    report.removed.push(id);
                }
            }
        }

        if !report.removed.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &report.removed {
                sessions.remove(id);
            }
        }

        report
    }

    /// Remove every session, dropping their senders so connection writers
    /// finish. Returns how many were removed.
    pub async fn close_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }
}
