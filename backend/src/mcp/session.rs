//! MCP session management.
//!
//! Manages session lifecycle for SSE connections. A session exists exactly
//! as long as its push channel: it is created when the stream opens and
//! removed when the stream closes, fails to accept a write, or is shut down
//! explicitly. Sessions are identified by random UUIDs.

use super::server::McpServer;
use crate::capabilities::CapabilityRegistry;
use crate::error::TransportError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pizzaz_types::JsonRpcResponse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque session identifier.
pub type SessionId = String;

/// Frames written to a push channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushFrame {
    /// A serialized JSON-RPC message.
    Message(String),
    /// Keep-alive comment.
    Heartbeat,
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Result of a non-blocking push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Buffer full; the frame was dropped.
    Full,
    /// The stream side is gone.
    Closed,
}

/// Sending half of a session's push channel.
#[derive(Clone, Debug)]
pub struct PushChannel {
    tx: mpsc::Sender<PushFrame>,
}

impl PushChannel {
    /// Create a bounded push channel, returning the receiver that feeds the stream.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PushFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a frame without waiting.
    pub fn try_push(&self, frame: PushFrame) -> PushOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => PushOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => PushOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => PushOutcome::Closed,
        }
    }

    /// Queue a frame, waiting for buffer space. False once the stream is gone.
    async fn push(&self, frame: PushFrame) -> bool {
        self.tx.send(frame).await.is_ok()
    }
}

struct SessionEntry {
    created_at: DateTime<Utc>,
    last_activity: Instant,
    push: PushChannel,
    cancel: CancellationToken,
    server: Arc<McpServer>,
}

impl SessionEntry {
    fn handle(&self, id: &str) -> SessionHandle {
        SessionHandle {
            id: id.to_string(),
            push: self.push.clone(),
            cancel: self.cancel.clone(),
            server: self.server.clone(),
        }
    }
}

/// A looked-up session. Cheap to clone; drop it when the call is done.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: SessionId,
    push: PushChannel,
    cancel: CancellationToken,
    server: Arc<McpServer>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn server(&self) -> &McpServer {
        &self.server
    }

    pub fn push_channel(&self) -> &PushChannel {
        &self.push
    }

    /// Token cancelled when the session closes.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn state(&self) -> SessionState {
        if self.cancel.is_cancelled() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }

    /// Write a response envelope to the push channel.
    ///
    /// Waits for buffer space, but gives up as soon as the session closes.
    pub async fn deliver(&self, response: &JsonRpcResponse) -> Result<(), TransportError> {
        if self.state() == SessionState::Closed {
            return Err(TransportError::ChannelClosed(self.id.clone()));
        }

        let json = serde_json::to_string(response)
            .map_err(|e| TransportError::Encode(self.id.clone(), e))?;
        tokio::select! {
            sent = self.push.push(PushFrame::Message(json)) => {
                if sent {
                    Ok(())
                } else {
                    Err(TransportError::ChannelClosed(self.id.clone()))
                }
            }
            _ = self.cancel.cancelled() => Err(TransportError::ChannelClosed(self.id.clone())),
        }
    }
}

/// Manager for MCP sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SessionId, SessionEntry>>>,
    capabilities: Arc<CapabilityRegistry>,
}

impl SessionRegistry {
    /// Create a new session registry serving `capabilities`.
    pub fn new(capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            capabilities,
        }
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    /// Register a new session owning `push` and return its handle.
    pub fn create(&self, push: PushChannel) -> SessionHandle {
        let mut sessions = self.sessions.lock();
        let mut id = Uuid::new_v4().to_string();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let entry = SessionEntry {
            created_at: Utc::now(),
            last_activity: Instant::now(),
            push,
            cancel: CancellationToken::new(),
            server: Arc::new(McpServer::new(id.clone(), self.capabilities.clone())),
        };
        let handle = entry.handle(&id);
        sessions.insert(id.clone(), entry);
        drop(sessions);

        info!("Created MCP session: {}", id);
        handle
    }

    /// Get a session by ID, refreshing its last-activity time.
    pub fn lookup(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock();
        sessions.get_mut(id).map(|entry| {
            entry.last_activity = Instant::now();
            entry.handle(id)
        })
    }

    /// Remove a session and close it. Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.lock().remove(id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                info!(
                    "Closed MCP session: {} (age: {}s)",
                    id,
                    (Utc::now() - entry.created_at).num_seconds()
                );
                true
            }
            None => {
                debug!("MCP session {} already gone", id);
                false
            }
        }
    }

    /// Close every session. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<(SessionId, SessionEntry)> = self.sessions.lock().drain().collect();
        for (id, entry) in &drained {
            entry.cancel.cancel();
            debug!("Closed MCP session on shutdown: {}", id);
        }
        if !drained.is_empty() {
            info!("Closed {} MCP session(s)", drained.len());
        }
        drained.len()
    }

    /// Close sessions with no pull activity for longer than `max_idle`.
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let mut reaped = Vec::new();
        self.sessions.lock().retain(|id, entry| {
            let keep = entry.last_activity.elapsed() < max_idle;
            if !keep {
                reaped.push((id.clone(), entry.cancel.clone()));
            }
            keep
        });

        for (id, cancel) in &reaped {
            cancel.cancel();
            warn!("Reaped idle MCP session: {}", id);
        }
        reaped.len()
    }

    /// Ids of all live sessions, in no particular order.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Get the number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
