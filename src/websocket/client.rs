//! Client State
//!
//! Server-side handle for one WebSocket connection: its lifecycle state, its
//! bounded outbound queue and the force-close signal observed by its reader.
//!
//! The socket halves themselves are never stored here. They are owned by the
//! connection's read and write loops (see `handler.rs`).

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Unique identifier for a client connection
pub type ClientId = String;

/// Lifecycle of a client connection
///
/// States only move forward: `Connecting → PendingRegistration → Registered → Closed`,
/// with a shortcut to `Closed` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ClientState {
    /// Accepted, registration timer armed, reader not started yet
    Connecting = 0,
    /// Reading requests, not registered
    PendingRegistration = 1,
    /// Registered and eligible for broadcast
    Registered = 2,
    /// Terminal
    Closed = 3,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClientState::Connecting,
            1 => ClientState::PendingRegistration,
            2 => ClientState::Registered,
            _ => ClientState::Closed,
        }
    }
}

/// Errors when enqueueing onto a client's outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The client is not draining its queue fast enough
    #[error("Client outbound queue is full")]
    Full,

    /// The queue was closed by the registry
    #[error("Client outbound queue is closed")]
    Closed,
}

/// Handle for one connected client
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    connected_at: DateTime<Utc>,
    state: AtomicU8,
    /// `None` once the registry has closed the queue
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    close_tx: watch::Sender<bool>,
}

impl ClientHandle {
    /// Create a client with an outbound queue of the given capacity
    ///
    /// The returned receiver is the only consumer of the queue and belongs to
    /// the client's write loop.
    pub fn new(queue_size: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let (close_tx, _) = watch::channel(false);

        let client = Self {
            id: Uuid::new_v4().to_string(),
            connected_at: Utc::now(),
            state: AtomicU8::new(ClientState::Connecting as u8),
            outbound: Mutex::new(Some(tx)),
            close_tx,
        };

        (Arc::new(client), rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if it is later than the current state
    ///
    /// Returns false if the client was already at or past `next`.
    pub(crate) fn advance(&self, next: ClientState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (next as u8 > current).then_some(next as u8)
            })
            .is_ok()
    }

    /// Non-blocking enqueue, used by broadcasters
    pub fn try_deliver(&self, message: String) -> Result<(), DeliveryError> {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = outbound.as_ref().ok_or(DeliveryError::Closed)?;

        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Enqueue a direct response, waiting for room in the queue
    pub async fn send(&self, message: String) -> Result<(), DeliveryError> {
        let sender = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DeliveryError::Closed)?;

        sender.send(message).await.map_err(|_| DeliveryError::Closed)
    }

    /// Close the outbound queue, ending the write loop once it drains
    ///
    /// Returns true only for the call that actually closed it.
    pub(crate) fn close_outbound(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_outbound_closed(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Ask the read loop to stop, which tears the connection down
    pub fn force_close(&self) {
        self.close_tx.send_replace(true);
    }

    pub fn is_force_closed(&self) -> bool {
        *self.close_tx.borrow()
    }

    /// Resolves once [`force_close`](Self::force_close) has been called
    pub async fn closed(&self) {
        let mut rx = self.close_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
