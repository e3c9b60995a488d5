//! Broadcast Dispatcher
//!
//! A fixed pool of workers sharing one bounded event queue. Each event is
//! encoded once, then offered to every registered client whose filter
//! accepts it. Delivery never blocks: a client whose outbound queue is full
//! is evicted from the registry.
//!
//! With more than one worker, events may reach a client out of publish order.
//! Use a single worker when per-client ordering of broadcasts matters.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::client::DeliveryError;
use super::hub::Event;
use super::messages::Envelope;
use super::registry::Registry;
use crate::hooks::EventFilter;

/// Outcome of dispatching one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Clients the event was queued for
    pub delivered: usize,
    /// Connected clients skipped because they have not registered
    pub unregistered: usize,
    /// Registered clients rejected by the filter
    pub filtered: usize,
    /// Clients removed because their queue was full
    pub evicted: usize,
    /// Clients whose queue was already closed
    pub closed: usize,
    /// The event could not be encoded and was dropped
    pub encode_failed: bool,
}

/// Fans events out to the registry's members
pub struct Dispatcher<E> {
    registry: Arc<Registry>,
    filter: Arc<dyn EventFilter<E>>,
    log_events: bool,
}

impl<E: Event> Dispatcher<E> {
    pub fn new(registry: Arc<Registry>, filter: Arc<dyn EventFilter<E>>, log_events: bool) -> Self {
        Self {
            registry,
            filter,
            log_events,
        }
    }

    /// Start `workers` tasks consuming `events` until every sender is dropped
    pub fn spawn_workers(
        self: Arc<Self>,
        events: mpsc::Receiver<E>,
        workers: usize,
    ) -> Vec<JoinHandle<()>> {
        let events = Arc::new(Mutex::new(events));

        (0..workers.max(1))
            .map(|worker| {
                let dispatcher = Arc::clone(&self);
                let events = Arc::clone(&events);
                tokio::spawn(async move { dispatcher.run_worker(worker, events).await })
            })
            .collect()
    }

    async fn run_worker(&self, worker: usize, events: Arc<Mutex<mpsc::Receiver<E>>>) {
        tracing::debug!(worker, "Broadcast worker started");

        loop {
            let event = events.lock().await.recv().await;
            let Some(event) = event else {
                break;
            };

            let stats = self.dispatch(&event).await;
            tracing::trace!(worker, ?stats, "Dispatched event");
        }

        tracing::debug!(worker, "Broadcast worker stopped");
    }

    /// Deliver one event to every eligible client
    pub async fn dispatch(&self, event: &E) -> DispatchStats {
        let mut stats = DispatchStats::default();

        let message = match Envelope::event(event).encode() {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode event, dropping it");
                stats.encode_failed = true;
                return stats;
            }
        };

        let members = self.registry.snapshot().await;

        if self.log_events {
            tracing::info!(connected = members.len(), event = %message, "Publish event");
        }

        for member in members {
            let Some(context) = member.context.as_deref() else {
                tracing::trace!(client_id = %member.client.id(), "Client not registered, skipped");
                stats.unregistered += 1;
                continue;
            };

            if !self.filter.accept(context, event) {
                stats.filtered += 1;
                continue;
            }

            match member.client.try_deliver(message.clone()) {
                Ok(()) => stats.delivered += 1,
                Err(DeliveryError::Full) => {
                    tracing::warn!(
                        client_id = %member.client.id(),
                        "Client outbound queue full, evicting"
                    );
                    self.registry.remove(member.client.id()).await;
                    stats.evicted += 1;
                }
                Err(DeliveryError::Closed) => stats.closed += 1,
            }
        }

        stats
    }
}
