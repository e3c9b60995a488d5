//! Event Hub
//!
//! Owns the client registry, the shared publish queue and the broadcast
//! workers. A `Hub` is a cheap handle: clone it into every collaborator.

use axum::{routing::get, Router};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;

use super::dispatcher::Dispatcher;
use super::handler::websocket_handler;
use super::registry::Registry;
use crate::config::Options;
use crate::error::{HubError, HubResult};

/// Payloads that can be published through a hub
pub trait Event: Serialize + Send + Sync + 'static {}

impl<T> Event for T where T: Serialize + Send + Sync + 'static {}

/// Broadcast hub for WebSocket clients
pub struct Hub<E = Value> {
    inner: Arc<HubInner<E>>,
}

struct HubInner<E> {
    registry: Arc<Registry>,
    events: mpsc::Sender<E>,
    options: Options<E>,
}

impl<E> Clone for Hub<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Event> Hub<E> {
    /// Create a hub and start its broadcast workers
    ///
    /// Must be called from within a tokio runtime. Workers stop once every
    /// clone of the hub has been dropped.
    pub fn new(options: Options<E>) -> Self {
        let options = options.normalized();
        let registry = Arc::new(Registry::new());
        let (events, receiver) = mpsc::channel(options.event_queue_size);

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&options.filter),
            options.log_event_enabled,
        ));
        dispatcher.spawn_workers(receiver, options.publish_routine_num);

        tracing::info!(
            event_queue_size = options.event_queue_size,
            workers = options.publish_routine_num,
            register_timeout_secs = options.register_timeout.as_secs(),
            "Event hub started"
        );

        Self {
            inner: Arc::new(HubInner {
                registry,
                events,
                options,
            }),
        }
    }

    /// Queue an event for broadcast, waiting while the queue is full
    pub async fn publish(&self, event: E) -> HubResult<()> {
        self.inner
            .events
            .send(event)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Queue an event for broadcast, failing if the queue is full
    pub fn try_publish(&self, event: E) -> HubResult<()> {
        self.inner.events.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => HubError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => HubError::Closed,
        })
    }

    /// Router accepting WebSocket connections on `path`
    ///
    /// Merge it into the embedding application's router.
    pub fn router(&self, path: &str) -> Router {
        Router::new()
            .route(path, get(websocket_handler::<E>))
            .with_state(self.clone())
    }

    /// Serve the hub on its own listener
    ///
    /// Returns the bound address once listening; the server runs in a
    /// background task for the life of the process.
    pub async fn bind(&self, path: &str, addr: impl ToSocketAddrs) -> HubResult<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(path, listener)
    }

    /// Serve the hub on an already bound listener
    pub fn serve_listener(&self, path: &str, listener: TcpListener) -> HubResult<SocketAddr> {
        let local_addr = listener.local_addr()?;
        let router = crate::api::build_router(self, path);

        tracing::info!("WebSocket event hub listening on {}{}", local_addr, path);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "Event hub listener failed");
            }
        });

        Ok(local_addr)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn options(&self) -> &Options<E> {
        &self.inner.options
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.inner.registry.connection_count().await
    }

    /// Get the number of registered clients
    pub async fn registered_count(&self) -> usize {
        self.inner.registry.registered_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::client::ClientHandle;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_reaches_registered_client() {
        let hub: Hub = Hub::new(Options {
            publish_routine_num: 1,
            ..Options::default()
        });

        let (client, mut rx) = ClientHandle::new(8);
        hub.registry().add(Arc::clone(&client)).await;
        hub.registry().mark_registered(client.id(), Value::Null).await;
        assert_eq!(hub.registered_count().await, 1);

        hub.publish(json!({"event": "x"})).await.unwrap();

        let text = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["d"], json!({"event": "x"}));
    }

    #[tokio::test]
    async fn test_try_publish_full_queue() {
        let hub: Hub = Hub::new(Options {
            event_queue_size: 1,
            publish_routine_num: 1,
            ..Options::default()
        });

        // Fill faster than the worker can possibly drain within one poll
        let mut saw_full = false;
        for i in 0..1000 {
            if let Err(e) = hub.try_publish(json!(i)) {
                assert!(matches!(e, HubError::QueueFull));
                saw_full = true;
                break;
            }
        }
        assert!(saw_full);
    }

    #[tokio::test]
    async fn test_options_are_normalized() {
        let hub: Hub = Hub::new(Options {
            event_queue_size: 0,
            publish_routine_num: 0,
            ..Options::default()
        });
        assert_eq!(hub.options().event_queue_size, 1024);
        assert_eq!(hub.options().publish_routine_num, 4);
        assert_eq!(hub.connection_count().await, 0);
    }
}
