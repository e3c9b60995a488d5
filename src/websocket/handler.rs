//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and runs the connection lifecycle:
//!
//! - the read loop runs in the upgrade task and is the only reader
//! - the write loop runs in its own task and is the only writer
//! - a one-shot timer closes connections that never register
//!
//! The loops coordinate only through the client's outbound queue and its
//! force-close signal.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response as HttpResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::client::{ClientHandle, ClientState};
use super::error::RequestError;
use super::hub::{Event, Hub};
use super::messages::{Envelope, Request, Response};
use super::registry::Registry;
use crate::config::TransportOptions;

/// WebSocket upgrade handler
///
/// Cross-origin upgrades are accepted.
pub async fn websocket_handler<E: Event>(
    ws: WebSocketUpgrade,
    State(hub): State<Hub<E>>,
) -> HttpResponse {
    let max_size = hub.options().transport.max_message_size;
    ws.max_message_size(max_size)
        .max_frame_size(max_size)
        .on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle an established WebSocket connection
async fn handle_socket<E: Event>(socket: WebSocket, hub: Hub<E>) {
    let (sender, receiver) = socket.split();
    let options = hub.options();
    let registry = Arc::clone(hub.registry());

    let (client, outbound) = ClientHandle::new(options.client_queue_size);
    registry.add(Arc::clone(&client)).await;

    let timer = tokio::spawn(registration_timer(
        Arc::clone(&registry),
        Arc::clone(&client),
        options.register_timeout,
    ));

    let writer = tokio::spawn(write_loop(
        Arc::clone(&client),
        sender,
        outbound,
        options.transport.clone(),
    ));

    read_loop(&hub, &client, receiver).await;

    // Cleanup: unregister, which also closes the outbound queue
    registry.remove(client.id()).await;
    timer.abort();
    if let Err(e) = writer.await {
        tracing::debug!(client_id = %client.id(), error = %e, "Write task ended abnormally");
    }

    let lifetime = chrono::Utc::now() - client.connected_at();
    tracing::debug!(
        client_id = %client.id(),
        lifetime_secs = lifetime.num_seconds(),
        "Connection finished"
    );
}

/// Close the connection if the client has not registered in time
async fn registration_timer(registry: Arc<Registry>, client: Arc<ClientHandle>, timeout: Duration) {
    time::sleep(timeout).await;

    if !registry.is_registered(client.id()).await {
        tracing::info!(
            client_id = %client.id(),
            timeout_secs = timeout.as_secs_f64(),
            "Client not registered in time, disconnecting"
        );
        client.force_close();
    }
}

/// Read requests until the peer goes away or the client is force-closed
async fn read_loop<E, S>(hub: &Hub<E>, client: &ClientHandle, mut receiver: S)
where
    E: Event,
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let pong_wait = hub.options().transport.pong_wait;
    let closed = client.closed();
    tokio::pin!(closed);

    client.advance(ClientState::PendingRegistration);

    loop {
        let next = tokio::select! {
            _ = &mut closed => {
                tracing::debug!(client_id = %client.id(), "Client force-closed");
                break;
            }
            next = time::timeout(pong_wait, receiver.next()) => next,
        };

        let message = match next {
            Err(_) => {
                tracing::debug!(client_id = %client.id(), "Peer liveness timeout");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(client_id = %client.id(), error = %e, "WebSocket receive error");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        let frame = match message {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            // Axum answers pings; any frame keeps the peer alive
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => {
                tracing::debug!(client_id = %client.id(), "Client requested close");
                break;
            }
        };

        let reply = handle_frame(hub, client, &frame).await;
        let body = match reply.encode() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(client_id = %client.id(), error = %e, "Failed to encode reply");
                continue;
            }
        };

        tracing::debug!(client_id = %client.id(), reply = %body, "Reply to client");
        if client.send(body).await.is_err() {
            break;
        }
    }
}

/// Turn one inbound frame into the envelope answering it
async fn handle_frame<E: Event>(hub: &Hub<E>, client: &ClientHandle, frame: &str) -> Envelope<Response> {
    tracing::debug!(client_id = %client.id(), frame = %frame, "Received from client");

    let request = match Request::decode(frame) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(client_id = %client.id(), error = %e, "Invalid client request");
            return Envelope::error("", &e);
        }
    };

    if !request.is_registration() {
        let err = RequestError::NotSupported(request.kind.clone());
        return Envelope::error(request.kind, &err);
    }

    match register(hub, client, &request.args).await {
        Ok(context) => Envelope::registered(request.kind, &context),
        Err(e) => {
            tracing::info!(client_id = %client.id(), error = %e, "Registration rejected");
            Envelope::error(request.kind, &e)
        }
    }
}

/// Validate registration arguments and record the context
///
/// An already registered client keeps its context and is not validated again.
async fn register<E: Event>(
    hub: &Hub<E>,
    client: &ClientHandle,
    args: &Value,
) -> Result<Arc<Value>, RequestError> {
    let registry = hub.registry();

    if let Some(context) = registry.registration(client.id()).await {
        return Ok(context);
    }

    let context = hub
        .options()
        .validator
        .validate(args)
        .map_err(|e| RequestError::Unregistered(e.to_string()))?;

    registry
        .mark_registered(client.id(), context)
        .await
        .ok_or_else(|| RequestError::Internal("client is no longer connected".to_string()))
}

#[derive(Debug, Error)]
enum WriteError {
    #[error("write deadline exceeded")]
    Timeout,

    #[error(transparent)]
    Socket(#[from] axum::Error),
}

async fn write_frame<S>(sender: &mut S, message: Message, wait: Duration) -> Result<(), WriteError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    time::timeout(wait, sender.send(message))
        .await
        .map_err(|_| WriteError::Timeout)??;
    Ok(())
}

/// Drain the outbound queue onto the socket, pinging every `ping_period`
async fn write_loop<S>(
    client: Arc<ClientHandle>,
    mut sender: S,
    mut outbound: mpsc::Receiver<String>,
    transport: TransportOptions,
) where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let mut ping = time::interval_at(Instant::now() + transport.ping_period, transport.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(text) = message else {
                    // Queue closed by the registry
                    let _ = write_frame(&mut sender, Message::Close(None), transport.write_wait).await;
                    break;
                };

                if let Err(e) = write_frame(&mut sender, Message::Text(text), transport.write_wait).await {
                    tracing::debug!(client_id = %client.id(), error = %e, "WebSocket send failed, closing connection");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = write_frame(&mut sender, Message::Ping(Vec::new()), transport.write_wait).await {
                    tracing::debug!(client_id = %client.id(), error = %e, "WebSocket ping failed, closing connection");
                    break;
                }
            }
        }
    }

    client.force_close();
}
