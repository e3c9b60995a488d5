//! Process-wide Hub
//!
//! A once-only hub for applications that prefer free functions over passing
//! a [`Hub`] handle around. Events are `serde_json::Value`.
//!
//! Calling [`publish_event`] before [`init`] / [`init_with_port`], or
//! initializing twice, returns an error instead of aborting the process.

use axum::Router;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;

use crate::config::Options;
use crate::error::{HubError, HubResult};
use crate::websocket::Hub;

static HUB: OnceLock<Hub<Value>> = OnceLock::new();

/// Create the process hub and return the router serving it on `path`
///
/// The caller merges the router into its own HTTP server.
pub fn init(path: &str, options: Options<Value>) -> HubResult<Router> {
    let hub = install(options)?;
    Ok(crate::api::build_router(hub, path))
}

/// Create the process hub and serve it on its own listener at `port`
///
/// The hub is only installed once the port is bound, so a failed bind can
/// be retried.
pub async fn init_with_port(
    path: &str,
    port: u16,
    options: Options<Value>,
) -> HubResult<SocketAddr> {
    if HUB.get().is_some() {
        return Err(HubError::AlreadyInitialized);
    }

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let hub = install(options)?;
    hub.serve_listener(path, listener)
}

/// Publish an event through the process hub
pub async fn publish_event(event: Value) -> HubResult<()> {
    hub().ok_or(HubError::NotInitialized)?.publish(event).await
}

/// The process hub, once initialized
pub fn hub() -> Option<&'static Hub<Value>> {
    HUB.get()
}

fn install(options: Options<Value>) -> HubResult<&'static Hub<Value>> {
    if HUB.get().is_some() {
        return Err(HubError::AlreadyInitialized);
    }

    HUB.set(Hub::new(options))
        .map_err(|_| HubError::AlreadyInitialized)?;

    HUB.get().ok_or(HubError::NotInitialized)
}
