//! # wsevent
//!
//! WebSocket event hub - broadcast published events to registered WebSocket
//! clients, filtered per client.
//!
//! ## Features
//!
//! - **Registration**: clients register once with arguments checked by a
//!   pluggable validator; unregistered connections are closed after a timeout
//! - **Filtered fan-out**: a pluggable filter decides, per client, which
//!   events it receives
//! - **Backpressure**: publishing waits on a bounded queue; slow clients with a
//!   full outbound queue are evicted instead of stalling the broadcast
//!
//! ## Modules
//!
//! - [`websocket`]: hub, registry, dispatcher and connection handling
//! - [`hooks`]: validator and filter capabilities
//! - [`config`]: runtime options and file configuration
//! - [`api`]: axum router and server
//! - [`init`]: process-wide hub with free functions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::{json, Value};
//! use wsevent::{BoxError, Hub, Options};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = Options::default()
//!         .with_validator(|args: &Value| -> Result<Value, BoxError> {
//!             args.get("room").cloned().ok_or_else(|| "missing room".into())
//!         })
//!         .with_filter(|room: &Value, event: &Value| event.get("room") == Some(room));
//!
//!     let hub: Hub = Hub::new(options);
//!     let addr = hub.bind("/wsevents", "0.0.0.0:8081").await?;
//!     println!("listening on {}", addr);
//!
//!     hub.publish(json!({"room": "lobby", "msg": "hello"})).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod hooks;
pub mod init;
pub mod websocket;

pub use config::{Config, ConfigError, LoggingConfig, Options, TransportOptions};

pub use error::{HubError, HubResult};

pub use hooks::{AcceptAll, BoxError, EventFilter, RegistrationValidator};

pub use init::{init, init_with_port, publish_event};

pub use websocket::{
    websocket_handler, ClientState, Envelope, ErrorCode, Event, Hub, Registry, RequestError,
};
