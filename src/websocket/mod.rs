//! WebSocket Event Hub
//!
//! Broadcasts published events to registered WebSocket clients.
//!
//! ## Architecture
//!
//! - **Hub**: owns the registry, the publish queue and the broadcast workers
//! - **Registry**: authoritative set of connected clients and their registration
//! - **Dispatcher**: worker pool doing filtered, non-blocking fan-out
//! - **Client**: per-connection state, outbound queue and close signal
//! - **Handler**: WebSocket upgrade, read loop, write loop, registration timer
//! - **Messages**: wire envelope and request format
//!
//! ## Protocol
//!
//! Clients register once after connecting:
//!
//! ```text
//! → {"type": "reg", "args": {"room": "lobby"}}
//! ← {"t": "reg", "d": {"status": "ok", "data": {"args": {"room": "lobby"}}}, "time": 1700000000}
//! ← {"t": "event", "d": {"room": "lobby", "msg": "hi"}, "time": 1700000001}
//! ```
//!
//! Connections that do not register within the configured timeout are closed.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8080/wsevents');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'reg', args: null}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log('Received:', msg);
//! };
//! ```

mod client;
mod dispatcher;
mod error;
mod handler;
mod hub;
mod messages;
mod registry;

pub use client::{ClientHandle, ClientId, ClientState, DeliveryError};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{ErrorCode, RequestError};
pub use handler::websocket_handler;
pub use hub::{Event, Hub};
pub use messages::{
    normalize_frame, Envelope, Request, Response, Status, ARGS_KEY, EVENT_KIND, REGISTER_TYPE,
};
pub use registry::{Member, Registry};
