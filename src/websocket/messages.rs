//! WebSocket Message Types
//!
//! Defines the wire envelope for server → client messages and the request
//! format for client → server messages.
//!
//! Every server message is wrapped as `{"t": kind, "d": payload, "time": unix_secs}`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ErrorCode, RequestError};

/// Envelope kind used for broadcast events
pub const EVENT_KIND: &str = "event";

/// Request type that registers a client
pub const REGISTER_TYPE: &str = "reg";

/// Key under which the stored registration context is echoed back
pub const ARGS_KEY: &str = "args";

/// Wire wrapper around every message sent to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Message kind ("event" or the request type being answered)
    #[serde(rename = "t")]
    pub kind: String,
    /// Payload
    #[serde(rename = "d")]
    pub data: T,
    /// Unix timestamp in seconds
    pub time: i64,
}

impl<T: Serialize> Envelope<T> {
    /// Wrap a payload, stamped with the current time
    pub fn new(kind: impl Into<String>, data: T) -> Self {
        Self {
            kind: kind.into(),
            data,
            time: Utc::now().timestamp(),
        }
    }

    /// Serialize to the JSON text sent over the socket
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<'a, E: Serialize> Envelope<&'a E> {
    /// Broadcast envelope for a published event
    pub fn event(event: &'a E) -> Self {
        Self::new(EVENT_KIND, event)
    }
}

impl Envelope<Response> {
    /// OK response carrying data
    pub fn ok(kind: impl Into<String>, data: Value) -> Self {
        Self::new(kind, Response::ok(Some(data)))
    }

    /// OK response without data
    pub fn ok_empty(kind: impl Into<String>) -> Self {
        Self::new(kind, Response::ok(None))
    }

    /// Successful registration, echoing the stored context
    pub fn registered(kind: impl Into<String>, args: &Value) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(ARGS_KEY.to_string(), args.clone());
        Self::ok(kind, Value::Object(data))
    }

    /// Error response for a failed request
    pub fn error(kind: impl Into<String>, err: &RequestError) -> Self {
        Self::new(kind, Response::error(err.code(), err.to_string()))
    }
}

/// Response status marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

/// Payload of a direct response to a client request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            status: Status::Ok,
            code: None,
            msg: None,
            data,
        }
    }

    pub fn error(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            code: Some(code),
            msg: Some(msg.into()),
            data: None,
        }
    }
}

/// Request sent from client to server
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Request type, only "reg" is supported
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Opaque arguments handed to the registration validator
    #[serde(default)]
    pub args: Value,
}

impl Request {
    /// Decode a raw inbound frame
    pub fn decode(frame: &str) -> Result<Self, RequestError> {
        let normalized = normalize_frame(frame);
        Ok(serde_json::from_str(&normalized)?)
    }

    /// Whether this is a registration request
    pub fn is_registration(&self) -> bool {
        self.kind == REGISTER_TYPE
    }
}

/// Fold newlines into spaces and trim surrounding whitespace
pub fn normalize_frame(frame: &str) -> String {
    frame.replace('\n', " ").trim().to_string()
}
