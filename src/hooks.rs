//! Pluggable Hooks
//!
//! Capabilities supplied by the embedding application: a validator for
//! registration arguments and a per-client event filter.
//!
//! Both have blanket implementations for closures, so the common case is:
//!
//! ```rust
//! use serde_json::Value;
//! use wsevent::{BoxError, Options};
//!
//! let options = Options::<Value>::default()
//!     .with_validator(|args: &Value| -> Result<Value, BoxError> {
//!         match args.get("room") {
//!             Some(room) => Ok(room.clone()),
//!             None => Err("missing room".into()),
//!         }
//!     })
//!     .with_filter(|room: &Value, event: &Value| event.get("room") == Some(room));
//! ```

use serde_json::Value;

/// Boxed error returned by hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Validates the `args` of a registration request
///
/// On success the returned value becomes the client's registration context,
/// which is later handed to the [`EventFilter`]. The error message is sent
/// back to the client in an `unregistered` error envelope.
pub trait RegistrationValidator: Send + Sync {
    fn validate(&self, args: &Value) -> Result<Value, BoxError>;
}

impl<F> RegistrationValidator for F
where
    F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync,
{
    fn validate(&self, args: &Value) -> Result<Value, BoxError> {
        self(args)
    }
}

/// Decides whether an event should be delivered to a registered client
pub trait EventFilter<E>: Send + Sync {
    fn accept(&self, context: &Value, event: &E) -> bool;
}

impl<E, F> EventFilter<E> for F
where
    F: Fn(&Value, &E) -> bool + Send + Sync,
{
    fn accept(&self, context: &Value, event: &E) -> bool {
        self(context, event)
    }
}

/// Accepts every registration with an empty (`null`) context
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RegistrationValidator for AcceptAll {
    fn validate(&self, _args: &Value) -> Result<Value, BoxError> {
        Ok(Value::Null)
    }
}

impl<E> EventFilter<E> for AcceptAll {
    fn accept(&self, _context: &Value, _event: &E) -> bool {
        true
    }
}
