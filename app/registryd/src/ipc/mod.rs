//! Control socket for inspecting a running daemon.
//!
//! The daemon listens on a Unix domain socket; `registryd status`, `apps`
//! and the other inspection commands connect, write one JSON query line
//! and read one JSON response line.
//!
//! # Query Format
//!
//! ```json
//! {"type": "ping"}
//! {"type": "applications"}
//! {"type": "keystrokeListeners"}
//! ```
//!
//! # Response Format
//!
//! ```json
//! {"data": [...]}
//! {"error": "Registry is not running"}
//! ```

mod client;
mod server;

use serde::{Deserialize, Serialize};

pub use self::client::{IpcError, is_daemon_running, send_query};
pub use self::server::{IpcServer, handle_registry_query};

/// Timeout for socket reads and writes in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Queries the inspection commands send to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IpcQuery {
    /// Check that the daemon is running.
    Ping,
    /// Registry counters.
    Status,
    /// Embedded applications in child order.
    Applications,
    /// Event subscriptions.
    EventListeners,
    /// `(subscriber, event type)` pairs as reported on the bus.
    RegisteredEvents,
    KeystrokeListeners,
    DeviceListeners,
    /// Active key grabs.
    GrabMasks,
}

/// Response from the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpcResponse {
    Success { data: serde_json::Value },
    Error { error: String },
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(data: impl Serialize) -> Self {
        Self::Success {
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self { Self::Error { error: message.into() } }
}
