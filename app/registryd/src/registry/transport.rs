//! Seam through which the registry reaches remote listeners.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;

use super::types::{AccessibleEvent, DeviceEvent, ObjectRef};

/// Failure of a remote delivery. Never fatal; deliveries that fail count as
/// "not consumed".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
pub enum TransportError {
    /// The peer left the bus.
    #[error("Peer is gone: {0}")]
    PeerGone(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote call failed: {0}")]
    Call(String),
}

/// Outbound calls to listeners and applications.
///
/// Returned futures own everything they need so callers can spawn them
/// without holding registry state across the await.
pub trait ListenerTransport: Send + Sync {
    /// Calls `NotifyEvent` on a device listener and returns whether it
    /// consumed the event.
    fn notify_device_event(
        &self,
        listener: &ObjectRef,
        event: &DeviceEvent,
    ) -> BoxFuture<'static, Result<bool, TransportError>>;

    /// Delivers an accessibility event to one subscriber.
    fn deliver_event(
        &self,
        subscriber: &str,
        event: &AccessibleEvent,
    ) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Sets the `Id` property of a newly embedded application.
    fn assign_application_id(
        &self,
        application: &ObjectRef,
        id: i32,
    ) -> BoxFuture<'static, Result<(), TransportError>>;
}
