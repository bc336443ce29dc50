//! [`ListenerTransport`] over a zbus connection.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use zbus::Connection;
use zvariant::Value;

use super::wire::{WireDeviceEvent, object_path, signal_body};
use crate::constants::{
    APPLICATION_INTERFACE, DEVICE_LISTENER_INTERFACE, EVENT_INTERFACE_PREFIX,
    PROPERTIES_INTERFACE,
};
use crate::registry::{AccessibleEvent, DeviceEvent, ListenerTransport, ObjectRef, TransportError};

/// Errors meaning the peer has left the bus.
const PEER_GONE_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
    "org.freedesktop.DBus.Error.NoReply",
];

/// Reaches listeners and applications through the accessibility bus.
#[derive(Debug, Clone)]
pub struct ZbusTransport {
    connection: Connection,
    timeout: Duration,
}

impl ZbusTransport {
    /// `timeout` bounds every listener call.
    #[must_use]
    pub const fn new(connection: Connection, timeout: Duration) -> Self {
        Self { connection, timeout }
    }
}

fn transport_error(peer: &str, err: zbus::Error) -> TransportError {
    match &err {
        zbus::Error::MethodError(name, ..) if PEER_GONE_ERRORS.contains(&name.as_str()) => {
            TransportError::PeerGone(peer.to_string())
        }
        _ => TransportError::Call(err.to_string()),
    }
}

impl ListenerTransport for ZbusTransport {
    fn notify_device_event(
        &self,
        listener: &ObjectRef,
        event: &DeviceEvent,
    ) -> BoxFuture<'static, Result<bool, TransportError>> {
        let connection = self.connection.clone();
        let timeout = self.timeout;
        let listener = listener.clone();
        let body = WireDeviceEvent::from(event);

        async move {
            let call = connection.call_method(
                Some(listener.name.as_str()),
                object_path(&listener.path),
                Some(DEVICE_LISTENER_INTERFACE),
                "NotifyEvent",
                &body,
            );
            let reply = tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
                .map_err(|err| transport_error(&listener.name, err))?;

            reply
                .body()
                .deserialize::<bool>()
                .map_err(|err| TransportError::Call(err.to_string()))
        }
        .boxed()
    }

    fn deliver_event(
        &self,
        subscriber: &str,
        event: &AccessibleEvent,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        let connection = self.connection.clone();
        let subscriber = subscriber.to_string();
        let interface = format!("{EVENT_INTERFACE_PREFIX}{}", event.event_type.category);
        let member = event.event_type.member().to_string();
        let path = object_path(&event.source.path);
        let body = signal_body(event);

        async move {
            connection
                .emit_signal(
                    Some(subscriber.as_str()),
                    path,
                    interface.as_str(),
                    member.as_str(),
                    &body,
                )
                .await
                .map_err(|err| transport_error(&subscriber, err))
        }
        .boxed()
    }

    fn assign_application_id(
        &self,
        application: &ObjectRef,
        id: i32,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        let connection = self.connection.clone();
        let timeout = self.timeout;
        let application = application.clone();

        async move {
            let body = (APPLICATION_INTERFACE, "Id", Value::from(id));
            let call = connection.call_method(
                Some(application.name.as_str()),
                object_path(&application.path),
                Some(PROPERTIES_INTERFACE),
                "Set",
                &body,
            );
            tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
                .map(|_| ())
                .map_err(|err| transport_error(&application.name, err))
        }
        .boxed()
    }
}
