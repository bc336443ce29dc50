//! Outgoing bus signals.
//!
//! The registry announces its state changes through [`Observers`]; the
//! callbacks run inside the actor, so they only forward a copy into a
//! channel. [`run_emitter`] turns each notification into the matching
//! signal.
//!
//! [`Observers`]: crate::registry::Observers

use std::collections::HashMap;

use eyeball::Subscriber;
use tokio::sync::mpsc;
use zbus::Connection;
use zvariant::Value;

use super::wire::{WireDeviceListener, WireKeystrokeListener, WireObjectRef, object_value};
use crate::constants::{
    ACCESSIBLE_INTERFACE, DEC_PATH, DEVICE_LISTENER_INTERFACE, EVENT_INTERFACE_PREFIX,
    PROPERTIES_INTERFACE, REGISTRY_BUS_NAME, REGISTRY_INTERFACE, REGISTRY_PATH, ROOT_PATH,
    SOCKET_INTERFACE,
};
use crate::registry::{ObjectRef, Registry, RegistryNotification};

/// Subscribes to the registry's notifications. Must be called before the
/// registry moves into the actor.
pub fn forward_notifications(registry: &Registry) -> mpsc::UnboundedReceiver<RegistryNotification> {
    let (tx, rx) = mpsc::unbounded_channel();
    registry.observers().subscribe(move |notification: &RegistryNotification| {
        let _ = tx.send(notification.clone());
    });
    rx
}

/// Emits a signal for every notification and every child count change
/// until both sources close.
pub async fn run_emitter(
    connection: Connection,
    mut notifications: mpsc::UnboundedReceiver<RegistryNotification>,
    mut child_count: Subscriber<usize>,
) {
    let mut counting = true;

    loop {
        tokio::select! {
            notification = notifications.recv() => {
                let Some(notification) = notification else { break };
                if let Err(err) = emit_notification(&connection, &notification).await {
                    tracing::warn!(error = %err, "bus: failed to emit notification signal");
                }
            }
            count = child_count.next(), if counting => {
                match count {
                    Some(count) => {
                        if let Err(err) = emit_child_count(&connection, count).await {
                            tracing::warn!(error = %err, "bus: failed to emit ChildCount change");
                        }
                    }
                    None => counting = false,
                }
            }
        }
    }

    tracing::debug!("bus: signal emitter stopped");
}

/// Announces the desktop root on the Socket interface.
///
/// # Errors
///
/// Returns an error if the signal cannot be sent.
pub async fn emit_available(connection: &Connection) -> zbus::Result<()> {
    let root = WireObjectRef::from_ref(&ObjectRef::new(REGISTRY_BUS_NAME, ROOT_PATH));
    connection
        .emit_signal(None::<&str>, ROOT_PATH, SOCKET_INTERFACE, "Available", &(root,))
        .await
}

async fn emit_notification(
    connection: &Connection,
    notification: &RegistryNotification,
) -> zbus::Result<()> {
    match notification {
        RegistryNotification::ChildAdded { index, child } => {
            emit_children_changed(connection, "add", *index, child).await
        }
        RegistryNotification::ChildRemoved { index, child } => {
            emit_children_changed(connection, "remove", *index, child).await
        }
        RegistryNotification::EventListenerRegistered { subscriber, event, properties } => {
            connection
                .emit_signal(
                    None::<&str>,
                    REGISTRY_PATH,
                    REGISTRY_INTERFACE,
                    "EventListenerRegistered",
                    &(subscriber, event, properties),
                )
                .await
        }
        RegistryNotification::EventListenerDeregistered { subscriber, event } => {
            connection
                .emit_signal(
                    None::<&str>,
                    REGISTRY_PATH,
                    REGISTRY_INTERFACE,
                    "EventListenerDeregistered",
                    &(subscriber, event),
                )
                .await
        }
        RegistryNotification::KeystrokeListenerRegistered(listener) => {
            let body = (WireKeystrokeListener::from(listener),);
            emit_listener_signal(connection, &listener.address.name, "KeystrokeListenerRegistered", &body)
                .await
        }
        RegistryNotification::KeystrokeListenerDeregistered(listener) => {
            let body = (WireKeystrokeListener::from(listener),);
            emit_listener_signal(
                connection,
                &listener.address.name,
                "KeystrokeListenerDeregistered",
                &body,
            )
            .await
        }
        RegistryNotification::DeviceListenerRegistered(listener) => {
            let body = (WireDeviceListener::from(listener),);
            emit_listener_signal(connection, &listener.address.name, "DeviceListenerRegistered", &body)
                .await
        }
        RegistryNotification::DeviceListenerDeregistered(listener) => {
            let body = (WireDeviceListener::from(listener),);
            emit_listener_signal(
                connection,
                &listener.address.name,
                "DeviceListenerDeregistered",
                &body,
            )
            .await
        }
    }
}

/// `ChildrenChanged` on the desktop root, broadcast.
async fn emit_children_changed(
    connection: &Connection,
    minor: &str,
    index: usize,
    child: &ObjectRef,
) -> zbus::Result<()> {
    let interface = format!("{EVENT_INTERFACE_PREFIX}Object");
    let body = (
        minor,
        i32::try_from(index).unwrap_or(i32::MAX),
        0_i32,
        object_value(child),
        HashMap::<String, Value<'_>>::new(),
    );

    connection
        .emit_signal(None::<&str>, ROOT_PATH, interface.as_str(), "ChildrenChanged", &body)
        .await
}

/// Listener lifecycle signals go to the listener's owner only.
async fn emit_listener_signal<B>(
    connection: &Connection,
    owner: &str,
    member: &str,
    body: &B,
) -> zbus::Result<()>
where
    B: serde::Serialize + zvariant::DynamicType,
{
    connection
        .emit_signal(Some(owner), DEC_PATH, DEVICE_LISTENER_INTERFACE, member, body)
        .await
}

async fn emit_child_count(connection: &Connection, count: usize) -> zbus::Result<()> {
    let mut changed = HashMap::new();
    changed.insert("ChildCount", Value::from(i32::try_from(count).unwrap_or(i32::MAX)));

    connection
        .emit_signal(
            None::<&str>,
            ROOT_PATH,
            PROPERTIES_INTERFACE,
            "PropertiesChanged",
            &(ACCESSIBLE_INTERFACE, changed, Vec::<String>::new()),
        )
        .await
}
