//! Device event controller handlers for the registry actor.
//!
//! Key notification chains need the actor's own sender and live in the
//! actor; everything else about device listeners is handled here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use super::events::deliver_events;
use crate::error::RegistryError;
use crate::registry::device::notify_mouse_listeners;
use crate::registry::{
    DeviceEvent, KeySet, KeySynthType, ListenerMode, ListenerTransport, ObjectRef, Registry,
};

/// Handles `RegisterKeystrokeListener`. Returns `false` if a key grab failed.
pub fn on_register_keystroke_listener(
    registry: &mut Registry,
    address: ObjectRef,
    keys: KeySet,
    mask: u32,
    types: u32,
    mode: ListenerMode,
) -> bool {
    registry.register_keystroke_listener(address, keys, mask, types, mode)
}

/// Handles `DeregisterKeystrokeListener`.
pub fn on_deregister_keystroke_listener(
    registry: &mut Registry,
    address: &ObjectRef,
    keys: &KeySet,
    mask: u32,
    types: u32,
) {
    let removed = registry.deregister_keystroke_listener(address, keys, mask, types);
    if removed == 0 {
        tracing::debug!(listener = %address, "dec: no keystroke listener to deregister");
    }
}

/// Handles `RegisterDeviceListener`.
pub fn on_register_device_listener(registry: &mut Registry, address: ObjectRef, types: u32) -> bool {
    registry.register_device_listener(address, types)
}

/// Handles `DeregisterDeviceListener`.
pub fn on_deregister_device_listener(registry: &mut Registry, address: &ObjectRef, types: u32) {
    registry.deregister_device_listener(address, types);
}

/// Notifies every interested mouse listener of a button event.
///
/// All listeners are called; the reply is whether any consumed the event.
pub fn on_notify_mouse_listeners(
    registry: &Registry,
    transport: &Arc<dyn ListenerTransport>,
    event: DeviceEvent,
    respond_to: Option<oneshot::Sender<bool>>,
) {
    let targets = registry.mouse_targets(&event);
    if targets.is_empty() {
        if let Some(respond_to) = respond_to {
            let _ = respond_to.send(false);
        }
        return;
    }

    let transport = Arc::clone(transport);
    tokio::spawn(async move {
        let consumed = notify_mouse_listeners(targets, event, transport.as_ref()).await;
        if let Some(respond_to) = respond_to
            && respond_to.send(consumed).is_err()
        {
            tracing::trace!("dec: caller stopped waiting for mouse notification");
        }
    });
}

/// Handles `GenerateKeyboardEvent`.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidArguments`] for a negative keycode.
pub fn on_generate_keyboard_event(
    registry: &Registry,
    keycode: i32,
    keystring: &str,
    synth: KeySynthType,
) -> Result<(), RegistryError> {
    registry.generate_keyboard_event(keycode, keystring, synth)
}

/// Handles `GenerateMouseEvent`.
pub fn on_generate_mouse_event(registry: &Registry, x: i32, y: i32, event_name: &str) {
    registry.generate_mouse_event(x, y, event_name);
}

/// Samples the pointer once, delivers what changed, and returns the delay
/// to the next sample (`None` stops the ticker).
pub fn on_mouse_poll_tick(
    registry: &mut Registry,
    transport: &Arc<dyn ListenerTransport>,
) -> Option<Duration> {
    let outcome = registry.poll_mouse();

    let deliveries = outcome.events.iter().flat_map(|event| registry.dispatch(event)).collect();
    deliver_events(transport, deliveries);

    for event in outcome.device_events {
        on_notify_mouse_listeners(registry, transport, event, None);
    }

    if outcome.next.is_none() {
        tracing::debug!("poll: no more demand, stopping");
    }
    outcome.next
}
