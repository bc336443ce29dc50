//! Event subscription handlers for the registry actor.

use std::sync::Arc;

use crate::error::RegistryError;
use crate::registry::{AccessibleEvent, ListenerTransport, Registry};

/// Handles `RegisterEvent`.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidEventType`] for an unparsable event type.
pub fn on_register_event(
    registry: &mut Registry,
    subscriber: &str,
    event_type: &str,
    properties: Vec<String>,
) -> Result<(), RegistryError> {
    registry.register_event(subscriber, event_type, properties)
}

/// Handles `DeregisterEvent`.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidEventType`] for an unparsable event type.
pub fn on_deregister_event(
    registry: &mut Registry,
    subscriber: &str,
    event_type: &str,
) -> Result<usize, RegistryError> {
    registry.deregister_event(subscriber, event_type)
}

/// Delivers `event` to every subscriber whose filter matches it, unless it
/// comes from an application and relaying is off.
pub fn on_dispatch_event(
    registry: &Registry,
    transport: &Arc<dyn ListenerTransport>,
    event: &AccessibleEvent,
) {
    if !registry.should_relay(event) {
        tracing::trace!(event = %event.event_type, source = %event.source, "registry: application event not relayed");
        return;
    }

    let deliveries = registry.dispatch(event);
    if deliveries.is_empty() {
        tracing::trace!(event = %event.event_type, "registry: no subscribers for event");
        return;
    }
    deliver_events(transport, deliveries);
}

/// Spawns one delivery per `(subscriber, event)` pair.
pub fn deliver_events(
    transport: &Arc<dyn ListenerTransport>,
    deliveries: Vec<(String, AccessibleEvent)>,
) {
    for (subscriber, event) in deliveries {
        let call = transport.deliver_event(&subscriber, &event);
        tokio::spawn(async move {
            if let Err(err) = call.await {
                tracing::debug!(error = %err, subscriber, "registry: event delivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::transport::fake::RecordingTransport;
    use crate::registry::{EventType, NullPlatform, ObjectRef, RegistrySettings};

    fn relaying_registry() -> Registry {
        let settings = RegistrySettings { relay_events: true, ..RegistrySettings::default() };
        Registry::new(settings, Arc::new(NullPlatform))
    }

    #[tokio::test]
    async fn test_dispatch_reaches_matching_subscribers_only() {
        let mut registry = relaying_registry();
        let fake = RecordingTransport::new();
        let transport: Arc<dyn ListenerTransport> = fake.clone();
        on_register_event(&mut registry, ":1.7", "object:state-changed", Vec::new()).unwrap();
        on_register_event(&mut registry, ":1.8", "window:activate", Vec::new()).unwrap();

        let event = AccessibleEvent::new(
            EventType::from_signal("org.a11y.atspi.Event.Object", "StateChanged", "focused"),
            ObjectRef::new(":1.30", "/org/a11y/atspi/accessible/3"),
        );
        on_dispatch_event(&registry, &transport, &event);

        let delivered = fake.delivered.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, ":1.7");
    }

    #[tokio::test]
    async fn test_application_event_is_not_relayed_by_default() {
        let mut registry = Registry::headless();
        let fake = RecordingTransport::new();
        let transport: Arc<dyn ListenerTransport> = fake.clone();
        on_register_event(&mut registry, ":1.7", "object:state-changed", Vec::new()).unwrap();

        let event = AccessibleEvent::new(
            EventType::from_signal("org.a11y.atspi.Event.Object", "StateChanged", "focused"),
            ObjectRef::new(":1.30", "/org/a11y/atspi/accessible/3"),
        );
        on_dispatch_event(&registry, &transport, &event);

        assert!(fake.delivered.lock().is_empty());
    }

    #[test]
    fn test_invalid_event_type_is_rejected() {
        let mut registry = Registry::headless();
        let result = on_register_event(&mut registry, ":1.7", "", Vec::new());
        assert!(matches!(result, Err(RegistryError::InvalidEventType(_))));
        assert!(registry.registered_events().is_empty());
    }
}
