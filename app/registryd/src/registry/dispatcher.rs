//! Event subscriptions and event dispatch.

use super::Registry;
use super::event_type::{EventType, normalize};
use super::notify::RegistryNotification;
use super::types::AccessibleEvent;
use crate::error::RegistryError;

impl Registry {
    /// Subscribes `subscriber` to events selected by `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEventType`] if `event_type` does not
    /// parse; nothing is stored in that case.
    pub fn register_event(
        &mut self,
        subscriber: &str,
        event_type: &str,
        properties: Vec<String>,
    ) -> Result<(), RegistryError> {
        let filter = EventType::parse(event_type)?;
        let event = normalize(event_type);

        tracing::debug!(subscriber, %filter, "registry: event listener registered");
        self.listeners.add_event_listener(subscriber, filter, properties.clone());
        self.notify(RegistryNotification::EventListenerRegistered {
            subscriber: subscriber.to_string(),
            event,
            properties,
        });
        self.update_poll_demand();
        Ok(())
    }

    /// Removes every subscription of `subscriber` covered by `event_type`.
    ///
    /// Observers are told once per call, whether or not anything matched.
    /// Returns the number of removed subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEventType`] if `event_type` does not
    /// parse.
    pub fn deregister_event(
        &mut self,
        subscriber: &str,
        event_type: &str,
    ) -> Result<usize, RegistryError> {
        let filter = EventType::parse_filter(event_type)?;
        let removed = self.listeners.remove_event_listeners(subscriber, &filter);

        tracing::debug!(subscriber, %filter, count = removed.len(), "registry: event listeners deregistered");
        self.notify(RegistryNotification::EventListenerDeregistered {
            subscriber: subscriber.to_string(),
            event: normalize(event_type),
        });
        self.update_poll_demand();
        Ok(removed.len())
    }

    /// Every subscription as `(subscriber, "Category:Name:Detail")`.
    #[must_use]
    pub fn registered_events(&self) -> Vec<(String, String)> {
        self.listeners
            .event_listeners()
            .iter()
            .map(|entry| (entry.subscriber.clone(), entry.filter.to_registered_string()))
            .collect()
    }

    /// Whether `event` goes out to subscribers at all. Events raised by the
    /// registry's own objects always do; application events only while
    /// relaying is enabled.
    #[must_use]
    pub fn should_relay(&self, event: &AccessibleEvent) -> bool {
        self.relay_events || event.source.name == self.bus_name
    }

    /// Resolves the deliveries of `event`: one per interested subscriber,
    /// carrying only the properties that subscriber asked for.
    #[must_use]
    pub fn dispatch(&self, event: &AccessibleEvent) -> Vec<(String, AccessibleEvent)> {
        self.listeners
            .event_deliveries(&event.event_type)
            .into_iter()
            .map(|delivery| {
                let restricted = event.restricted_to(&delivery.properties);
                (delivery.subscriber, restricted)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::registry::types::{ObjectRef, PropertyValue};
    use crate::registry::{NullPlatform, RegistrySettings};

    fn event(interface: &str, member: &str, minor: &str) -> AccessibleEvent {
        AccessibleEvent::new(
            EventType::from_signal(interface, member, minor),
            ObjectRef::new(":1.30", "/org/a11y/atspi/accessible/12"),
        )
    }

    #[test]
    fn test_prefix_deregistration_removes_specific_entry() {
        let mut registry = Registry::headless();
        registry.register_event(":1.5", "object:state-changed:focused", Vec::new()).unwrap();

        let removed = registry.deregister_event(":1.5", "object:state-changed").unwrap();

        assert_eq!(removed, 1);
        assert!(registry.registered_events().is_empty());
    }

    #[test]
    fn test_register_rejects_malformed_type_without_state_change() {
        let mut registry = Registry::headless();
        assert!(matches!(
            registry.register_event(":1.5", "", Vec::new()),
            Err(RegistryError::InvalidEventType(_))
        ));
        assert!(registry.register_event(":1.5", "object state", Vec::new()).is_err());
        assert!(registry.registered_events().is_empty());
    }

    #[test]
    fn test_registered_events_report_three_slots() {
        let mut registry = Registry::headless();
        registry.register_event(":1.5", "object:state-changed", Vec::new()).unwrap();
        registry.register_event(":1.6", "window:activate:x", Vec::new()).unwrap();

        assert_eq!(
            registry.registered_events(),
            vec![
                (":1.5".to_string(), "Object:StateChanged:".to_string()),
                (":1.6".to_string(), "Window:Activate:X".to_string()),
            ]
        );
    }

    #[test]
    fn test_notifications_carry_normalized_names() {
        let mut registry = Registry::headless();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.observers().subscribe(move |n: &RegistryNotification| sink.lock().push(n.clone()));

        registry
            .register_event(":1.5", "object:state-changed", vec!["accessible-name".into()])
            .unwrap();
        registry.deregister_event(":1.5", "window").unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                RegistryNotification::EventListenerRegistered {
                    subscriber: ":1.5".into(),
                    event: "Object:StateChanged".into(),
                    properties: vec!["accessible-name".into()],
                },
                RegistryNotification::EventListenerDeregistered {
                    subscriber: ":1.5".into(),
                    event: "Window".into(),
                },
            ]
        );
    }

    #[test]
    fn test_dispatch_delivers_once_per_subscriber() {
        let mut registry = Registry::headless();
        registry.register_event(":1.5", "object", Vec::new()).unwrap();
        registry.register_event(":1.5", "object:children-changed", Vec::new()).unwrap();
        registry.register_event(":1.6", "object:children-changed:add", Vec::new()).unwrap();
        registry.register_event(":1.7", "object:children-changed:remove", Vec::new()).unwrap();

        let deliveries =
            registry.dispatch(&event("org.a11y.atspi.Event.Object", "ChildrenChanged", "add/system"));

        let subscribers: Vec<_> = deliveries.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(subscribers, vec![":1.5", ":1.6"]);
    }

    #[test]
    fn test_dispatch_restricts_properties_per_subscriber() {
        let mut registry = Registry::headless();
        registry
            .register_event(":1.5", "object:state-changed", vec!["accessible-name".into()])
            .unwrap();
        registry.register_event(":1.6", "object:state-changed", Vec::new()).unwrap();

        let event = event("org.a11y.atspi.Event.Object", "StateChanged", "focused")
            .with_property("accessible-name", PropertyValue::String("OK".into()))
            .with_property("accessible-role", PropertyValue::UInt(43));
        let deliveries = registry.dispatch(&event);

        assert_eq!(deliveries[0].1.properties.len(), 1);
        assert!(deliveries[1].1.properties.is_empty());
    }

    #[test]
    fn test_mouse_subscriptions_arm_and_disarm_polling() {
        let mut registry = Registry::headless();

        registry.register_event(":1.5", "mouse:abs", Vec::new()).unwrap();
        assert!(registry.poller().has_demand());
        assert!(registry.take_poll_start());
        assert!(!registry.take_poll_start());

        registry.deregister_event(":1.5", "mouse").unwrap();
        assert!(!registry.poller().has_demand());
    }

    #[test]
    fn test_deregister_accepts_empty_filter() {
        let mut registry = Registry::headless();
        registry.register_event(":1.5", "object", Vec::new()).unwrap();
        registry.register_event(":1.5", "window", Vec::new()).unwrap();

        assert_eq!(registry.deregister_event(":1.5", "").unwrap(), 2);
    }

    #[test]
    fn test_application_events_are_relayed_only_when_enabled() {
        let mut registry = Registry::headless();
        registry.set_bus_name(":1.1");
        let from_app = event("org.a11y.atspi.Event.Object", "StateChanged", "focused");
        let from_registry = AccessibleEvent::new(
            EventType::from_signal("org.a11y.atspi.Event.Object", "ChildrenChanged", "add"),
            ObjectRef::new(":1.1", "/org/a11y/atspi/accessible/root"),
        );

        assert!(!registry.should_relay(&from_app));
        assert!(registry.should_relay(&from_registry));

        let settings = RegistrySettings { relay_events: true, ..RegistrySettings::default() };
        let relaying = Registry::new(settings, Arc::new(NullPlatform));
        assert!(relaying.should_relay(&from_app));
    }
}
