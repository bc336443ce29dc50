//! Listener registry: event subscriptions, key listeners and mouse listeners.
//!
//! Event subscriptions are kept in registration order. Key and mouse
//! listeners are prepended, so iteration visits the most recently registered
//! listener first; device event delivery relies on that order.

use serde::{Deserialize, Serialize};

use super::event_type::EventType;
use super::types::{
    DeviceEvent, KeyDefinition, KeySet, ListenerMode, ObjectRef, keymask, type_mask_contains,
};

/// Identifier assigned to every stored listener.
pub type ListenerId = u64;

// ============================================================================
// Entries
// ============================================================================

/// An event subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListener {
    pub id: ListenerId,
    /// Bus name of the subscriber.
    pub subscriber: String,
    pub filter: EventType,
    /// Extra properties the subscriber wants attached to delivered events.
    pub properties: Vec<String>,
}

/// A keystroke listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyListener {
    pub id: ListenerId,
    /// Subscriber bus name and the path of its listener object.
    pub address: ObjectRef,
    pub keys: KeySet,
    pub mask: u32,
    pub types: u32,
    pub mode: ListenerMode,
}

impl KeyListener {
    /// Whether `event` should be offered to this listener in a dispatch
    /// whose scope is `is_system_global`.
    #[must_use]
    pub fn matches(&self, event: &DeviceEvent, is_system_global: bool) -> bool {
        (event.modifiers & keymask::MATCH_BITS) == (self.mask & keymask::MATCH_BITS)
            && key_set_contains(&self.keys, event)
            && type_mask_contains(self.types, event.kind)
            && self.mode.global == is_system_global
    }
}

/// A mouse (device) listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseListener {
    pub id: ListenerId,
    pub address: ObjectRef,
    pub types: u32,
}

impl MouseListener {
    #[must_use]
    pub const fn matches(&self, event: &DeviceEvent) -> bool {
        type_mask_contains(self.types, event.kind)
    }
}

/// Whether a key set selects the key of `event`.
///
/// An empty set selects every key. Otherwise an entry matches by keysym,
/// else by hardware keycode, else by the literal text the key produced.
#[must_use]
pub fn key_set_contains(keys: &[KeyDefinition], event: &DeviceEvent) -> bool {
    keys.is_empty()
        || keys.iter().any(|key| {
            key.keysym == event.id
                || u32::try_from(key.keycode).is_ok_and(|code| code == event.hw_code)
                || (!event.event_string.is_empty() && key.keystring == event.event_string)
        })
}

/// One delivery of an accessibility event: a subscriber and the union of
/// the properties it asked for across its matching filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDelivery {
    pub subscriber: String,
    pub properties: Vec<String>,
}

// ============================================================================
// Registry
// ============================================================================

/// Owns every listener list.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: ListenerId,
    events: Vec<EventListener>,
    keys: Vec<KeyListener>,
    mice: Vec<MouseListener>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    const fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        self.next_id
    }

    // ========================================================================
    // Event subscriptions
    // ========================================================================

    /// Stores a subscription. Duplicates are kept as separate entries.
    pub fn add_event_listener(
        &mut self,
        subscriber: &str,
        filter: EventType,
        properties: Vec<String>,
    ) -> ListenerId {
        let id = self.allocate_id();
        self.events.push(EventListener {
            id,
            subscriber: subscriber.to_string(),
            filter,
            properties,
        });
        id
    }

    /// Removes every subscription of `subscriber` covered by `filter`.
    pub fn remove_event_listeners(
        &mut self,
        subscriber: &str,
        filter: &EventType,
    ) -> Vec<EventListener> {
        let (removed, kept) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|entry| entry.subscriber == subscriber && filter.covers(&entry.filter));
        self.events = kept;
        removed
    }

    #[must_use]
    pub fn event_listeners(&self) -> &[EventListener] { &self.events }

    /// Subscribers whose filters select `event_type`, each listed once, in
    /// order of their first matching subscription.
    #[must_use]
    pub fn event_deliveries(&self, event_type: &EventType) -> Vec<EventDelivery> {
        let mut deliveries: Vec<EventDelivery> = Vec::new();

        for entry in self.events.iter().filter(|entry| entry.filter.matches(event_type)) {
            let index = if let Some(index) =
                deliveries.iter().position(|d| d.subscriber == entry.subscriber)
            {
                index
            } else {
                deliveries.push(EventDelivery {
                    subscriber: entry.subscriber.clone(),
                    properties: Vec::new(),
                });
                deliveries.len() - 1
            };
            let delivery = &mut deliveries[index];
            for property in &entry.properties {
                if !delivery.properties.contains(property) {
                    delivery.properties.push(property.clone());
                }
            }
        }

        deliveries
    }

    /// Whether any stored subscription needs pointer polling.
    #[must_use]
    pub fn wants_mouse_events(&self) -> bool {
        self.events.iter().any(|entry| entry.filter.needs_mouse_poll())
    }

    // ========================================================================
    // Key listeners
    // ========================================================================

    /// Prepends a key listener.
    pub fn add_key_listener(
        &mut self,
        address: ObjectRef,
        keys: KeySet,
        mask: u32,
        types: u32,
        mode: ListenerMode,
    ) -> ListenerId {
        let id = self.allocate_id();
        self.keys.insert(0, KeyListener { id, address, keys, mask, types, mode });
        id
    }

    #[must_use]
    pub fn key_listener(&self, id: ListenerId) -> Option<&KeyListener> {
        self.keys.iter().find(|listener| listener.id == id)
    }

    #[must_use]
    pub fn key_listeners(&self) -> &[KeyListener] { &self.keys }

    /// Removes every key listener registered at `address`.
    pub fn remove_key_listeners(&mut self, address: &ObjectRef) -> Vec<KeyListener> {
        self.drain_keys(|listener| &listener.address == address)
    }

    /// Removes every key listener owned by the bus name `owner`.
    pub fn remove_key_listeners_of(&mut self, owner: &str) -> Vec<KeyListener> {
        self.drain_keys(|listener| listener.address.name == owner)
    }

    fn drain_keys(&mut self, pred: impl Fn(&KeyListener) -> bool) -> Vec<KeyListener> {
        let (removed, kept) = std::mem::take(&mut self.keys).into_iter().partition(|l| pred(l));
        self.keys = kept;
        removed
    }

    // ========================================================================
    // Mouse listeners
    // ========================================================================

    /// Prepends a mouse listener.
    pub fn add_mouse_listener(&mut self, address: ObjectRef, types: u32) -> ListenerId {
        let id = self.allocate_id();
        self.mice.insert(0, MouseListener { id, address, types });
        id
    }

    #[must_use]
    pub fn mouse_listeners(&self) -> &[MouseListener] { &self.mice }

    #[must_use]
    pub fn has_mouse_listeners(&self) -> bool { !self.mice.is_empty() }

    /// Removes every mouse listener registered at `address`.
    pub fn remove_mouse_listeners(&mut self, address: &ObjectRef) -> Vec<MouseListener> {
        self.drain_mice(|listener| &listener.address == address)
    }

    /// Removes every mouse listener owned by the bus name `owner`.
    pub fn remove_mouse_listeners_of(&mut self, owner: &str) -> Vec<MouseListener> {
        self.drain_mice(|listener| listener.address.name == owner)
    }

    fn drain_mice(&mut self, pred: impl Fn(&MouseListener) -> bool) -> Vec<MouseListener> {
        let (removed, kept) = std::mem::take(&mut self.mice).into_iter().partition(|l| pred(l));
        self.mice = kept;
        removed
    }

    /// Whether `owner` still holds any listener of any kind.
    #[must_use]
    pub fn has_listeners_of(&self, owner: &str) -> bool {
        self.events.iter().any(|e| e.subscriber == owner)
            || self.keys.iter().any(|k| k.address.name == owner)
            || self.mice.iter().any(|m| m.address.name == owner)
    }
}
