//! Message types for the registry actor.
//!
//! All communication with the registry actor happens through messages:
//! - `RegistryMessage` - requests and events sent to the actor
//! - `RegistryQuery` - requests for state snapshots (with response channel)
//! - `QueryResult` - responses from queries

use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::RegistryError;
use crate::registry::{
    AccessibleEvent, Application, DeviceEvent, Embedded, EventListener, GrabMask, KeyListener,
    KeySet, KeySynthType, ListenerMode, MouseListener, ObjectRef, RegistryStatus,
};

/// Identifier of an in-flight key notification chain.
pub type ChainId = u64;

// ============================================================================
// Registry Messages
// ============================================================================

/// Messages sent to the registry actor.
#[derive(Debug)]
pub enum RegistryMessage {
    // ════════════════════════════════════════════════════════════════════════
    // Applications (Socket interface, bus name watch)
    // ════════════════════════════════════════════════════════════════════════
    /// An application embeds its root accessible.
    Embed {
        application: ObjectRef,
        respond_to: oneshot::Sender<Embedded>,
    },

    /// An application removes its root accessible.
    Unembed { application: ObjectRef },

    /// A bus name lost its owner.
    NameVanished { name: String },

    /// The registry's own unique bus name is known.
    SetBusName { name: String },

    // ════════════════════════════════════════════════════════════════════════
    // Event subscriptions (Registry interface)
    // ════════════════════════════════════════════════════════════════════════
    RegisterEvent {
        subscriber: String,
        event_type: String,
        properties: Vec<String>,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    DeregisterEvent {
        subscriber: String,
        event_type: String,
        respond_to: oneshot::Sender<Result<usize, RegistryError>>,
    },

    /// An accessibility event to deliver to subscribers.
    DispatchEvent(AccessibleEvent),

    // ════════════════════════════════════════════════════════════════════════
    // Device events (DeviceEventController interface)
    // ════════════════════════════════════════════════════════════════════════
    RegisterKeystrokeListener {
        address: ObjectRef,
        keys: KeySet,
        mask: u32,
        types: u32,
        mode: ListenerMode,
        respond_to: oneshot::Sender<bool>,
    },

    DeregisterKeystrokeListener {
        address: ObjectRef,
        keys: KeySet,
        mask: u32,
        types: u32,
    },

    RegisterDeviceListener {
        address: ObjectRef,
        types: u32,
        respond_to: oneshot::Sender<bool>,
    },

    DeregisterDeviceListener { address: ObjectRef, types: u32 },

    /// A raw input event to deliver. Without `respond_to` nobody waits for
    /// the consumed flag.
    NotifyListeners {
        event: DeviceEvent,
        is_system_global: bool,
        respond_to: Option<oneshot::Sender<bool>>,
    },

    /// A listener of a key notification chain replied.
    ChainStepCompleted { chain: ChainId, consumed: bool },

    GenerateKeyboardEvent {
        keycode: i32,
        keystring: String,
        synth: KeySynthType,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    GenerateMouseEvent { x: i32, y: i32, event_name: String },

    /// Poll ticker fired. Answers with the delay to the next tick, or
    /// `None` to stop the ticker.
    MousePollTick { respond_to: oneshot::Sender<Option<Duration>> },

    // ════════════════════════════════════════════════════════════════════════
    // Queries
    // ════════════════════════════════════════════════════════════════════════
    Query {
        query: RegistryQuery,
        respond_to: oneshot::Sender<QueryResult>,
    },

    /// Stop the actor.
    Shutdown,
}

impl RegistryMessage {
    /// Name of the message, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Embed { .. } => "Embed",
            Self::Unembed { .. } => "Unembed",
            Self::NameVanished { .. } => "NameVanished",
            Self::SetBusName { .. } => "SetBusName",
            Self::RegisterEvent { .. } => "RegisterEvent",
            Self::DeregisterEvent { .. } => "DeregisterEvent",
            Self::DispatchEvent(_) => "DispatchEvent",
            Self::RegisterKeystrokeListener { .. } => "RegisterKeystrokeListener",
            Self::DeregisterKeystrokeListener { .. } => "DeregisterKeystrokeListener",
            Self::RegisterDeviceListener { .. } => "RegisterDeviceListener",
            Self::DeregisterDeviceListener { .. } => "DeregisterDeviceListener",
            Self::NotifyListeners { .. } => "NotifyListeners",
            Self::ChainStepCompleted { .. } => "ChainStepCompleted",
            Self::GenerateKeyboardEvent { .. } => "GenerateKeyboardEvent",
            Self::GenerateMouseEvent { .. } => "GenerateMouseEvent",
            Self::MousePollTick { .. } => "MousePollTick",
            Self::Query { .. } => "Query",
            Self::Shutdown => "Shutdown",
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// State snapshots the actor can answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryQuery {
    Applications,
    /// Child at an index of the desktop accessible.
    ChildAtIndex { index: i32 },
    ChildCount,
    RegisteredEvents,
    EventListeners,
    KeystrokeListeners,
    DeviceListeners,
    GrabMasks,
    Status,
}

/// Answers to [`RegistryQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum QueryResult {
    Applications(Vec<Application>),
    Child(ObjectRef),
    ChildCount(usize),
    RegisteredEvents(Vec<(String, String)>),
    EventListeners(Vec<EventListener>),
    KeystrokeListeners(Vec<KeyListener>),
    DeviceListeners(Vec<MouseListener>),
    GrabMasks(Vec<GrabMask>),
    Status(RegistryStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names() {
        assert_eq!(RegistryMessage::Shutdown.name(), "Shutdown");
        assert_eq!(
            RegistryMessage::NameVanished { name: ":1.4".into() }.name(),
            "NameVanished"
        );
        assert_eq!(
            RegistryMessage::ChainStepCompleted { chain: 1, consumed: false }.name(),
            "ChainStepCompleted"
        );
    }

    #[test]
    fn test_query_result_serializes_with_type_tag() {
        let json = serde_json::to_value(QueryResult::ChildCount(3)).unwrap();
        assert_eq!(json["type"], "childCount");
        assert_eq!(json["data"], 3);
    }
}
