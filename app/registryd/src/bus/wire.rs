//! Wire types of the accessibility bus and their conversions to registry
//! types.
//!
//! Every struct here derives [`zvariant::Type`], so its D-Bus signature is
//! fixed by its fields: `WireDeviceEvent` is `(uiuuisb)`, `WireObjectRef`
//! is `(so)`, and so on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Structure, Type, Value};

use crate::constants::NULL_PATH;
use crate::error::RegistryError;
use crate::registry::{
    AccessibleEvent, DeviceEvent, DeviceEventKind, EventData, EventType, KeyDefinition,
    KeyListener, KeySet, ListenerMode, MouseListener, ObjectRef, PropertyValue, Rect,
};

/// Device event body signature accepted by `NotifyListeners*`.
pub const DEVICE_EVENT_SIGNATURE: &str = "(uiuuisb)";

/// Older device event signature with 16-bit hardware code and modifiers.
pub const LEGACY_DEVICE_EVENT_SIGNATURE: &str = "(uinnisb)";

/// Accessibility event signal body.
pub const EVENT_SIGNATURE: &str = "siiva{sv}";

/// Older accessibility event body ending in an object reference.
pub const LEGACY_EVENT_SIGNATURE: &str = "siiv(so)";

/// Listener kind reported in keystroke listener listings.
const KEYBOARD_LISTENER_KIND: u32 = 0;

// ============================================================================
// Object references
// ============================================================================

/// `(so)`: bus name and object path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct WireObjectRef(pub String, pub OwnedObjectPath);

impl WireObjectRef {
    /// Encodes a reference. A path that is not a valid object path is sent
    /// as the null path.
    #[must_use]
    pub fn from_ref(reference: &ObjectRef) -> Self {
        Self(reference.name.clone(), object_path(&reference.path))
    }
}

impl From<WireObjectRef> for ObjectRef {
    fn from(wire: WireObjectRef) -> Self { Self::new(wire.0, wire.1.as_str()) }
}

/// Parses `path`, falling back to the null path.
#[must_use]
pub fn object_path(path: &str) -> OwnedObjectPath {
    OwnedObjectPath::try_from(path)
        .unwrap_or_else(|_| ObjectPath::from_static_str_unchecked(NULL_PATH).into())
}

// ============================================================================
// Device events
// ============================================================================

/// `(uiuuisb)`: a raw key or button event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct WireDeviceEvent {
    pub kind: u32,
    pub id: i32,
    pub hw_code: u32,
    pub modifiers: u32,
    pub timestamp: i32,
    pub event_string: String,
    pub is_text: bool,
}

/// `(uinnisb)`: the older device event layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct LegacyDeviceEvent {
    pub kind: u32,
    pub id: i32,
    pub hw_code: i16,
    pub modifiers: i16,
    pub timestamp: i32,
    pub event_string: String,
    pub is_text: bool,
}

impl From<LegacyDeviceEvent> for WireDeviceEvent {
    /// Widens the 16-bit fields without sign extension.
    fn from(legacy: LegacyDeviceEvent) -> Self {
        Self {
            kind: legacy.kind,
            id: legacy.id,
            hw_code: widen(legacy.hw_code),
            modifiers: widen(legacy.modifiers),
            timestamp: legacy.timestamp,
            event_string: legacy.event_string,
            is_text: legacy.is_text,
        }
    }
}

fn widen(value: i16) -> u32 { u32::from(u16::from_ne_bytes(value.to_ne_bytes())) }

impl TryFrom<WireDeviceEvent> for DeviceEvent {
    type Error = RegistryError;

    fn try_from(wire: WireDeviceEvent) -> Result<Self, Self::Error> {
        let kind = DeviceEventKind::from_raw(wire.kind).ok_or_else(|| {
            RegistryError::MalformedPayload(format!("unknown device event type {}", wire.kind))
        })?;
        Ok(Self {
            kind,
            id: wire.id,
            hw_code: wire.hw_code,
            modifiers: wire.modifiers,
            timestamp: wire.timestamp,
            event_string: wire.event_string,
            is_text: wire.is_text,
        })
    }
}

impl From<&DeviceEvent> for WireDeviceEvent {
    fn from(event: &DeviceEvent) -> Self {
        Self {
            kind: event.kind.as_raw(),
            id: event.id,
            hw_code: event.hw_code,
            modifiers: event.modifiers,
            timestamp: event.timestamp,
            event_string: event.event_string.clone(),
            is_text: event.is_text,
        }
    }
}

// ============================================================================
// Key listeners
// ============================================================================

/// `(iisi)`: keycode, keysym, keystring, unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct WireKeyDefinition(pub i32, pub i32, pub String, pub i32);

impl From<WireKeyDefinition> for KeyDefinition {
    fn from(wire: WireKeyDefinition) -> Self {
        Self { keycode: wire.0, keysym: wire.1, keystring: wire.2 }
    }
}

impl From<&KeyDefinition> for WireKeyDefinition {
    fn from(key: &KeyDefinition) -> Self { Self(key.keycode, key.keysym, key.keystring.clone(), 0) }
}

/// Decodes a wire key set.
#[must_use]
pub fn key_set(keys: Vec<WireKeyDefinition>) -> KeySet { keys.into_iter().map(Into::into).collect() }

/// `(bbb)`: synchronous, preemptive, global.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct WireListenerMode(pub bool, pub bool, pub bool);

impl From<WireListenerMode> for ListenerMode {
    fn from(wire: WireListenerMode) -> Self {
        Self { synchronous: wire.0, preemptive: wire.1, global: wire.2 }
    }
}

impl From<ListenerMode> for WireListenerMode {
    fn from(mode: ListenerMode) -> Self { Self(mode.synchronous, mode.preemptive, mode.global) }
}

/// `(souua(iisi)u(bbb))`: bus name, path, listener kind, event type mask,
/// key set, modifier mask, mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct WireKeystrokeListener(
    pub String,
    pub OwnedObjectPath,
    pub u32,
    pub u32,
    pub Vec<WireKeyDefinition>,
    pub u32,
    pub WireListenerMode,
);

impl From<&KeyListener> for WireKeystrokeListener {
    fn from(listener: &KeyListener) -> Self {
        Self(
            listener.address.name.clone(),
            object_path(&listener.address.path),
            KEYBOARD_LISTENER_KIND,
            listener.types,
            listener.keys.iter().map(Into::into).collect(),
            listener.mask,
            listener.mode.into(),
        )
    }
}

/// `(sou)`: bus name, path, event type mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct WireDeviceListener(pub String, pub OwnedObjectPath, pub u32);

impl From<&MouseListener> for WireDeviceListener {
    fn from(listener: &MouseListener) -> Self {
        Self(listener.address.name.clone(), object_path(&listener.address.path), listener.types)
    }
}

// ============================================================================
// Accessibility events
// ============================================================================

/// Body of an accessibility event signal, `(siiva{sv})`.
pub type EventBody = (String, i32, i32, OwnedValue, HashMap<String, OwnedValue>);

/// Older body, `(siiv(so))`.
pub type LegacyEventBody = (String, i32, i32, OwnedValue, WireObjectRef);

/// Builds the registry event of a signal received on `interface.member`
/// from `source`.
#[must_use]
pub fn event_from_signal(
    interface: &str,
    member: &str,
    source: ObjectRef,
    body: EventBody,
) -> AccessibleEvent {
    let (minor, detail1, detail2, any_data, properties) = body;
    let mut event = AccessibleEvent::new(EventType::from_signal(interface, member, &minor), source)
        .with_details(detail1, detail2)
        .with_data(event_data(&any_data));

    for (key, value) in properties {
        if let Some(value) = property_value(&value) {
            event.properties.insert(key, value);
        }
    }
    event
}

/// Converts the older body; the trailing reference is dropped.
#[must_use]
pub fn upgrade_legacy_body(body: LegacyEventBody) -> EventBody {
    let (minor, detail1, detail2, any_data, _) = body;
    (minor, detail1, detail2, any_data, HashMap::new())
}

/// Signal body relaying `event` to a subscriber.
#[must_use]
pub fn signal_body(event: &AccessibleEvent) -> (String, i32, i32, Value<'static>, HashMap<String, Value<'static>>) {
    let properties = event
        .properties
        .iter()
        .map(|(key, value)| (key.clone(), property_to_value(value)))
        .collect();

    (
        event.event_type.minor(),
        event.detail1,
        event.detail2,
        data_to_value(&event.any_data),
        properties,
    )
}

/// Decodes an `any_data` variant. Unsupported payloads become `Int(0)`.
#[must_use]
pub fn event_data(value: &Value<'_>) -> EventData {
    match value {
        Value::Value(inner) => event_data(inner),
        Value::I32(n) => EventData::Int(*n),
        Value::U32(n) => EventData::Int(i32::try_from(*n).unwrap_or(i32::MAX)),
        Value::Str(s) => EventData::String(s.as_str().to_string()),
        Value::Structure(structure) => match structure.fields() {
            [Value::Str(name), Value::ObjectPath(path)] => {
                EventData::Object(ObjectRef::new(name.as_str(), path.as_str()))
            }
            [Value::I32(x), Value::I32(y), Value::I32(width), Value::I32(height)] => {
                EventData::Rect(Rect { x: *x, y: *y, width: *width, height: *height })
            }
            _ => EventData::default(),
        },
        _ => EventData::default(),
    }
}

fn data_to_value(data: &EventData) -> Value<'static> {
    match data {
        EventData::Int(n) => Value::from(*n),
        EventData::String(s) => Value::from(s.clone()),
        EventData::Object(reference) => object_value(reference),
        EventData::Rect(rect) => {
            Value::Structure(Structure::from((rect.x, rect.y, rect.width, rect.height)))
        }
    }
}

fn property_value(value: &Value<'_>) -> Option<PropertyValue> {
    let value = match value {
        Value::Value(inner) => return property_value(inner),
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::I16(n) => PropertyValue::Int(i64::from(*n)),
        Value::I32(n) => PropertyValue::Int(i64::from(*n)),
        Value::I64(n) => PropertyValue::Int(*n),
        Value::U8(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U16(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U32(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U64(n) => PropertyValue::UInt(*n),
        Value::F64(n) => PropertyValue::Double(*n),
        Value::Str(s) => PropertyValue::String(s.as_str().to_string()),
        Value::Structure(structure) => match structure.fields() {
            [Value::Str(name), Value::ObjectPath(path)] => {
                PropertyValue::Object(ObjectRef::new(name.as_str(), path.as_str()))
            }
            _ => return None,
        },
        _ => return None,
    };
    Some(value)
}

fn property_to_value(value: &PropertyValue) -> Value<'static> {
    match value {
        PropertyValue::Bool(b) => Value::from(*b),
        PropertyValue::Int(n) => Value::from(*n),
        PropertyValue::UInt(n) => Value::from(*n),
        PropertyValue::Double(n) => Value::from(*n),
        PropertyValue::String(s) => Value::from(s.clone()),
        PropertyValue::Object(reference) => object_value(reference),
    }
}

/// `(so)` value of an object reference.
pub fn object_value(reference: &ObjectRef) -> Value<'static> {
    let path: ObjectPath<'static> = object_path(&reference.path).into_inner();
    Value::Structure(Structure::from((reference.name.clone(), path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signatures_match_the_bus_surface() {
        assert_eq!(WireDeviceEvent::SIGNATURE.to_string(), DEVICE_EVENT_SIGNATURE);
        assert_eq!(LegacyDeviceEvent::SIGNATURE.to_string(), LEGACY_DEVICE_EVENT_SIGNATURE);
        assert_eq!(WireKeyDefinition::SIGNATURE.to_string(), "(iisi)");
        assert_eq!(WireKeystrokeListener::SIGNATURE.to_string(), "(souua(iisi)u(bbb))");
        assert_eq!(WireDeviceListener::SIGNATURE.to_string(), "(sou)");
    }

    #[test]
    fn test_legacy_event_widens_without_sign_extension() {
        let legacy = LegacyDeviceEvent {
            kind: 0,
            id: 0x61,
            hw_code: -1,
            modifiers: 0x0004,
            timestamp: 12,
            event_string: "a".to_string(),
            is_text: true,
        };
        let wire = WireDeviceEvent::from(legacy);

        assert_eq!(wire.hw_code, 0xFFFF);
        assert_eq!(wire.modifiers, 4);
        assert_eq!(wire.event_string, "a");
    }

    #[test]
    fn test_unknown_device_event_kind_is_rejected() {
        let wire = WireDeviceEvent {
            kind: 9,
            id: 0,
            hw_code: 0,
            modifiers: 0,
            timestamp: 0,
            event_string: String::new(),
            is_text: false,
        };
        assert!(matches!(DeviceEvent::try_from(wire), Err(RegistryError::MalformedPayload(_))));
    }

    #[test]
    fn test_event_data_decodes_rect_and_reference() {
        let rect = Value::Structure(Structure::from((1, 2, 30, 40)));
        assert_eq!(event_data(&rect), EventData::Rect(Rect { x: 1, y: 2, width: 30, height: 40 }));

        let path = ObjectPath::try_from("/org/a11y/atspi/accessible/7").unwrap();
        let reference = Value::Structure(Structure::from((":1.9".to_string(), path)));
        assert_eq!(
            event_data(&reference),
            EventData::Object(ObjectRef::new(":1.9", "/org/a11y/atspi/accessible/7"))
        );

        assert_eq!(event_data(&Value::from(2.5_f64)), EventData::Int(0));
    }

    #[test]
    fn test_event_from_signal_keeps_supported_properties() {
        let mut properties = HashMap::new();
        properties.insert("accessible-name".to_string(), OwnedValue::from(7_i32));
        let body: EventBody =
            ("focused".to_string(), 1, 0, OwnedValue::from(0_i32), properties);

        let event = event_from_signal(
            "org.a11y.atspi.Event.Object",
            "StateChanged",
            ObjectRef::new(":1.3", "/org/a11y/atspi/accessible/5"),
            body,
        );

        assert_eq!(event.event_type.to_string(), "Object:StateChanged:Focused");
        assert_eq!(event.detail1, 1);
        assert_eq!(event.properties.get("accessible-name"), Some(&PropertyValue::Int(7)));
    }

    #[test]
    fn test_signal_body_uses_dashed_minor() {
        let event = AccessibleEvent::new(
            EventType::from_signal("org.a11y.atspi.Event.Object", "ChildrenChanged", "add/system"),
            ObjectRef::new(":1.3", "/root"),
        )
        .with_details(2, 0);

        let (minor, detail1, _, _, properties) = signal_body(&event);
        assert_eq!(minor, "add/system");
        assert_eq!(detail1, 2);
        assert!(properties.is_empty());
    }
}
