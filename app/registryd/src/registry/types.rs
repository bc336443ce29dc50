//! Value types shared by the registry components.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::event_type::EventType;
use crate::constants::NULL_PATH;

// ============================================================================
// Object references
// ============================================================================

/// A remote object: the bus name owning it plus its object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Bus name (unique or well-known) of the owning peer.
    pub name: String,
    /// Object path on that peer.
    pub path: String,
}

impl ObjectRef {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self { name: name.into(), path: path.into() }
    }

    /// The "no object" reference for the given peer.
    pub fn null(name: impl Into<String>) -> Self { Self::new(name, NULL_PATH) }

    #[must_use]
    pub fn is_null(&self) -> bool { self.path == NULL_PATH }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.path)
    }
}

// ============================================================================
// Modifier masks
// ============================================================================

/// Modifier and button bits carried in device event and listener masks.
pub mod keymask {
    pub const SHIFT: u32 = 1 << 0;
    pub const SHIFTLOCK: u32 = 1 << 1;
    pub const CONTROL: u32 = 1 << 2;
    pub const MOD1: u32 = 1 << 3;
    pub const MOD2: u32 = 1 << 4;
    pub const MOD3: u32 = 1 << 5;
    pub const MOD4: u32 = 1 << 6;
    pub const MOD5: u32 = 1 << 7;
    pub const BUTTON1: u32 = 1 << 8;
    pub const BUTTON2: u32 = 1 << 9;
    pub const BUTTON3: u32 = 1 << 10;
    pub const BUTTON4: u32 = 1 << 11;
    pub const BUTTON5: u32 = 1 << 12;

    /// Platform-independent NumLock bit.
    pub const NUMLOCK: u32 = 1 << 14;

    /// Bits that count as keyboard modifiers for change detection.
    pub const KEY_MODIFIERS: u32 =
        SHIFT | SHIFTLOCK | CONTROL | MOD1 | MOD2 | MOD3 | MOD4 | MOD5 | NUMLOCK;

    /// Only the low byte takes part in listener matching.
    pub const MATCH_BITS: u32 = 0xFF;
}

// ============================================================================
// Device events
// ============================================================================

/// Kind of a raw input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceEventKind {
    KeyPressed,
    KeyReleased,
    ButtonPressed,
    ButtonReleased,
}

impl DeviceEventKind {
    /// Decodes the wire value, rejecting unknown kinds.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::KeyPressed),
            1 => Some(Self::KeyReleased),
            2 => Some(Self::ButtonPressed),
            3 => Some(Self::ButtonReleased),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::KeyPressed => 0,
            Self::KeyReleased => 1,
            Self::ButtonPressed => 2,
            Self::ButtonReleased => 3,
        }
    }

    /// Bit of this kind in a listener's event-type mask.
    #[must_use]
    pub const fn mask_bit(self) -> u32 { 1 << self.as_raw() }

    #[must_use]
    pub const fn is_key(self) -> bool { matches!(self, Self::KeyPressed | Self::KeyReleased) }
}

/// Returns whether an event-type mask selects `kind`. A zero mask selects every kind.
#[must_use]
pub const fn type_mask_contains(types: u32, kind: DeviceEventKind) -> bool {
    types == 0 || types & kind.mask_bit() != 0
}

/// A raw key or button event handed in by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    pub kind: DeviceEventKind,
    /// Keysym for key events, button number for button events.
    pub id: i32,
    /// Hardware key code.
    pub hw_code: u32,
    pub modifiers: u32,
    pub timestamp: i32,
    /// Text produced by the key, if any.
    pub event_string: String,
    pub is_text: bool,
}

impl DeviceEvent {
    /// Creates a key press event with no text.
    #[must_use]
    pub fn key_pressed(keysym: i32, hw_code: u32, modifiers: u32) -> Self {
        Self {
            kind: DeviceEventKind::KeyPressed,
            id: keysym,
            hw_code,
            modifiers,
            timestamp: 0,
            event_string: String::new(),
            is_text: false,
        }
    }

    /// Creates a button event.
    #[must_use]
    pub fn button(button: i32, pressed: bool, modifiers: u32) -> Self {
        Self {
            kind: if pressed {
                DeviceEventKind::ButtonPressed
            } else {
                DeviceEventKind::ButtonReleased
            },
            id: button,
            hw_code: u32::try_from(button).unwrap_or_default(),
            modifiers,
            timestamp: 0,
            event_string: String::new(),
            is_text: false,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.event_string = text.into();
        self.is_text = !self.event_string.is_empty();
        self
    }
}

// ============================================================================
// Key listener parameters
// ============================================================================

/// One entry of a key listener's key set.
///
/// A key is identified by keycode, keysym or the literal string it produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDefinition {
    pub keycode: i32,
    pub keysym: i32,
    pub keystring: String,
}

impl KeyDefinition {
    #[must_use]
    pub fn keysym(keysym: i32) -> Self { Self { keysym, ..Self::default() } }

    #[must_use]
    pub fn keycode(keycode: i32) -> Self { Self { keycode, ..Self::default() } }

    pub fn keystring(keystring: impl Into<String>) -> Self {
        Self { keystring: keystring.into(), ..Self::default() }
    }
}

/// Key set of a key listener. Empty means every key.
pub type KeySet = SmallVec<[KeyDefinition; 4]>;

/// Delivery mode of a key listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerMode {
    pub synchronous: bool,
    /// The listener may consume events, stopping delivery.
    pub preemptive: bool,
    /// System-wide delivery backed by platform key grabs.
    pub global: bool,
}

/// Requested key synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeySynthType {
    Press,
    Release,
    PressRelease,
    Sym,
    String,
}

impl KeySynthType {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Press),
            1 => Some(Self::Release),
            2 => Some(Self::PressRelease),
            3 => Some(Self::Sym),
            4 => Some(Self::String),
            _ => None,
        }
    }
}

// ============================================================================
// Accessibility events
// ============================================================================

/// Rectangle payload of an accessibility event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Typed `any_data` payload of an accessibility event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum EventData {
    Int(i32),
    String(String),
    Object(ObjectRef),
    Rect(Rect),
}

impl Default for EventData {
    fn default() -> Self { Self::Int(0) }
}

/// A value in an event's property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Object(ObjectRef),
}

/// A structured accessibility event travelling from an application to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibleEvent {
    pub event_type: EventType,
    pub detail1: i32,
    pub detail2: i32,
    pub any_data: EventData,
    /// Object the event is about.
    pub source: ObjectRef,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl AccessibleEvent {
    pub fn new(event_type: EventType, source: ObjectRef) -> Self {
        Self {
            event_type,
            detail1: 0,
            detail2: 0,
            any_data: EventData::default(),
            source,
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn with_details(mut self, detail1: i32, detail2: i32) -> Self {
        self.detail1 = detail1;
        self.detail2 = detail2;
        self
    }

    #[must_use]
    pub fn with_data(mut self, any_data: EventData) -> Self {
        self.any_data = any_data;
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Copy of the event keeping only the requested properties.
    #[must_use]
    pub fn restricted_to(&self, requested: &[String]) -> Self {
        let mut event = self.clone();
        event.properties.retain(|key, _| requested.iter().any(|r| r == key));
        event
    }
}
