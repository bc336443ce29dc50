//! Well-known names, object paths and interfaces of the accessibility bus.

/// Application identifier used for config, cache and socket locations.
pub const APP_ID: &str = "registryd";

/// Bus name owned by the registry daemon.
pub const REGISTRY_BUS_NAME: &str = "org.a11y.atspi.Registry";

// ============================================================================
// Object Paths
// ============================================================================

/// Root accessible (the desktop frame every application is a child of).
pub const ROOT_PATH: &str = "/org/a11y/atspi/accessible/root";

/// Registry object handling event subscriptions.
pub const REGISTRY_PATH: &str = "/org/a11y/atspi/registry";

/// Device event controller object.
pub const DEC_PATH: &str = "/org/a11y/atspi/registry/deviceeventcontroller";

/// Path used to refer to "no object".
pub const NULL_PATH: &str = "/org/a11y/atspi/null";

// ============================================================================
// Interfaces
// ============================================================================

pub const SOCKET_INTERFACE: &str = "org.a11y.atspi.Socket";
pub const ACCESSIBLE_INTERFACE: &str = "org.a11y.atspi.Accessible";
pub const APPLICATION_INTERFACE: &str = "org.a11y.atspi.Application";
pub const COMPONENT_INTERFACE: &str = "org.a11y.atspi.Component";
pub const REGISTRY_INTERFACE: &str = "org.a11y.atspi.Registry";
pub const DEC_INTERFACE: &str = "org.a11y.atspi.DeviceEventController";
pub const DEVICE_LISTENER_INTERFACE: &str = "org.a11y.atspi.DeviceEventListener";
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
pub const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";
pub const PEER_INTERFACE: &str = "org.freedesktop.DBus.Peer";

/// Prefix of every accessibility event interface (`org.a11y.atspi.Event.Object`, ...).
pub const EVENT_INTERFACE_PREFIX: &str = "org.a11y.atspi.Event.";

/// Event categories whose interfaces the registry listens on.
pub const EVENT_CATEGORIES: &[&str] =
    &["Object", "Window", "Mouse", "Keyboard", "Terminal", "Document", "Focus"];

// ============================================================================
// Root accessible
// ============================================================================

/// Accessible name of the desktop frame.
pub const ROOT_NAME: &str = "main";

/// Role of the desktop frame.
pub const ROLE_DESKTOP_FRAME: u32 = 14;

/// Role name of the desktop frame.
pub const ROLE_DESKTOP_FRAME_NAME: &str = "desktop frame";

/// Toolkit name reported on the Application interface.
pub const TOOLKIT_NAME: &str = "at-spi-registry";

/// Screen extents reported for the desktop frame.
pub const DESKTOP_EXTENTS: (i32, i32, i32, i32) = (0, 0, 1024, 768);
