//! Registry core.
//!
//! [`Registry`] owns every piece of broker state: the application list,
//! event subscriptions, key and mouse listeners, the key-grab set and the
//! pointer poller. It is synchronous and knows nothing about the bus; the
//! actor in [`crate::actor`] owns one instance and performs the remote
//! calls the registry asks for.
//!
//! Each component's operations live in their own module as `impl Registry`
//! blocks:
//!
//! - [`apps`]: embed/unembed and name-loss cleanup
//! - [`dispatcher`]: event subscriptions and event dispatch
//! - [`device`]: key and mouse listeners, key synthesis
//! - [`poll`]: pointer polling

pub mod apps;
pub mod chain;
pub mod device;
pub mod dispatcher;
pub mod event_type;
pub mod keygrab;
pub mod listeners;
pub mod notify;
pub mod platform;
pub mod poll;
pub mod transport;
pub mod types;

use std::sync::Arc;

pub use apps::{Application, ApplicationDirectory, Embedded};
pub use chain::{ChainTarget, KeyNotifyChain, run_chain};
pub use event_type::EventType;
pub use keygrab::{GrabMask, KeygrabCoordinator};
pub use listeners::{EventListener, KeyListener, ListenerId, ListenerRegistry, MouseListener};
pub use notify::{Observers, RegistryNotification, SubscriptionId};
pub use platform::{DevicePlatform, NullPlatform, PointerSample};
pub use poll::{MousePoller, PollOutcome, PollPhase, PollSettings};
use serde::{Deserialize, Serialize};
pub use transport::{ListenerTransport, TransportError};
pub use types::{
    AccessibleEvent, DeviceEvent, DeviceEventKind, EventData, KeyDefinition, KeySet,
    KeySynthType, ListenerMode, ObjectRef, PropertyValue, Rect, keymask,
};

use crate::constants::{REGISTRY_BUS_NAME, ROOT_PATH};

/// Tunables of the registry core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Modifier bit the platform reports for NumLock.
    pub numlock_physical_mask: u32,
    pub poll: PollSettings,
    /// Pass application-raised events on to subscribers.
    pub relay_events: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            numlock_physical_mask: keymask::MOD2,
            poll: PollSettings::default(),
            relay_events: false,
        }
    }
}

/// Counts reported by `registryd status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    pub bus_name: String,
    pub applications: usize,
    pub event_listeners: usize,
    pub keystroke_listeners: usize,
    pub device_listeners: usize,
    pub grab_masks: usize,
    pub polling: bool,
}

pub struct Registry {
    bus_name: String,
    listeners: ListenerRegistry,
    grabs: KeygrabCoordinator,
    apps: ApplicationDirectory,
    poller: MousePoller,
    platform: Arc<dyn DevicePlatform>,
    observers: Observers<RegistryNotification>,
    numlock_physical_mask: u32,
    relay_events: bool,
    poll_start_requested: bool,
}

impl Registry {
    #[must_use]
    pub fn new(settings: RegistrySettings, platform: Arc<dyn DevicePlatform>) -> Self {
        Self {
            bus_name: REGISTRY_BUS_NAME.to_string(),
            listeners: ListenerRegistry::new(),
            grabs: KeygrabCoordinator::new(),
            apps: ApplicationDirectory::new(),
            poller: MousePoller::new(settings.poll),
            platform,
            observers: Observers::new(),
            numlock_physical_mask: settings.numlock_physical_mask,
            relay_events: settings.relay_events,
            poll_start_requested: false,
        }
    }

    /// Registry with default settings and no input backend.
    #[must_use]
    pub fn headless() -> Self { Self::new(RegistrySettings::default(), Arc::new(NullPlatform)) }

    #[must_use]
    pub fn bus_name(&self) -> &str { &self.bus_name }

    /// Sets the unique bus name replies and events refer to.
    pub fn set_bus_name(&mut self, name: impl Into<String>) { self.bus_name = name.into(); }

    /// Reference to the registry's own desktop accessible.
    #[must_use]
    pub fn root_reference(&self) -> ObjectRef { ObjectRef::new(self.bus_name.clone(), ROOT_PATH) }

    /// Observer list for registry notifications. Clones share subscribers.
    #[must_use]
    pub fn observers(&self) -> &Observers<RegistryNotification> { &self.observers }

    #[must_use]
    pub const fn listeners(&self) -> &ListenerRegistry { &self.listeners }

    #[must_use]
    pub const fn grabs(&self) -> &KeygrabCoordinator { &self.grabs }

    #[must_use]
    pub const fn apps(&self) -> &ApplicationDirectory { &self.apps }

    #[must_use]
    pub const fn poller(&self) -> &MousePoller { &self.poller }

    #[must_use]
    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            bus_name: self.bus_name.clone(),
            applications: self.apps.len(),
            event_listeners: self.listeners.event_listeners().len(),
            keystroke_listeners: self.listeners.key_listeners().len(),
            device_listeners: self.listeners.mouse_listeners().len(),
            grab_masks: self.grabs.masks().len(),
            polling: self.poller.is_running(),
        }
    }

    fn notify(&self, notification: RegistryNotification) { self.observers.emit(&notification); }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("bus_name", &self.bus_name)
            .field("applications", &self.apps.len())
            .field("listeners", &self.listeners)
            .field("grabs", &self.grabs)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}
