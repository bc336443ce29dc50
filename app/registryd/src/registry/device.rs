//! Device event controller: key and mouse listeners, raw event matching and
//! input synthesis.

use futures::future::join_all;

use super::Registry;
use super::chain::{ChainTarget, KeyNotifyChain};
use super::listeners::KeyListener;
use super::notify::RegistryNotification;
use super::transport::ListenerTransport;
use super::types::{DeviceEvent, KeySet, KeySynthType, ListenerMode, ObjectRef, keymask};
use crate::error::RegistryError;

impl Registry {
    // ========================================================================
    // NumLock
    // ========================================================================

    /// ORs the virtual NumLock bit into `modifiers` when the platform's
    /// NumLock bit is set.
    #[must_use]
    pub const fn normalize_modifiers(&self, modifiers: u32) -> u32 {
        if modifiers & self.numlock_physical_mask != 0 {
            modifiers | keymask::NUMLOCK
        } else {
            modifiers
        }
    }

    /// Replaces the virtual NumLock bit of a listener mask with the
    /// platform's NumLock bit.
    #[must_use]
    pub const fn translate_mask(&self, mask: u32) -> u32 {
        if mask & keymask::NUMLOCK != 0 {
            (mask & !keymask::NUMLOCK) | self.numlock_physical_mask
        } else {
            mask
        }
    }

    // ========================================================================
    // Keystroke listeners
    // ========================================================================

    /// Registers a keystroke listener.
    ///
    /// Global listeners also take their key grabs. Returns `false` when a
    /// grab failed; the listener stays registered in that case.
    pub fn register_keystroke_listener(
        &mut self,
        address: ObjectRef,
        keys: KeySet,
        mask: u32,
        types: u32,
        mode: ListenerMode,
    ) -> bool {
        let mask = self.translate_mask(mask);
        let id = self.listeners.add_key_listener(address, keys.clone(), mask, types, mode);

        let granted = if mode.global {
            self.grabs.register(id, mask, &keys, self.platform.as_ref());
            !self.grabs.reconcile(self.platform.as_ref(), None)
        } else {
            true
        };

        let Some(listener) = self.listeners.key_listener(id).cloned() else {
            return granted;
        };

        if granted {
            tracing::debug!(listener = %listener.address, mask, "dec: keystroke listener registered");
            self.notify(RegistryNotification::KeystrokeListenerRegistered(listener));
        } else {
            tracing::warn!(listener = %listener.address, mask, "dec: key grab failed for keystroke listener");
        }
        granted
    }

    /// Removes the keystroke listeners registered at `address`.
    ///
    /// Each removed listener releases the grab references it took at
    /// registration, so an empty `keys` releases the stored key set. A
    /// listener whose grab was refused holds nothing and releases nothing.
    /// Returns the number of removed listeners.
    pub fn deregister_keystroke_listener(
        &mut self,
        address: &ObjectRef,
        keys: &KeySet,
        mask: u32,
        types: u32,
    ) -> usize {
        let mask = self.translate_mask(mask);
        let removed = self.listeners.remove_key_listeners(address);
        self.release_grabs(&removed);

        tracing::debug!(listener = %address, mask, types, keys = keys.len(), count = removed.len(), "dec: keystroke listener deregistered");
        let count = removed.len();
        for listener in removed {
            self.notify(RegistryNotification::KeystrokeListenerDeregistered(listener));
        }
        count
    }

    fn release_grabs(&mut self, removed: &[KeyListener]) {
        let mut released = false;
        for listener in removed.iter().filter(|listener| listener.mode.global) {
            self.grabs.deregister(listener.id);
            released = true;
        }
        if released {
            self.grabs.reconcile(self.platform.as_ref(), None);
        }
    }

    // ========================================================================
    // Device (mouse) listeners
    // ========================================================================

    /// Registers a mouse listener and arms pointer polling.
    pub fn register_device_listener(&mut self, address: ObjectRef, types: u32) -> bool {
        let id = self.listeners.add_mouse_listener(address, types);
        if let Some(listener) = self.listeners.mouse_listeners().iter().find(|l| l.id == id) {
            tracing::debug!(listener = %listener.address, types, "dec: device listener registered");
            self.notify(RegistryNotification::DeviceListenerRegistered(listener.clone()));
        }
        self.update_poll_demand();
        true
    }

    /// Removes the mouse listeners registered at `address`.
    pub fn deregister_device_listener(&mut self, address: &ObjectRef, types: u32) -> usize {
        let removed = self.listeners.remove_mouse_listeners(address);
        tracing::debug!(listener = %address, types, count = removed.len(), "dec: device listener deregistered");

        let count = removed.len();
        for listener in removed {
            self.notify(RegistryNotification::DeviceListenerDeregistered(listener));
        }
        self.update_poll_demand();
        count
    }

    /// Removes every key and mouse listener owned by `owner`, releasing the
    /// grabs of its global listeners.
    pub fn remove_device_listeners_of(&mut self, owner: &str) {
        let keys = self.listeners.remove_key_listeners_of(owner);
        let mice = self.listeners.remove_mouse_listeners_of(owner);
        if keys.is_empty() && mice.is_empty() {
            return;
        }

        tracing::debug!(owner, keys = keys.len(), mice = mice.len(), "dec: removing listeners of vanished owner");
        self.release_grabs(&keys);

        for listener in keys {
            self.notify(RegistryNotification::KeystrokeListenerDeregistered(listener));
        }
        for listener in mice {
            self.notify(RegistryNotification::DeviceListenerDeregistered(listener));
        }
        self.update_poll_demand();
    }

    // ========================================================================
    // Raw event delivery
    // ========================================================================

    /// Builds the delivery chain of a key event: every matching listener,
    /// most recently registered first.
    #[must_use]
    pub fn key_notify_chain(&self, event: DeviceEvent, is_system_global: bool) -> KeyNotifyChain {
        let mut event = event;
        if event.kind.is_key() {
            event.modifiers = self.normalize_modifiers(event.modifiers);
        }

        let targets = self
            .listeners
            .key_listeners()
            .iter()
            .filter(|listener| listener.matches(&event, is_system_global))
            .map(|listener| ChainTarget {
                listener: listener.id,
                address: listener.address.clone(),
                preemptive: listener.mode.preemptive,
            })
            .collect();

        KeyNotifyChain::new(event, targets, is_system_global)
    }

    /// Whether the listener a chain step targets is still registered.
    #[must_use]
    pub fn chain_target_alive(&self, target: &ChainTarget) -> bool {
        self.listeners.key_listener(target.listener).is_some()
    }

    /// Mouse listeners interested in `event`, most recently registered first.
    #[must_use]
    pub fn mouse_targets(&self, event: &DeviceEvent) -> Vec<ObjectRef> {
        self.listeners
            .mouse_listeners()
            .iter()
            .filter(|listener| listener.matches(event))
            .map(|listener| listener.address.clone())
            .collect()
    }

    /// Re-applies the grab set, re-issuing grabs that match `trigger`.
    /// Returns `true` if any grab failed.
    pub fn refresh_grabs(&mut self, trigger: Option<&DeviceEvent>) -> bool {
        self.grabs.reconcile(self.platform.as_ref(), trigger)
    }

    // ========================================================================
    // Synthesis
    // ========================================================================

    /// Synthesizes keyboard input.
    ///
    /// `keycode` is a hardware keycode for press/release requests and a
    /// keysym for [`KeySynthType::Sym`]; `keystring` is typed for
    /// [`KeySynthType::String`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidArguments`] for a negative keycode.
    pub fn generate_keyboard_event(
        &self,
        keycode: i32,
        keystring: &str,
        synth: KeySynthType,
    ) -> Result<(), RegistryError> {
        let platform = self.platform.as_ref();
        let code = || {
            u32::try_from(keycode)
                .map_err(|_| RegistryError::InvalidArguments(format!("invalid keycode {keycode}")))
        };

        match synth {
            KeySynthType::Press => {
                platform.synth_key_press(code()?);
            }
            KeySynthType::Release => {
                platform.synth_key_release(code()?);
            }
            KeySynthType::PressRelease => {
                let code = code()?;
                platform.synth_key_press(code);
                platform.synth_key_release(code);
            }
            KeySynthType::Sym => {
                if !self.synth_keysym(keycode) {
                    tracing::warn!(keysym = keycode, "dec: could not synthesize keysym");
                }
            }
            KeySynthType::String => {
                if !platform.synth_keystring(keystring) {
                    tracing::warn!(keystring, "dec: could not synthesize keystring");
                }
            }
        }
        Ok(())
    }

    fn synth_keysym(&self, keysym: i32) -> bool {
        let platform = self.platform.as_ref();
        let Some((keycode, modifiers)) = platform.resolve_keysym(keysym) else {
            return false;
        };

        if modifiers != 0 {
            platform.lock_modifiers(modifiers);
        }
        let pressed = platform.synth_key_press(keycode);
        let released = platform.synth_key_release(keycode);
        if modifiers != 0 {
            platform.unlock_modifiers(modifiers);
        }
        pressed && released
    }

    /// Forwards a pointer synthesis request (`b1c`, `abs`, `rel`, ...).
    pub fn generate_mouse_event(&self, x: i32, y: i32, event_name: &str) {
        tracing::debug!(x, y, event_name, "dec: synthesizing mouse event");
        self.platform.generate_mouse_event(x, y, event_name);
    }
}

/// Notifies every target of a mouse event and reports whether any of them
/// consumed it. Failed calls count as "not consumed".
pub async fn notify_mouse_listeners(
    targets: Vec<ObjectRef>,
    event: DeviceEvent,
    transport: &dyn ListenerTransport,
) -> bool {
    let calls = targets.iter().map(|target| transport.notify_device_event(target, &event));
    let replies = join_all(calls).await;

    replies.into_iter().zip(&targets).fold(false, |consumed, (reply, target)| match reply {
        Ok(reply) => consumed || reply,
        Err(err) => {
            tracing::debug!(error = %err, listener = %target, "dec: mouse listener notification failed");
            consumed
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use smallvec::smallvec;

    use super::*;
    use crate::registry::chain::run_chain;
    use crate::registry::keygrab::ANY_KEY;
    use crate::registry::platform::fake::{PlatformCall, RecordingPlatform};
    use crate::registry::transport::fake::RecordingTransport;
    use crate::registry::types::{DeviceEventKind, KeyDefinition};
    use crate::registry::{RegistrySettings, platform::DevicePlatform};

    fn registry_with(platform: &Arc<RecordingPlatform>) -> Registry {
        Registry::new(RegistrySettings::default(), Arc::clone(platform) as Arc<dyn DevicePlatform>)
    }

    fn global() -> ListenerMode { ListenerMode { global: true, ..ListenerMode::default() } }

    fn preemptive() -> ListenerMode {
        ListenerMode { preemptive: true, synchronous: true, global: false }
    }

    fn addr(path: &str) -> ObjectRef { ObjectRef::new(":1.40", path) }

    #[test]
    fn test_any_key_grab_refcount_scenario() {
        let platform = Arc::new(RecordingPlatform::default());
        let mut registry = registry_with(&platform);

        assert!(registry.register_keystroke_listener(addr("/a"), KeySet::new(), 0, 0, global()));
        assert_eq!(registry.grabs().find(0, ANY_KEY).map(|m| m.ref_count), Some(1));

        assert!(registry.register_keystroke_listener(addr("/b"), KeySet::new(), 0, 0, global()));
        assert_eq!(registry.grabs().find(0, ANY_KEY).map(|m| m.ref_count), Some(2));
        assert_eq!(platform.grab_calls(), 1);

        registry.deregister_keystroke_listener(&addr("/a"), &KeySet::new(), 0, 0);
        assert_eq!(registry.grabs().find(0, ANY_KEY).map(|m| m.ref_count), Some(1));
        assert_eq!(platform.ungrab_calls(), 0);

        registry.deregister_keystroke_listener(&addr("/b"), &KeySet::new(), 0, 0);
        assert!(registry.grabs().find(0, ANY_KEY).is_none());
        assert_eq!(platform.ungrab_calls(), 1);
    }

    #[test]
    fn test_grab_failure_keeps_listener_and_reports_false() {
        let platform = Arc::new(RecordingPlatform::default());
        platform.refuse(ANY_KEY, keymask::MOD1);
        let mut registry = registry_with(&platform);
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        registry.observers().subscribe(move |n| {
            if matches!(n, RegistryNotification::KeystrokeListenerRegistered(_)) {
                *counter.lock() += 1;
            }
        });

        let granted =
            registry.register_keystroke_listener(addr("/a"), KeySet::new(), keymask::MOD1, 0, global());

        assert!(!granted);
        assert_eq!(registry.listeners().key_listeners().len(), 1);
        assert!(registry.grabs().masks().is_empty());
        assert_eq!(*seen.lock(), 0);
    }

    #[test]
    fn test_deregister_with_empty_keys_uses_stored_key_set() {
        let platform = Arc::new(RecordingPlatform::default());
        let mut registry = registry_with(&platform);
        let keys: KeySet = smallvec![KeyDefinition::keysym(0x61), KeyDefinition::keysym(0x62)];

        registry.register_keystroke_listener(addr("/a"), keys, keymask::CONTROL, 0, global());
        assert_eq!(registry.grabs().masks().len(), 2);

        registry.deregister_keystroke_listener(&addr("/a"), &KeySet::new(), keymask::CONTROL, 0);
        assert!(registry.grabs().masks().is_empty());
        assert_eq!(platform.ungrab_calls(), 2);
    }

    #[test]
    fn test_listener_with_refused_grab_does_not_release_a_later_grab() {
        let platform = Arc::new(RecordingPlatform::default());
        platform.refuse(ANY_KEY, keymask::MOD1);
        let mut registry = registry_with(&platform);

        let refused =
            registry.register_keystroke_listener(addr("/a"), KeySet::new(), keymask::MOD1, 0, global());
        assert!(!refused);

        platform.allow(ANY_KEY, keymask::MOD1);
        let granted =
            registry.register_keystroke_listener(addr("/b"), KeySet::new(), keymask::MOD1, 0, global());
        assert!(granted);

        registry.deregister_keystroke_listener(&addr("/a"), &KeySet::new(), keymask::MOD1, 0);

        assert_eq!(registry.grabs().find(keymask::MOD1, ANY_KEY).map(|m| m.ref_count), Some(1));
        assert_eq!(platform.ungrab_calls(), 0);
    }

    #[test]
    fn test_vanished_owner_with_refused_grab_keeps_other_grabs() {
        let platform = Arc::new(RecordingPlatform::default());
        platform.refuse(ANY_KEY, 0);
        let mut registry = registry_with(&platform);
        registry.register_keystroke_listener(
            ObjectRef::new(":1.50", "/a"),
            KeySet::new(),
            0,
            0,
            global(),
        );

        platform.allow(ANY_KEY, 0);
        registry.register_keystroke_listener(
            ObjectRef::new(":1.51", "/b"),
            KeySet::new(),
            0,
            0,
            global(),
        );

        registry.remove_device_listeners_of(":1.50");

        assert_eq!(registry.grabs().find(0, ANY_KEY).map(|m| m.ref_count), Some(1));
        assert_eq!(platform.ungrab_calls(), 0);
    }

    #[test]
    fn test_numlock_mask_is_translated_and_events_normalized() {
        let platform = Arc::new(RecordingPlatform::default());
        let mut registry = registry_with(&platform);

        registry.register_keystroke_listener(
            addr("/a"),
            KeySet::new(),
            keymask::NUMLOCK,
            0,
            ListenerMode::default(),
        );
        assert_eq!(registry.listeners().key_listeners()[0].mask, keymask::MOD2);

        let chain = registry.key_notify_chain(DeviceEvent::key_pressed(0x31, 10, keymask::MOD2), false);
        assert_eq!(chain.event().modifiers, keymask::MOD2 | keymask::NUMLOCK);
        assert_eq!(chain.targets().len(), 1);
    }

    #[test]
    fn test_chain_order_is_last_registered_first() {
        let platform = Arc::new(RecordingPlatform::default());
        let mut registry = registry_with(&platform);
        for path in ["/first", "/second", "/third"] {
            registry.register_keystroke_listener(addr(path), KeySet::new(), 0, 0, preemptive());
        }

        let chain = registry.key_notify_chain(DeviceEvent::key_pressed(0x61, 38, 0), false);
        let order: Vec<_> = chain.targets().iter().map(|t| t.address.path.as_str()).collect();

        assert_eq!(order, vec!["/third", "/second", "/first"]);
    }

    #[tokio::test]
    async fn test_delivery_stops_at_preemptive_consumer() {
        let platform = Arc::new(RecordingPlatform::default());
        let mut registry = registry_with(&platform);
        for path in ["/first", "/second", "/third"] {
            registry.register_keystroke_listener(addr(path), KeySet::new(), 0, 0, preemptive());
        }
        let transport = RecordingTransport::new();
        transport.consume_at("/second");

        let chain = registry.key_notify_chain(DeviceEvent::key_pressed(0x61, 38, 0), false);
        let consumed = run_chain(chain, &*transport).await;

        assert!(consumed);
        assert_eq!(transport.notified(), vec!["/third", "/second"]);
    }

    #[test]
    fn test_scope_must_match_global_flag() {
        let platform = Arc::new(RecordingPlatform::default());
        let mut registry = registry_with(&platform);
        registry.register_keystroke_listener(addr("/g"), KeySet::new(), 0, 0, global());
        registry.register_keystroke_listener(addr("/t"), KeySet::new(), 0, 0, ListenerMode::default());

        let event = DeviceEvent::key_pressed(0x61, 38, 0);
        let global_chain = registry.key_notify_chain(event.clone(), true);
        let toolkit_chain = registry.key_notify_chain(event, false);

        assert_eq!(global_chain.targets()[0].address.path, "/g");
        assert_eq!(toolkit_chain.targets()[0].address.path, "/t");
        assert_eq!(global_chain.targets().len(), 1);
    }

    #[tokio::test]
    async fn test_mouse_listeners_are_all_notified() {
        let mut registry = Registry::headless();
        registry.register_device_listener(addr("/m1"), 0);
        registry.register_device_listener(addr("/m2"), DeviceEventKind::ButtonPressed.mask_bit());
        registry.register_device_listener(addr("/m3"), DeviceEventKind::ButtonReleased.mask_bit());
        let transport = RecordingTransport::new();
        transport.consume_at("/m2");

        let event = DeviceEvent::button(1, true, 0);
        let targets = registry.mouse_targets(&event);
        let consumed = notify_mouse_listeners(targets, event, &*transport).await;

        assert!(consumed);
        assert_eq!(transport.notified(), vec!["/m2", "/m1"]);
    }

    #[test]
    fn test_device_listener_arms_polling() {
        let mut registry = Registry::headless();
        registry.register_device_listener(addr("/m"), 0);
        assert!(registry.take_poll_start());

        registry.deregister_device_listener(&addr("/m"), 0);
        assert!(!registry.poller().has_demand());
    }

    #[test]
    fn test_keysym_synthesis_locks_modifiers() {
        let platform = Arc::new(RecordingPlatform::default());
        let registry = registry_with(&platform);

        registry.generate_keyboard_event(0x41, "", KeySynthType::Sym).unwrap();

        assert_eq!(
            platform.calls(),
            vec![
                PlatformCall::Lock(1),
                PlatformCall::Press(0x49),
                PlatformCall::Release(0x49),
                PlatformCall::Unlock(1),
            ]
        );
    }

    #[test]
    fn test_press_release_synthesis() {
        let platform = Arc::new(RecordingPlatform::default());
        let registry = registry_with(&platform);

        registry.generate_keyboard_event(38, "", KeySynthType::PressRelease).unwrap();
        registry.generate_keyboard_event(0, "hi", KeySynthType::String).unwrap();

        assert_eq!(
            platform.calls(),
            vec![
                PlatformCall::Press(38),
                PlatformCall::Release(38),
                PlatformCall::Keystring("hi".into())
            ]
        );
        assert!(registry.generate_keyboard_event(-1, "", KeySynthType::Press).is_err());
    }

    #[test]
    fn test_remove_device_listeners_of_releases_grabs() {
        let platform = Arc::new(RecordingPlatform::default());
        let mut registry = registry_with(&platform);
        registry.register_keystroke_listener(addr("/a"), KeySet::new(), 0, 0, global());
        registry.register_device_listener(addr("/m"), 0);

        registry.remove_device_listeners_of(":1.40");

        assert!(registry.listeners().key_listeners().is_empty());
        assert!(!registry.listeners().has_mouse_listeners());
        assert_eq!(platform.ungrab_calls(), 1);
    }
}
