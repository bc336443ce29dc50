//! Reference-counted global key grabs.
//!
//! Global key listeners need the windowing system to route their keys to
//! the registry before the focused application sees them. Each distinct
//! (modifier mask, keycode) pair is grabbed once and shared between every
//! listener asking for it. Registration only marks transitions as pending;
//! [`KeygrabCoordinator::reconcile`] applies them to the platform.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::listeners::ListenerId;
use super::platform::DevicePlatform;
use super::types::{DeviceEvent, KeyDefinition};

/// Keycode of the "any key" grab used by listeners with an empty key set.
pub const ANY_KEY: u32 = 0;

/// One shared grab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrabMask {
    pub mod_mask: u32,
    pub key_code: u32,
    pub ref_count: u32,
    pub pending_add: bool,
    pub pending_remove: bool,
}

impl GrabMask {
    const fn is(&self, mod_mask: u32, key_code: u32) -> bool {
        self.mod_mask == mod_mask && self.key_code == key_code
    }
}

#[derive(Debug, Default)]
pub struct KeygrabCoordinator {
    masks: Vec<GrabMask>,
    /// (mod_mask, key_code) references each listener holds.
    held: HashMap<ListenerId, Vec<(u32, u32)>>,
}

impl KeygrabCoordinator {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn masks(&self) -> &[GrabMask] { &self.masks }

    #[must_use]
    pub fn find(&self, mod_mask: u32, key_code: u32) -> Option<&GrabMask> {
        self.masks.iter().find(|m| m.is(mod_mask, key_code))
    }

    /// References currently held by `owner`.
    #[must_use]
    pub fn held_by(&self, owner: ListenerId) -> &[(u32, u32)] {
        self.held.get(&owner).map_or(&[][..], Vec::as_slice)
    }

    /// Takes one reference on behalf of `owner` on the grab of every key in
    /// `keys`, or on the any-key grab when `keys` is empty.
    pub fn register(
        &mut self,
        owner: ListenerId,
        mod_mask: u32,
        keys: &[KeyDefinition],
        platform: &dyn DevicePlatform,
    ) {
        for key_code in grab_keycodes(keys, platform) {
            self.add_ref(mod_mask, key_code);
            self.held.entry(owner).or_default().push((mod_mask, key_code));
        }
    }

    /// Releases every reference `owner` still holds. References lost to a
    /// refused grab are not released again.
    pub fn deregister(&mut self, owner: ListenerId) {
        for (mod_mask, key_code) in self.held.remove(&owner).unwrap_or_default() {
            self.release_ref(mod_mask, key_code);
        }
    }

    fn add_ref(&mut self, mod_mask: u32, key_code: u32) {
        if let Some(mask) = self.masks.iter_mut().find(|m| m.is(mod_mask, key_code)) {
            mask.ref_count += 1;
            // Re-registered before the ungrab went out: keep the grab.
            mask.pending_remove = false;
            return;
        }

        self.masks.push(GrabMask {
            mod_mask,
            key_code,
            ref_count: 1,
            pending_add: true,
            pending_remove: false,
        });
    }

    fn release_ref(&mut self, mod_mask: u32, key_code: u32) {
        let Some(mask) = self.masks.iter_mut().find(|m| m.is(mod_mask, key_code)) else {
            tracing::debug!(mod_mask, key_code, "dec: no grab to release");
            return;
        };

        mask.ref_count = mask.ref_count.saturating_sub(1);
        if mask.ref_count == 0 {
            mask.pending_remove = true;
        }
    }

    /// Applies pending transitions to the platform.
    ///
    /// With `trigger` set, masks whose modifiers intersect the event's and
    /// whose keycode is the event's key are grabbed again, recovering
    /// grabs the windowing system dropped. Returns `true` if any grab
    /// failed; failed masks are discarded along with every reference held
    /// on them.
    pub fn reconcile(&mut self, platform: &dyn DevicePlatform, trigger: Option<&DeviceEvent>) -> bool {
        let trigger_key = trigger.map(|ev| (ev.modifiers, platform.keycode_for(ev.id, "")));
        let mut refused = Vec::new();

        self.masks.retain_mut(|mask| {
            if mask.pending_add && mask.pending_remove {
                return false;
            }

            if mask.pending_remove {
                platform.ungrab_key(mask.key_code, mask.mod_mask);
                return false;
            }

            let reissue = trigger_key.is_some_and(|(modifiers, key_code)| {
                modifiers & mask.mod_mask != 0 && key_code == mask.key_code
            });

            if (mask.pending_add || reissue) && !platform.grab_key(mask.key_code, mask.mod_mask) {
                tracing::warn!(
                    mod_mask = mask.mod_mask,
                    key_code = mask.key_code,
                    "dec: key grab refused, dropping mask"
                );
                mask.ref_count = 0;
                refused.push((mask.mod_mask, mask.key_code));
                return false;
            }

            mask.pending_add = false;
            mask.pending_remove = false;
            true
        });

        if !refused.is_empty() {
            for references in self.held.values_mut() {
                references.retain(|reference| !refused.contains(reference));
            }
            self.held.retain(|_, references| !references.is_empty());
        }
        !refused.is_empty()
    }
}

/// Keycodes to grab for a key set.
fn grab_keycodes(keys: &[KeyDefinition], platform: &dyn DevicePlatform) -> Vec<u32> {
    if keys.is_empty() {
        return vec![ANY_KEY];
    }

    keys.iter()
        .map(|key| {
            let resolved = platform.keycode_for(key.keysym, &key.keystring);
            if resolved == 0 { u32::try_from(key.keycode).unwrap_or(ANY_KEY) } else { resolved }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::platform::fake::RecordingPlatform;
    use crate::registry::types::keymask;

    #[test]
    fn test_refcount_shares_one_grab() {
        let platform = RecordingPlatform::default();
        let mut grabs = KeygrabCoordinator::new();

        grabs.register(1, 0, &[], &platform);
        assert!(!grabs.reconcile(&platform, None));
        grabs.register(2, 0, &[], &platform);
        assert!(!grabs.reconcile(&platform, None));

        let mask = grabs.find(0, ANY_KEY).unwrap();
        assert_eq!(mask.ref_count, 2);
        assert_eq!(platform.grab_calls(), 1);

        grabs.deregister(1);
        grabs.reconcile(&platform, None);
        assert_eq!(grabs.find(0, ANY_KEY).unwrap().ref_count, 1);
        assert_eq!(platform.ungrab_calls(), 0);

        grabs.deregister(2);
        grabs.reconcile(&platform, None);
        assert!(grabs.find(0, ANY_KEY).is_none());
        assert_eq!(platform.ungrab_calls(), 1);
    }

    #[test]
    fn test_grabbed_iff_more_registrations_than_deregistrations() {
        for (n, m) in [(1, 0), (3, 1), (2, 2), (4, 5)] {
            let platform = RecordingPlatform::default();
            let mut grabs = KeygrabCoordinator::new();
            let keys = [KeyDefinition::keysym(0x61)];

            for owner in 0..n {
                grabs.register(owner, keymask::CONTROL, &keys, &platform);
                grabs.reconcile(&platform, None);
            }
            for owner in 0..m {
                grabs.deregister(owner);
                grabs.reconcile(&platform, None);
            }

            assert_eq!(grabs.find(keymask::CONTROL, 0x61 + 8).is_some(), n > m, "n={n} m={m}");
        }
    }

    #[test]
    fn test_add_and_remove_in_same_window_never_touches_platform() {
        let platform = RecordingPlatform::default();
        let mut grabs = KeygrabCoordinator::new();

        grabs.register(1, 0, &[], &platform);
        grabs.deregister(1);
        assert!(!grabs.reconcile(&platform, None));

        assert!(grabs.masks().is_empty());
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_failed_grab_drops_mask() {
        let platform = RecordingPlatform::default();
        platform.refuse(ANY_KEY, keymask::MOD1);
        let mut grabs = KeygrabCoordinator::new();

        grabs.register(1, keymask::MOD1, &[], &platform);
        grabs.register(2, 0, &[], &platform);

        assert!(grabs.reconcile(&platform, None));
        assert!(grabs.find(keymask::MOD1, ANY_KEY).is_none());
        assert!(grabs.find(0, ANY_KEY).is_some());
        assert!(grabs.held_by(1).is_empty());
        assert_eq!(grabs.held_by(2), &[(0, ANY_KEY)]);
    }

    #[test]
    fn test_refused_reference_is_not_released_from_a_later_grab() {
        let platform = RecordingPlatform::default();
        platform.refuse(ANY_KEY, keymask::MOD1);
        let mut grabs = KeygrabCoordinator::new();

        grabs.register(1, keymask::MOD1, &[], &platform);
        assert!(grabs.reconcile(&platform, None));

        platform.allow(ANY_KEY, keymask::MOD1);
        grabs.register(2, keymask::MOD1, &[], &platform);
        assert!(!grabs.reconcile(&platform, None));

        grabs.deregister(1);
        grabs.reconcile(&platform, None);

        assert_eq!(grabs.find(keymask::MOD1, ANY_KEY).map(|m| m.ref_count), Some(1));
        assert_eq!(platform.ungrab_calls(), 0);
    }

    #[test]
    fn test_trigger_reissues_matching_grab() {
        let platform = RecordingPlatform::default();
        let mut grabs = KeygrabCoordinator::new();
        let keys = [KeyDefinition::keysym(0x61)];

        grabs.register(1, keymask::CONTROL, &keys, &platform);
        grabs.reconcile(&platform, None);
        assert_eq!(platform.grab_calls(), 1);

        let event = DeviceEvent::key_pressed(0x61, 0x69, keymask::CONTROL);
        grabs.reconcile(&platform, Some(&event));
        assert_eq!(platform.grab_calls(), 2);

        let unrelated = DeviceEvent::key_pressed(0x62, 0x6a, keymask::CONTROL);
        grabs.reconcile(&platform, Some(&unrelated));
        assert_eq!(platform.grab_calls(), 2);
    }

    #[test]
    fn test_reconcile_clears_pending_flags() {
        let platform = RecordingPlatform::default();
        let mut grabs = KeygrabCoordinator::new();
        grabs.register(1, 0, &[], &platform);
        grabs.reconcile(&platform, None);

        let mask = grabs.find(0, ANY_KEY).unwrap();
        assert!(!mask.pending_add);
        assert!(!mask.pending_remove);
    }

    #[test]
    fn test_keystring_keys_resolve_through_platform() {
        let platform = RecordingPlatform::default();
        let mut grabs = KeygrabCoordinator::new();
        grabs.register(1, 0, &[KeyDefinition::keystring("q")], &platform);
        assert!(grabs.find(0, u32::from(b'q')).is_some());
    }
}
