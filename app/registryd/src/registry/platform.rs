//! Seam to the platform input backend (key grabs, keymap lookups, pointer
//! sampling and input synthesis).
//!
//! Every method has a conservative default so a backend only overrides
//! what its windowing system supports. [`NullPlatform`] keeps all of the
//! defaults and is what the daemon runs with when no backend is attached.

/// One pointer sample taken by the mouse poller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerSample {
    pub x: i32,
    pub y: i32,
    /// Current modifier and button mask.
    pub modifiers: u32,
    /// Whether the pointer moved since the previous sample.
    pub moved: bool,
}

/// Platform input backend.
pub trait DevicePlatform: Send + Sync {
    /// Grabs `keycode` (0 for any key) with modifier mask `modifiers`.
    /// Returns `false` when the windowing system refused the grab.
    fn grab_key(&self, _keycode: u32, _modifiers: u32) -> bool { true }

    fn ungrab_key(&self, _keycode: u32, _modifiers: u32) {}

    /// Hardware keycode producing `keysym`, or the first character of
    /// `keystring` when non-empty. 0 when unknown.
    fn keycode_for(&self, _keysym: i32, _keystring: &str) -> u32 { 0 }

    /// Keycode and modifier mask needed to type `keysym`.
    fn resolve_keysym(&self, _keysym: i32) -> Option<(u32, u32)> { None }

    /// Samples the pointer. `None` when the backend cannot report it.
    fn pointer_sample(&self) -> Option<PointerSample> { None }

    fn synth_key_press(&self, _keycode: u32) -> bool { false }

    fn synth_key_release(&self, _keycode: u32) -> bool { false }

    /// Types `text`. Returns `false` if any character could not be typed.
    fn synth_keystring(&self, _text: &str) -> bool { false }

    fn lock_modifiers(&self, _modifiers: u32) {}

    fn unlock_modifiers(&self, _modifiers: u32) {}

    /// Synthesizes a pointer event such as `b1c` or `abs`.
    fn generate_mouse_event(&self, _x: i32, _y: i32, _event_name: &str) {}
}

/// Backend used when no input backend is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlatform;

impl DevicePlatform for NullPlatform {}

#[cfg(test)]
pub(crate) mod fake {
    //! Recording backend for tests.

    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::{DevicePlatform, PointerSample};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PlatformCall {
        Grab(u32, u32),
        Ungrab(u32, u32),
        Press(u32),
        Release(u32),
        Keystring(String),
        Lock(u32),
        Unlock(u32),
        Mouse(i32, i32, String),
    }

    #[derive(Debug, Default)]
    pub struct RecordingPlatform {
        pub calls: Mutex<Vec<PlatformCall>>,
        /// Grabs of these (keycode, modifiers) pairs fail.
        pub refused: Mutex<Vec<(u32, u32)>>,
        pub samples: Mutex<VecDeque<PointerSample>>,
    }

    impl RecordingPlatform {
        pub fn calls(&self) -> Vec<PlatformCall> { self.calls.lock().clone() }

        pub fn grab_calls(&self) -> usize {
            self.calls.lock().iter().filter(|c| matches!(c, PlatformCall::Grab(..))).count()
        }

        pub fn ungrab_calls(&self) -> usize {
            self.calls.lock().iter().filter(|c| matches!(c, PlatformCall::Ungrab(..))).count()
        }

        pub fn refuse(&self, keycode: u32, modifiers: u32) {
            self.refused.lock().push((keycode, modifiers));
        }

        pub fn allow(&self, keycode: u32, modifiers: u32) {
            self.refused.lock().retain(|refused| *refused != (keycode, modifiers));
        }
    }

    impl DevicePlatform for RecordingPlatform {
        fn grab_key(&self, keycode: u32, modifiers: u32) -> bool {
            self.calls.lock().push(PlatformCall::Grab(keycode, modifiers));
            !self.refused.lock().contains(&(keycode, modifiers))
        }

        fn ungrab_key(&self, keycode: u32, modifiers: u32) {
            self.calls.lock().push(PlatformCall::Ungrab(keycode, modifiers));
        }

        // Keysyms map to keycode `keysym + 8`, strings to their first byte.
        fn keycode_for(&self, keysym: i32, keystring: &str) -> u32 {
            if let Some(byte) = keystring.bytes().next() {
                return u32::from(byte);
            }
            u32::try_from(keysym).map_or(0, |sym| sym + 8)
        }

        fn resolve_keysym(&self, keysym: i32) -> Option<(u32, u32)> {
            let keycode = u32::try_from(keysym).ok()? + 8;
            Some((keycode, u32::from((0x41..=0x5a).contains(&keysym))))
        }

        fn pointer_sample(&self) -> Option<PointerSample> { self.samples.lock().pop_front() }

        fn synth_key_press(&self, keycode: u32) -> bool {
            self.calls.lock().push(PlatformCall::Press(keycode));
            true
        }

        fn synth_key_release(&self, keycode: u32) -> bool {
            self.calls.lock().push(PlatformCall::Release(keycode));
            true
        }

        fn synth_keystring(&self, text: &str) -> bool {
            self.calls.lock().push(PlatformCall::Keystring(text.to_string()));
            !text.is_empty()
        }

        fn lock_modifiers(&self, modifiers: u32) {
            self.calls.lock().push(PlatformCall::Lock(modifiers));
        }

        fn unlock_modifiers(&self, modifiers: u32) {
            self.calls.lock().push(PlatformCall::Unlock(modifiers));
        }

        fn generate_mouse_event(&self, x: i32, y: i32, event_name: &str) {
            self.calls.lock().push(PlatformCall::Mouse(x, y, event_name.to_string()));
        }
    }
}
