//! Pointer polling.
//!
//! When the backend cannot report pointer motion natively, the registry
//! samples the pointer on a timer while anybody listens for mouse input:
//! slowly while the pointer rests, quickly while it moves. Each tick turns
//! the sample into modifier-change, motion and button events.

use std::time::Duration;

use serde::Serialize;

use super::Registry;
use super::event_type::EventType;
use super::platform::PointerSample;
use super::types::{AccessibleEvent, DeviceEvent, keymask};

/// Buttons tracked by the poller, with their mask bit.
const BUTTONS: [(i32, u32); 5] = [
    (1, keymask::BUTTON1),
    (2, keymask::BUTTON2),
    (3, keymask::BUTTON3),
    (4, keymask::BUTTON4),
    (5, keymask::BUTTON5),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub enabled: bool,
    pub idle_interval: Duration,
    pub moving_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_interval: Duration::from_millis(100),
            moving_interval: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PollPhase {
    #[default]
    Idle,
    Moving,
}

/// Result of one poll tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollTick {
    /// Delay until the next tick; `None` stops polling.
    pub next: Option<Duration>,
    /// Previous and current modifier mask, when a keyboard modifier changed.
    pub modifiers_changed: Option<(u32, u32)>,
    pub moved_to: Option<(i32, i32)>,
    /// Buttons whose state changed, with their new state.
    pub buttons: Vec<(i32, bool)>,
}

#[derive(Debug, Default)]
pub struct MousePoller {
    settings: PollSettings,
    running: bool,
    phase: PollPhase,
    last_modifiers: u32,
    event_demand: bool,
    listener_demand: bool,
}

impl MousePoller {
    #[must_use]
    pub fn new(settings: PollSettings) -> Self { Self { settings, ..Self::default() } }

    /// Records who needs polling. Returns `true` when a ticker must be
    /// started because demand appeared while polling was stopped.
    pub fn set_demand(&mut self, event_demand: bool, listener_demand: bool) -> bool {
        self.event_demand = event_demand;
        self.listener_demand = listener_demand;

        if self.settings.enabled && self.has_demand() && !self.running {
            self.running = true;
            self.phase = PollPhase::Idle;
            return true;
        }
        false
    }

    #[must_use]
    pub const fn has_demand(&self) -> bool { self.event_demand || self.listener_demand }

    #[must_use]
    pub const fn is_running(&self) -> bool { self.running }

    #[must_use]
    pub const fn phase(&self) -> PollPhase { self.phase }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        match self.phase {
            PollPhase::Idle => self.settings.idle_interval,
            PollPhase::Moving => self.settings.moving_interval,
        }
    }

    /// Processes one sample and schedules the next tick.
    pub fn on_tick(&mut self, sample: Option<PointerSample>) -> PollTick {
        if !self.has_demand() {
            tracing::debug!("poll: no mouse listeners left, stopping");
            self.stop();
            return PollTick::default();
        }

        let Some(sample) = sample else {
            tracing::debug!("poll: pointer unavailable, stopping");
            self.stop();
            return PollTick::default();
        };

        let previous = self.last_modifiers;
        self.last_modifiers = sample.modifiers;

        let modifiers_changed = ((previous ^ sample.modifiers) & keymask::KEY_MODIFIERS != 0)
            .then_some((previous, sample.modifiers));

        let buttons = BUTTONS
            .iter()
            .filter(|(_, bit)| (previous ^ sample.modifiers) & bit != 0)
            .map(|(button, bit)| (*button, sample.modifiers & bit != 0))
            .collect();

        self.phase = match (self.phase, sample.moved) {
            (PollPhase::Idle, true) => PollPhase::Moving,
            (PollPhase::Moving, false) => PollPhase::Idle,
            (phase, _) => phase,
        };

        PollTick {
            next: Some(self.interval()),
            modifiers_changed,
            moved_to: sample.moved.then_some((sample.x, sample.y)),
            buttons,
        }
    }

    fn stop(&mut self) {
        self.running = false;
        self.phase = PollPhase::Idle;
    }
}

/// What the registry must deliver after a poll tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    pub next: Option<Duration>,
    /// Accessibility events for event subscribers.
    pub events: Vec<AccessibleEvent>,
    /// Button events for mouse listeners.
    pub device_events: Vec<DeviceEvent>,
}

impl Registry {
    /// Re-evaluates polling demand after listener changes.
    pub(crate) fn update_poll_demand(&mut self) {
        let event_demand = self.listeners.wants_mouse_events();
        let listener_demand = self.listeners.has_mouse_listeners();
        if self.poller.set_demand(event_demand, listener_demand) {
            tracing::debug!("poll: mouse listeners present, starting");
            self.poll_start_requested = true;
        }
    }

    /// Takes the pending request to start the poll ticker.
    pub fn take_poll_start(&mut self) -> bool { std::mem::take(&mut self.poll_start_requested) }

    /// Samples the pointer once and turns the sample into events.
    pub fn poll_mouse(&mut self) -> PollOutcome {
        let sample = self.platform.pointer_sample();
        let tick = self.poller.on_tick(sample);
        let source = self.root_reference();
        let mut outcome = PollOutcome { next: tick.next, ..PollOutcome::default() };

        if let Some((previous, current)) = tick.modifiers_changed {
            outcome.events.push(
                AccessibleEvent::new(EventType::from_signal("Keyboard", "Modifiers", ""), source.clone())
                    .with_details(as_detail(previous), as_detail(current)),
            );
        }

        let (x, y) = sample.map(|s| (s.x, s.y)).unwrap_or_default();
        let modifiers = sample.map(|s| s.modifiers).unwrap_or_default();

        for (button, pressed) in tick.buttons {
            let minor = format!("b{button}{}", if pressed { 'p' } else { 'r' });
            outcome.events.push(
                AccessibleEvent::new(EventType::from_signal("Mouse", "Button", &minor), source.clone())
                    .with_details(x, y),
            );
            outcome.device_events.push(DeviceEvent::button(button, pressed, modifiers));
        }

        if let Some((x, y)) = tick.moved_to {
            outcome.events.push(
                AccessibleEvent::new(EventType::from_signal("Mouse", "Abs", ""), source)
                    .with_details(x, y),
            );
        }

        outcome
    }
}

fn as_detail(mask: u32) -> i32 { i32::try_from(mask).unwrap_or(i32::MAX) }

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: i32, y: i32, modifiers: u32, moved: bool) -> Option<PointerSample> {
        Some(PointerSample { x, y, modifiers, moved })
    }

    fn running_poller() -> MousePoller {
        let mut poller = MousePoller::new(PollSettings::default());
        assert!(poller.set_demand(false, true));
        poller
    }

    #[test]
    fn test_set_demand_starts_once() {
        let mut poller = MousePoller::new(PollSettings::default());
        assert!(!poller.set_demand(false, false));
        assert!(poller.set_demand(true, false));
        assert!(!poller.set_demand(true, true));
        assert!(poller.is_running());
    }

    #[test]
    fn test_disabled_poller_never_starts() {
        let mut poller =
            MousePoller::new(PollSettings { enabled: false, ..PollSettings::default() });
        assert!(!poller.set_demand(true, true));
    }

    #[test]
    fn test_phase_switches_with_motion() {
        let mut poller = running_poller();

        let tick = poller.on_tick(sample(0, 0, 0, false));
        assert_eq!(tick.next, Some(Duration::from_millis(100)));

        let tick = poller.on_tick(sample(5, 5, 0, true));
        assert_eq!(poller.phase(), PollPhase::Moving);
        assert_eq!(tick.next, Some(Duration::from_millis(20)));
        assert_eq!(tick.moved_to, Some((5, 5)));

        let tick = poller.on_tick(sample(5, 5, 0, false));
        assert_eq!(poller.phase(), PollPhase::Idle);
        assert_eq!(tick.next, Some(Duration::from_millis(100)));
        assert!(tick.moved_to.is_none());
    }

    #[test]
    fn test_stops_without_demand() {
        let mut poller = running_poller();
        poller.set_demand(false, false);

        let tick = poller.on_tick(sample(0, 0, 0, true));
        assert!(tick.next.is_none());
        assert!(!poller.is_running());
        assert!(poller.set_demand(false, true));
    }

    #[test]
    fn test_modifier_change_reported_once() {
        let mut poller = running_poller();

        let tick = poller.on_tick(sample(0, 0, keymask::SHIFT, false));
        assert_eq!(tick.modifiers_changed, Some((0, keymask::SHIFT)));

        let tick = poller.on_tick(sample(0, 0, keymask::SHIFT, false));
        assert!(tick.modifiers_changed.is_none());
    }

    #[test]
    fn test_button_bits_are_not_modifier_changes() {
        let mut poller = running_poller();

        let tick = poller.on_tick(sample(0, 0, keymask::BUTTON1, false));
        assert!(tick.modifiers_changed.is_none());
        assert_eq!(tick.buttons, vec![(1, true)]);

        let tick = poller.on_tick(sample(0, 0, 0, false));
        assert_eq!(tick.buttons, vec![(1, false)]);
    }

    #[test]
    fn test_missing_sample_stops_polling() {
        let mut poller = running_poller();
        assert!(poller.on_tick(None).next.is_none());
        assert!(!poller.is_running());
    }
}
