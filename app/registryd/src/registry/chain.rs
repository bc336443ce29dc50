//! Ordered, short-circuiting key event delivery.
//!
//! A [`KeyNotifyChain`] is the list of listeners a key event goes to plus a
//! cursor. Each completed remote call advances the cursor by one; delivery
//! ends after the last listener or at the first preemptive listener that
//! consumed the event. The same chain is driven inline by [`run_chain`] and
//! one message at a time by the registry actor.

use super::listeners::ListenerId;
use super::transport::ListenerTransport;
use super::types::{DeviceEvent, ObjectRef};

/// One listener in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTarget {
    pub listener: ListenerId,
    pub address: ObjectRef,
    pub preemptive: bool,
}

#[derive(Debug, Clone)]
pub struct KeyNotifyChain {
    event: DeviceEvent,
    targets: Vec<ChainTarget>,
    cursor: usize,
    consumed: bool,
    is_system_global: bool,
}

impl KeyNotifyChain {
    #[must_use]
    pub const fn new(event: DeviceEvent, targets: Vec<ChainTarget>, is_system_global: bool) -> Self {
        Self { event, targets, cursor: 0, consumed: false, is_system_global }
    }

    #[must_use]
    pub const fn event(&self) -> &DeviceEvent { &self.event }

    #[must_use]
    pub const fn is_system_global(&self) -> bool { self.is_system_global }

    #[must_use]
    pub fn targets(&self) -> &[ChainTarget] { &self.targets }

    /// Listener to notify next, `None` once delivery is over.
    #[must_use]
    pub fn next_target(&self) -> Option<&ChainTarget> {
        if self.consumed { None } else { self.targets.get(self.cursor) }
    }

    /// Records the reply of the current target and advances.
    ///
    /// Consumption only stops the chain when the target is preemptive.
    pub fn complete_step(&mut self, consumed: bool) {
        let Some(target) = self.targets.get(self.cursor) else { return };
        if consumed && target.preemptive {
            self.consumed = true;
        }
        self.cursor += 1;
    }

    /// Passes over the current target without notifying it.
    pub fn skip(&mut self) {
        if self.cursor < self.targets.len() {
            self.cursor += 1;
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool { self.next_target().is_none() }

    #[must_use]
    pub const fn consumed(&self) -> bool { self.consumed }

    /// Number of targets that were notified or skipped so far.
    #[must_use]
    pub const fn position(&self) -> usize { self.cursor }
}

/// Drives `chain` to completion, awaiting each listener in turn.
///
/// A failed call counts as "not consumed". Returns whether the event was
/// consumed.
pub async fn run_chain(mut chain: KeyNotifyChain, transport: &dyn ListenerTransport) -> bool {
    while let Some(target) = chain.next_target().cloned() {
        let consumed = match transport.notify_device_event(&target.address, chain.event()).await {
            Ok(consumed) => consumed,
            Err(err) => {
                tracing::debug!(error = %err, listener = %target.address, "dec: listener notification failed");
                false
            }
        };
        chain.complete_step(consumed);
    }

    chain.consumed()
}
