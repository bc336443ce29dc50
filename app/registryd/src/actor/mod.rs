//! Registry actor.
//!
//! The actor owns the [`Registry`] and processes messages sequentially, so
//! registry state is never shared between tasks. Remote calls (listener
//! notifications, event deliveries) run in spawned tasks; their results
//! come back as messages.
//!
//! # Key notification chains
//!
//! A key event is offered to its listeners one at a time. The actor keeps
//! each in-flight chain by id, issues one call, and advances the chain when
//! the [`RegistryMessage::ChainStepCompleted`] for that call arrives. Other
//! messages are processed in between, so a listener may be deregistered
//! while a chain is waiting; every step re-checks that its target is still
//! registered.
//!
//! # Panic Recovery
//!
//! If a message handler panics the panic is caught and logged, and the
//! actor continues with the next message.

mod handle;
pub mod handlers;
mod messages;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

pub use handle::{ActorError, RegistryHandle};
pub use messages::{ChainId, QueryResult, RegistryMessage, RegistryQuery};
use tokio::sync::{mpsc, oneshot};

use crate::registry::{KeyNotifyChain, ListenerTransport, Registry};

/// Channel buffer size for the registry actor.
const CHANNEL_BUFFER_SIZE: usize = 256;

/// A key notification chain waiting for a listener reply.
struct PendingChain {
    chain: KeyNotifyChain,
    respond_to: Option<oneshot::Sender<bool>>,
}

/// The actor that owns all registry state.
pub struct RegistryActor {
    registry: Registry,

    transport: Arc<dyn ListenerTransport>,

    /// Receiver for incoming messages.
    receiver: mpsc::Receiver<RegistryMessage>,

    /// Sender handed to spawned tasks. Weak so the actor stops once every
    /// handle is gone.
    sender: mpsc::WeakSender<RegistryMessage>,

    chains: HashMap<ChainId, PendingChain>,
    next_chain: ChainId,
}

impl RegistryActor {
    /// Spawn a new registry actor and return a handle for communication.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(registry: Registry, transport: Arc<dyn ListenerTransport>) -> RegistryHandle {
        tracing::debug!("registry: spawning registry actor");
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let actor = Self {
            registry,
            transport,
            receiver,
            sender: sender.downgrade(),
            chains: HashMap::new(),
            next_chain: 1,
        };

        tokio::spawn(actor.run());

        RegistryHandle::new(sender)
    }

    /// Run the actor's message loop.
    async fn run(mut self) {
        tracing::trace!("registry: actor message loop starting");

        while let Some(msg) = self.receiver.recv().await {
            if matches!(msg, RegistryMessage::Shutdown) {
                tracing::debug!("registry: actor received shutdown message");
                break;
            }

            let msg_name = msg.name();
            let result = catch_unwind(AssertUnwindSafe(|| {
                self.handle_message(msg);
                if self.registry.take_poll_start() {
                    self.start_poll_ticker();
                }
            }));

            if let Err(panic_info) = result {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());

                tracing::error!("registry: PANIC in actor while handling '{msg_name}': {panic_msg}");
                tracing::error!(
                    "registry: actor recovered from panic - state may be inconsistent"
                );
            }
        }

        self.abandon_chains();
        tracing::debug!("registry: actor stopped");
    }

    /// Handle a single message.
    fn handle_message(&mut self, msg: RegistryMessage) {
        match msg {
            // Applications
            RegistryMessage::Embed { application, respond_to } => {
                let embedded = handlers::on_embed(&mut self.registry, &self.transport, application);
                if respond_to.send(embedded).is_err() {
                    tracing::warn!("registry: failed to send embed response - receiver dropped");
                }
            }
            RegistryMessage::Unembed { application } => {
                handlers::on_unembed(&mut self.registry, &application);
            }
            RegistryMessage::NameVanished { name } => {
                handlers::on_name_vanished(&mut self.registry, &name);
            }
            RegistryMessage::SetBusName { name } => {
                tracing::debug!(name, "registry: bus name set");
                self.registry.set_bus_name(name);
            }

            // Event subscriptions
            RegistryMessage::RegisterEvent { subscriber, event_type, properties, respond_to } => {
                let result = handlers::on_register_event(
                    &mut self.registry,
                    &subscriber,
                    &event_type,
                    properties,
                );
                let _ = respond_to.send(result);
            }
            RegistryMessage::DeregisterEvent { subscriber, event_type, respond_to } => {
                let result =
                    handlers::on_deregister_event(&mut self.registry, &subscriber, &event_type);
                let _ = respond_to.send(result);
            }
            RegistryMessage::DispatchEvent(event) => {
                handlers::on_dispatch_event(&self.registry, &self.transport, &event);
            }

            // Device listeners
            RegistryMessage::RegisterKeystrokeListener {
                address,
                keys,
                mask,
                types,
                mode,
                respond_to,
            } => {
                let granted = handlers::on_register_keystroke_listener(
                    &mut self.registry,
                    address,
                    keys,
                    mask,
                    types,
                    mode,
                );
                let _ = respond_to.send(granted);
            }
            RegistryMessage::DeregisterKeystrokeListener { address, keys, mask, types } => {
                handlers::on_deregister_keystroke_listener(
                    &mut self.registry,
                    &address,
                    &keys,
                    mask,
                    types,
                );
            }
            RegistryMessage::RegisterDeviceListener { address, types, respond_to } => {
                let registered =
                    handlers::on_register_device_listener(&mut self.registry, address, types);
                let _ = respond_to.send(registered);
            }
            RegistryMessage::DeregisterDeviceListener { address, types } => {
                handlers::on_deregister_device_listener(&mut self.registry, &address, types);
            }

            // Raw input
            RegistryMessage::NotifyListeners { event, is_system_global, respond_to } => {
                if event.kind.is_key() {
                    let chain = self.registry.key_notify_chain(event, is_system_global);
                    self.start_chain(chain, respond_to);
                } else {
                    handlers::on_notify_mouse_listeners(
                        &self.registry,
                        &self.transport,
                        event,
                        respond_to,
                    );
                }
            }
            RegistryMessage::ChainStepCompleted { chain, consumed } => {
                if let Some(pending) = self.chains.get_mut(&chain) {
                    pending.chain.complete_step(consumed);
                    self.advance_chain(chain);
                } else {
                    tracing::debug!(chain, "dec: reply for unknown notification chain");
                }
            }

            // Synthesis
            RegistryMessage::GenerateKeyboardEvent { keycode, keystring, synth, respond_to } => {
                let result =
                    handlers::on_generate_keyboard_event(&self.registry, keycode, &keystring, synth);
                let _ = respond_to.send(result);
            }
            RegistryMessage::GenerateMouseEvent { x, y, event_name } => {
                handlers::on_generate_mouse_event(&self.registry, x, y, &event_name);
            }

            RegistryMessage::MousePollTick { respond_to } => {
                let next = handlers::on_mouse_poll_tick(&mut self.registry, &self.transport);
                let _ = respond_to.send(next);
            }

            RegistryMessage::Query { query, respond_to } => {
                let result = self.execute_query(query);
                if respond_to.send(result).is_err() {
                    tracing::warn!("registry: failed to send query response - receiver dropped");
                }
            }

            // Handled in run()
            RegistryMessage::Shutdown => {}
        }
    }

    /// Execute a query and return the result.
    fn execute_query(&self, query: RegistryQuery) -> QueryResult {
        let registry = &self.registry;
        match query {
            RegistryQuery::Applications => {
                QueryResult::Applications(registry.apps().iter().cloned().collect())
            }
            RegistryQuery::ChildAtIndex { index } => {
                QueryResult::Child(registry.child_at_index(index))
            }
            RegistryQuery::ChildCount => QueryResult::ChildCount(registry.apps().child_count()),
            RegistryQuery::RegisteredEvents => {
                QueryResult::RegisteredEvents(registry.registered_events())
            }
            RegistryQuery::EventListeners => {
                QueryResult::EventListeners(registry.listeners().event_listeners().to_vec())
            }
            RegistryQuery::KeystrokeListeners => {
                QueryResult::KeystrokeListeners(registry.listeners().key_listeners().to_vec())
            }
            RegistryQuery::DeviceListeners => {
                QueryResult::DeviceListeners(registry.listeners().mouse_listeners().to_vec())
            }
            RegistryQuery::GrabMasks => QueryResult::GrabMasks(registry.grabs().masks().to_vec()),
            RegistryQuery::Status => QueryResult::Status(registry.status()),
        }
    }

    // ========================================================================
    // Key notification chains
    // ========================================================================

    fn start_chain(&mut self, chain: KeyNotifyChain, respond_to: Option<oneshot::Sender<bool>>) {
        let id = self.next_chain;
        self.next_chain = self.next_chain.wrapping_add(1);

        tracing::trace!(chain = id, targets = chain.targets().len(), "dec: starting key notification chain");
        self.chains.insert(id, PendingChain { chain, respond_to });
        self.advance_chain(id);
    }

    /// Issues the next call of chain `id`, or finishes it.
    fn advance_chain(&mut self, id: ChainId) {
        loop {
            let Some(pending) = self.chains.get_mut(&id) else {
                return;
            };

            let Some(target) = pending.chain.next_target().cloned() else {
                if let Some(pending) = self.chains.remove(&id) {
                    self.finish_chain(pending);
                }
                return;
            };

            if !self.registry.chain_target_alive(&target) {
                tracing::trace!(chain = id, listener = %target.address, "dec: skipping removed listener");
                pending.chain.skip();
                continue;
            }

            let call = self.transport.notify_device_event(&target.address, pending.chain.event());
            let sender = self.sender.clone();
            tokio::spawn(async move {
                let consumed = match call.await {
                    Ok(consumed) => consumed,
                    Err(err) => {
                        tracing::debug!(error = %err, listener = %target.address, "dec: key listener notification failed");
                        false
                    }
                };
                if let Some(sender) = sender.upgrade() {
                    let _ = sender.send(RegistryMessage::ChainStepCompleted { chain: id, consumed }).await;
                }
            });
            return;
        }
    }

    fn finish_chain(&mut self, pending: PendingChain) {
        let PendingChain { chain, respond_to } = pending;
        let consumed = chain.consumed();
        tracing::trace!(consumed, "dec: key notification chain finished");

        if chain.is_system_global() && self.registry.refresh_grabs(Some(chain.event())) {
            tracing::warn!("dec: re-issuing key grabs failed");
        }

        if let Some(respond_to) = respond_to
            && respond_to.send(consumed).is_err()
        {
            tracing::trace!("dec: caller stopped waiting for key notification");
        }
    }

    /// Answers every waiting caller with "not consumed" on shutdown.
    fn abandon_chains(&mut self) {
        for (_, pending) in self.chains.drain() {
            if let Some(respond_to) = pending.respond_to {
                let _ = respond_to.send(false);
            }
        }
    }

    // ========================================================================
    // Pointer polling
    // ========================================================================

    /// Starts the task that drives [`RegistryMessage::MousePollTick`].
    fn start_poll_ticker(&self) {
        let sender = self.sender.clone();
        let first = self.registry.poller().interval();
        tracing::debug!(interval = ?first, "poll: starting pointer ticker");

        tokio::spawn(async move {
            let mut delay = first;
            loop {
                tokio::time::sleep(delay).await;

                let Some(sender) = sender.upgrade() else {
                    break;
                };
                let (tx, rx) = oneshot::channel();
                if sender.send(RegistryMessage::MousePollTick { respond_to: tx }).await.is_err() {
                    break;
                }
                drop(sender);

                match rx.await {
                    Ok(Some(next)) => delay = next,
                    _ => break,
                }
            }
            tracing::debug!("poll: pointer ticker stopped");
        });
    }
}
