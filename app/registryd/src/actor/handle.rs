//! Handle for communicating with the registry actor.
//!
//! The `RegistryHandle` is the only way the bus server, the bus watcher and
//! the control socket reach registry state.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::messages::{QueryResult, RegistryMessage, RegistryQuery};
use crate::error::RegistryError;
use crate::registry::{
    AccessibleEvent, DeviceEvent, Embedded, KeySet, KeySynthType, ListenerMode, ObjectRef,
};

/// Error types for actor communication.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// Failed to send message to actor.
    #[error("Failed to send message to actor: channel closed")]
    SendFailed,

    /// Failed to receive response from actor.
    #[error("Failed to receive response from actor: channel closed")]
    ReceiveFailed,

    /// Query timed out.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),
}

/// Handle for communicating with the registry actor.
///
/// This handle is cheap to clone and can be shared across threads.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
}

impl RegistryHandle {
    /// Create a new handle with the given sender.
    pub(crate) const fn new(sender: mpsc::Sender<RegistryMessage>) -> Self { Self { sender } }

    /// Whether the actor is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool { !self.sender.is_closed() }

    // ========================================================================
    // Fire-and-forget sending
    // ========================================================================

    /// Send a message to the actor without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is closed or full.
    pub fn send(&self, msg: RegistryMessage) -> Result<(), ActorError> {
        self.sender.try_send(msg).map_err(|_| ActorError::SendFailed)
    }

    /// Send a message to the actor and wait for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is closed.
    pub async fn send_async(&self, msg: RegistryMessage) -> Result<(), ActorError> {
        self.sender.send(msg).await.map_err(|_| ActorError::SendFailed)
    }

    /// Sends a request built around a response channel and waits for the answer.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryMessage,
    ) -> Result<T, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.send_async(build(tx)).await?;
        rx.await.map_err(|_| ActorError::ReceiveFailed)
    }

    // ========================================================================
    // Query methods
    // ========================================================================

    /// Execute a query and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is closed, or
    /// [`ActorError::ReceiveFailed`] if the response channel is closed.
    pub async fn query(&self, query: RegistryQuery) -> Result<QueryResult, ActorError> {
        self.request(|respond_to| RegistryMessage::Query { query, respond_to }).await
    }

    /// Execute a query with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Timeout`] if the query doesn't complete in time,
    /// or any error from [`Self::query`].
    pub async fn query_timeout(
        &self,
        query: RegistryQuery,
        timeout: Duration,
    ) -> Result<QueryResult, ActorError> {
        tokio::time::timeout(timeout, self.query(query))
            .await
            .map_err(|_| ActorError::Timeout(timeout))?
    }

    /// Execute a query from a thread outside the runtime.
    ///
    /// # Errors
    ///
    /// Same as [`Self::query`].
    ///
    /// # Panics
    ///
    /// Panics when called from within an async context.
    pub fn blocking_query(&self, query: RegistryQuery) -> Result<QueryResult, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .blocking_send(RegistryMessage::Query { query, respond_to: tx })
            .map_err(|_| ActorError::SendFailed)?;
        rx.blocking_recv().map_err(|_| ActorError::ReceiveFailed)
    }

    // ========================================================================
    // Applications
    // ========================================================================

    /// Embeds an application.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the actor fails.
    pub async fn embed(&self, application: ObjectRef) -> Result<Embedded, ActorError> {
        self.request(|respond_to| RegistryMessage::Embed { application, respond_to }).await
    }

    /// Unembeds an application.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has stopped.
    pub async fn unembed(&self, application: ObjectRef) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::Unembed { application }).await
    }

    /// Reports that `name` lost its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has stopped.
    pub async fn name_vanished(&self, name: impl Into<String>) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::NameVanished { name: name.into() }).await
    }

    /// Sets the unique name the registry answers as.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has stopped.
    pub async fn set_bus_name(&self, name: impl Into<String>) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::SetBusName { name: name.into() }).await
    }

    // ========================================================================
    // Event subscriptions
    // ========================================================================

    /// Registers an event subscription.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEventType`] for a malformed type, or
    /// [`RegistryError::ActorError`] if communication fails.
    pub async fn register_event(
        &self,
        subscriber: impl Into<String>,
        event_type: impl Into<String>,
        properties: Vec<String>,
    ) -> Result<(), RegistryError> {
        let subscriber = subscriber.into();
        let event_type = event_type.into();
        self.request(|respond_to| RegistryMessage::RegisterEvent {
            subscriber,
            event_type,
            properties,
            respond_to,
        })
        .await?
    }

    /// Removes event subscriptions. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register_event`].
    pub async fn deregister_event(
        &self,
        subscriber: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Result<usize, RegistryError> {
        let subscriber = subscriber.into();
        let event_type = event_type.into();
        self.request(|respond_to| RegistryMessage::DeregisterEvent {
            subscriber,
            event_type,
            respond_to,
        })
        .await?
    }

    /// Queues an accessibility event for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has stopped.
    pub async fn dispatch_event(&self, event: AccessibleEvent) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::DispatchEvent(event)).await
    }

    // ========================================================================
    // Device events
    // ========================================================================

    /// Registers a keystroke listener. Returns `false` if a key grab failed.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the actor fails.
    pub async fn register_keystroke_listener(
        &self,
        address: ObjectRef,
        keys: KeySet,
        mask: u32,
        types: u32,
        mode: ListenerMode,
    ) -> Result<bool, ActorError> {
        self.request(|respond_to| RegistryMessage::RegisterKeystrokeListener {
            address,
            keys,
            mask,
            types,
            mode,
            respond_to,
        })
        .await
    }

    /// Removes the keystroke listeners at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has stopped.
    pub async fn deregister_keystroke_listener(
        &self,
        address: ObjectRef,
        keys: KeySet,
        mask: u32,
        types: u32,
    ) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::DeregisterKeystrokeListener { address, keys, mask, types })
            .await
    }

    /// Registers a mouse listener.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the actor fails.
    pub async fn register_device_listener(
        &self,
        address: ObjectRef,
        types: u32,
    ) -> Result<bool, ActorError> {
        self.request(|respond_to| RegistryMessage::RegisterDeviceListener {
            address,
            types,
            respond_to,
        })
        .await
    }

    /// Removes the mouse listeners at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has stopped.
    pub async fn deregister_device_listener(
        &self,
        address: ObjectRef,
        types: u32,
    ) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::DeregisterDeviceListener { address, types }).await
    }

    /// Delivers a raw input event and waits until a listener consumed it or
    /// every listener was asked.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the actor fails.
    pub async fn notify_listeners(
        &self,
        event: DeviceEvent,
        is_system_global: bool,
    ) -> Result<bool, ActorError> {
        self.request(|respond_to| RegistryMessage::NotifyListeners {
            event,
            is_system_global,
            respond_to: Some(respond_to),
        })
        .await
    }

    /// Delivers a raw input event without waiting for the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has stopped.
    pub async fn notify_listeners_async(
        &self,
        event: DeviceEvent,
        is_system_global: bool,
    ) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::NotifyListeners {
            event,
            is_system_global,
            respond_to: None,
        })
        .await
    }

    /// Synthesizes keyboard input.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidArguments`] for a negative keycode, or
    /// [`RegistryError::ActorError`] if communication fails.
    pub async fn generate_keyboard_event(
        &self,
        keycode: i32,
        keystring: impl Into<String>,
        synth: KeySynthType,
    ) -> Result<(), RegistryError> {
        let keystring = keystring.into();
        self.request(|respond_to| RegistryMessage::GenerateKeyboardEvent {
            keycode,
            keystring,
            synth,
            respond_to,
        })
        .await?
    }

    /// Synthesizes a pointer event.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has stopped.
    pub async fn generate_mouse_event(
        &self,
        x: i32,
        y: i32,
        event_name: impl Into<String>,
    ) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::GenerateMouseEvent { x, y, event_name: event_name.into() })
            .await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Asks the actor to stop after the messages already queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has already stopped.
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        self.send_async(RegistryMessage::Shutdown).await
    }
}
