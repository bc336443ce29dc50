//! Method call dispatch for the registry's bus objects.
//!
//! Calls are read from the connection's message stream and answered by
//! hand rather than through zbus' object server: several methods accept
//! more than one body signature, which generated interfaces cannot
//! express. Each call is decoded, turned into a registry request, and
//! answered once the actor replies. Calls are handled one at a time in
//! arrival order, except `NotifyListenersSync` whose answer depends on
//! remote listeners.
//!
//! | Path | Interfaces |
//! |------|------------|
//! | root accessible | Socket, Accessible, Application, Component |
//! | registry | Registry |
//! | device event controller | DeviceEventController |
//!
//! Every path also answers Properties, Introspectable and Peer.

use std::collections::HashMap;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use zbus::fdo::DBusProxy;
use zbus::message::{Header, Type as MessageType};
use zbus::{Connection, Message, MessageStream};
use zvariant::{DynamicType, OwnedObjectPath, OwnedValue, Value};

use super::wire::{
    LegacyDeviceEvent, WireDeviceEvent, WireDeviceListener, WireKeyDefinition,
    WireKeystrokeListener, WireListenerMode, WireObjectRef, key_set, object_value,
};
use crate::actor::{ActorError, QueryResult, RegistryHandle, RegistryQuery};
use crate::constants::{
    ACCESSIBLE_INTERFACE, APPLICATION_INTERFACE, COMPONENT_INTERFACE, DEC_INTERFACE, DEC_PATH,
    DESKTOP_EXTENTS, INTROSPECTABLE_INTERFACE, NULL_PATH, PEER_INTERFACE, PROPERTIES_INTERFACE,
    REGISTRY_INTERFACE, REGISTRY_PATH, ROLE_DESKTOP_FRAME, ROLE_DESKTOP_FRAME_NAME, ROOT_NAME,
    ROOT_PATH, SOCKET_INTERFACE, TOOLKIT_NAME,
};
use crate::error::RegistryError;
use crate::registry::{DeviceEvent, KeySynthType, ObjectRef};

/// Window layer, reported by `Component.GetLayer`.
const LAYER_WINDOW: u32 = 3;

/// Members of the root path that belong to the Component interface.
const COMPONENT_MEMBERS: &[&str] = &[
    "Contains",
    "GetAccessibleAtPoint",
    "GetExtents",
    "GetPosition",
    "GetSize",
    "GetLayer",
    "GetMDIZOrder",
    "GrabFocus",
    "GetAlpha",
];

// ============================================================================
// Call errors
// ============================================================================

/// Reasons a method call is answered with an error.
#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("No such method '{member}' on '{interface}' at {path}")]
    UnknownMethod { path: String, interface: String, member: String },

    #[error("No such property '{0}'")]
    UnknownProperty(String),

    #[error("Property '{0}' is read-only")]
    ReadOnly(String),

    #[error("Arguments of '{member}' do not match any accepted signature ({signature})")]
    InvalidArgs { member: String, signature: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl CallError {
    const fn dbus_name(&self) -> &'static str {
        match self {
            Self::UnknownMethod { .. } => "org.freedesktop.DBus.Error.UnknownMethod",
            Self::UnknownProperty(_) => "org.freedesktop.DBus.Error.UnknownProperty",
            Self::ReadOnly(_) => "org.freedesktop.DBus.Error.PropertyReadOnly",
            Self::InvalidArgs { .. } => "org.freedesktop.DBus.Error.InvalidArgs",
            Self::Registry(err) => err.dbus_name(),
        }
    }
}

impl From<ActorError> for CallError {
    fn from(err: ActorError) -> Self { Self::Registry(err.into()) }
}

type CallResult = Result<(), CallError>;

/// A decoded method call.
struct Call<'a> {
    message: &'a Message,
    header: Header<'a>,
    path: String,
    interface: String,
    member: String,
    sender: String,
}

impl Call<'_> {
    /// Decodes the body as `T`.
    fn args<T>(&self) -> Result<T, CallError>
    where
        T: DeserializeOwned + DynamicType + zvariant::Type,
    {
        self.message.body().deserialize::<T>().map_err(|_| self.invalid_args())
    }

    fn invalid_args(&self) -> CallError {
        CallError::InvalidArgs {
            member: self.member.clone(),
            signature: self.message.body().signature().to_string(),
        }
    }

    fn unknown_method(&self) -> CallError {
        CallError::UnknownMethod {
            path: self.path.clone(),
            interface: self.interface.clone(),
            member: self.member.clone(),
        }
    }

    /// Reference to an object of the caller.
    fn caller_object(&self, path: &OwnedObjectPath) -> ObjectRef {
        ObjectRef::new(self.sender.clone(), path.as_str())
    }
}

/// Interface a call without an interface header field is meant for.
fn implied_interface(path: &str, member: &str) -> Option<&'static str> {
    match path {
        ROOT_PATH if matches!(member, "Embed" | "Unembed") => Some(SOCKET_INTERFACE),
        ROOT_PATH if COMPONENT_MEMBERS.contains(&member) => Some(COMPONENT_INTERFACE),
        ROOT_PATH => Some(ACCESSIBLE_INTERFACE),
        REGISTRY_PATH => Some(REGISTRY_INTERFACE),
        DEC_PATH => Some(DEC_INTERFACE),
        _ => None,
    }
}

/// Decodes a device event in either accepted layout.
fn device_event(call: &Call<'_>) -> Result<DeviceEvent, CallError> {
    let body = call.message.body();
    let wire = body
        .deserialize::<WireDeviceEvent>()
        .or_else(|_| body.deserialize::<LegacyDeviceEvent>().map(WireDeviceEvent::from))
        .map_err(|_| call.invalid_args())?;
    Ok(DeviceEvent::try_from(wire)?)
}

// ============================================================================
// Server
// ============================================================================

/// Serves the root accessible, the registry and the device event
/// controller.
pub struct BusServer {
    connection: Connection,
    stream: MessageStream,
    registry: RegistryHandle,
    dbus: DBusProxy<'static>,
    bus_name: String,
}

impl BusServer {
    /// Starts buffering incoming calls. Create the server before the
    /// registry name is requested so no early call is lost.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus daemon proxy cannot be created.
    pub async fn new(connection: Connection, registry: RegistryHandle) -> zbus::Result<Self> {
        let stream = MessageStream::from(&connection);
        let dbus = DBusProxy::new(&connection).await?;
        let bus_name = connection.unique_name().map(ToString::to_string).unwrap_or_default();
        Ok(Self { connection, stream, registry, dbus, bus_name })
    }

    /// Answers method calls until the connection closes or the actor stops.
    pub async fn run(mut self) {
        tracing::debug!(name = %self.bus_name, "bus: serving method calls");

        while let Some(message) = self.stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(error = %err, "bus: unreadable message");
                    continue;
                }
            };
            if message.message_type() != MessageType::MethodCall {
                continue;
            }

            self.handle(&message).await;

            if !self.registry.is_alive() {
                break;
            }
        }

        tracing::debug!("bus: method call stream closed");
    }

    async fn handle(&self, message: &Message) {
        let header = message.header();
        let path = header.path().map(|p| p.as_str().to_string()).unwrap_or_default();
        let member = header.member().map(|m| m.as_str().to_string()).unwrap_or_default();
        let interface = header
            .interface()
            .map(|i| i.as_str().to_string())
            .or_else(|| implied_interface(&path, &member).map(str::to_string))
            .unwrap_or_default();
        let sender = header.sender().map(|s| s.as_str().to_string()).unwrap_or_default();

        tracing::trace!(%path, %interface, %member, %sender, "bus: method call");
        let call = Call { message, header, path, interface, member, sender };

        if let Err(err) = self.dispatch(&call).await {
            tracing::debug!(
                member = %call.member,
                sender = %call.sender,
                error = %err,
                "bus: method call failed"
            );
            self.reply_error(&call.header, &err).await;
        }
    }

    async fn dispatch(&self, call: &Call<'_>) -> CallResult {
        match (call.path.as_str(), call.interface.as_str()) {
            (_, PROPERTIES_INTERFACE) => self.properties(call).await,
            (_, INTROSPECTABLE_INTERFACE) => self.introspect(call).await,
            (_, PEER_INTERFACE) => self.peer(call).await,
            (ROOT_PATH, SOCKET_INTERFACE) => self.socket(call).await,
            (ROOT_PATH, ACCESSIBLE_INTERFACE) => self.accessible(call).await,
            (ROOT_PATH, COMPONENT_INTERFACE) => self.component(call).await,
            (REGISTRY_PATH, REGISTRY_INTERFACE) => self.event_registry(call).await,
            (DEC_PATH, DEC_INTERFACE) => self.device_event_controller(call).await,
            _ => Err(call.unknown_method()),
        }
    }

    async fn reply<B>(&self, call: &Call<'_>, body: &B) -> CallResult
    where
        B: serde::Serialize + DynamicType,
    {
        if let Err(err) = self.connection.reply(&call.header, body).await {
            tracing::debug!(member = %call.member, error = %err, "bus: failed to send reply");
        }
        Ok(())
    }

    async fn reply_error(&self, header: &Header<'_>, err: &CallError) {
        if let Err(send_err) =
            self.connection.reply_error(header, err.dbus_name(), &err.to_string()).await
        {
            tracing::debug!(error = %send_err, "bus: failed to send error reply");
        }
    }

    async fn query(&self, query: RegistryQuery) -> Result<QueryResult, CallError> {
        Ok(self.registry.query(query).await?)
    }

    // ========================================================================
    // Socket
    // ========================================================================

    async fn socket(&self, call: &Call<'_>) -> CallResult {
        match call.member.as_str() {
            "Embed" => {
                let application = ObjectRef::from(call.args::<WireObjectRef>()?);
                let embedded = self.registry.embed(application.clone()).await?;
                self.reply(call, &WireObjectRef::from_ref(&embedded.parent)).await?;
                self.check_owner(application.name);
                Ok(())
            }
            "Unembed" => {
                let application = ObjectRef::from(call.args::<WireObjectRef>()?);
                self.registry.unembed(application).await?;
                self.reply(call, &()).await
            }
            _ => Err(call.unknown_method()),
        }
    }

    /// Runs the name-loss cleanup if `name` left the bus before its embed
    /// was processed.
    fn check_owner(&self, name: String) {
        let dbus = self.dbus.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let Ok(bus_name) = zbus::names::BusName::try_from(name.as_str()) else {
                return;
            };
            match dbus.name_has_owner(bus_name).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(name, "bus: embedding application already left");
                    let _ = registry.name_vanished(name).await;
                }
                Err(err) => tracing::debug!(name, error = %err, "bus: NameHasOwner failed"),
            }
        });
    }

    // ========================================================================
    // Registry
    // ========================================================================

    async fn event_registry(&self, call: &Call<'_>) -> CallResult {
        match call.member.as_str() {
            "RegisterEvent" => {
                let (event_type, properties) = call
                    .args::<(String, Vec<String>)>()
                    .or_else(|_| call.args::<((String, Vec<String>),)>().map(|(args,)| args))
                    .or_else(|_| call.args::<String>().map(|event_type| (event_type, Vec::new())))?;

                self.registry.register_event(call.sender.as_str(), event_type, properties).await?;
                self.reply(call, &()).await
            }
            "DeregisterEvent" => {
                let event_type = call.args::<String>()?;
                self.registry.deregister_event(call.sender.as_str(), event_type).await?;
                self.reply(call, &()).await
            }
            "GetRegisteredEvents" => {
                let QueryResult::RegisteredEvents(events) =
                    self.query(RegistryQuery::RegisteredEvents).await?
                else {
                    return Err(unexpected_answer());
                };
                self.reply(call, &events).await
            }
            _ => Err(call.unknown_method()),
        }
    }

    // ========================================================================
    // Device event controller
    // ========================================================================

    async fn device_event_controller(&self, call: &Call<'_>) -> CallResult {
        match call.member.as_str() {
            "RegisterKeystrokeListener" => {
                let (path, keys, mask, types, mode) = call.args::<(
                    OwnedObjectPath,
                    Vec<WireKeyDefinition>,
                    u32,
                    u32,
                    WireListenerMode,
                )>()?;
                let registered = self
                    .registry
                    .register_keystroke_listener(
                        call.caller_object(&path),
                        key_set(keys),
                        mask,
                        types,
                        mode.into(),
                    )
                    .await?;
                self.reply(call, &registered).await
            }
            "DeregisterKeystrokeListener" => {
                let (path, keys, mask, types) =
                    call.args::<(OwnedObjectPath, Vec<WireKeyDefinition>, u32, u32)>()?;
                self.registry
                    .deregister_keystroke_listener(
                        call.caller_object(&path),
                        key_set(keys),
                        mask,
                        types,
                    )
                    .await?;
                self.reply(call, &()).await
            }
            "RegisterDeviceEventListener" => {
                let (path, types) = call.args::<(OwnedObjectPath, u32)>()?;
                let registered =
                    self.registry.register_device_listener(call.caller_object(&path), types).await?;
                self.reply(call, &registered).await
            }
            "DeregisterDeviceEventListener" => {
                let (path, types) = call.args::<(OwnedObjectPath, u32)>()?;
                self.registry.deregister_device_listener(call.caller_object(&path), types).await?;
                self.reply(call, &()).await
            }
            "GetKeystrokeListeners" => {
                let QueryResult::KeystrokeListeners(listeners) =
                    self.query(RegistryQuery::KeystrokeListeners).await?
                else {
                    return Err(unexpected_answer());
                };
                let listeners: Vec<WireKeystrokeListener> =
                    listeners.iter().map(Into::into).collect();
                self.reply(call, &listeners).await
            }
            "GetDeviceEventListeners" => {
                let QueryResult::DeviceListeners(listeners) =
                    self.query(RegistryQuery::DeviceListeners).await?
                else {
                    return Err(unexpected_answer());
                };
                let listeners: Vec<WireDeviceListener> = listeners.iter().map(Into::into).collect();
                self.reply(call, &listeners).await
            }
            "GenerateKeyboardEvent" => {
                let (keycode, keystring, synth) = call.args::<(i32, String, u32)>()?;
                let synth = KeySynthType::from_raw(synth).ok_or_else(|| {
                    RegistryError::InvalidArguments(format!("unknown key synthesis type {synth}"))
                })?;
                self.registry.generate_keyboard_event(keycode, keystring, synth).await?;
                self.reply(call, &()).await
            }
            "GenerateMouseEvent" => {
                let (x, y, event_name) = call.args::<(i32, i32, String)>()?;
                self.registry.generate_mouse_event(x, y, event_name).await?;
                self.reply(call, &()).await
            }
            "NotifyListenersSync" => {
                let event = device_event(call)?;
                self.notify_listeners_sync(call.message.clone(), event);
                Ok(())
            }
            "NotifyListenersAsync" => {
                let event = device_event(call)?;
                self.registry.notify_listeners_async(event, false).await?;
                self.reply(call, &()).await
            }
            _ => Err(call.unknown_method()),
        }
    }

    /// Answers once a listener consumed the event or every listener was
    /// asked. Other calls are served in the meantime.
    fn notify_listeners_sync(&self, message: Message, event: DeviceEvent) {
        let connection = self.connection.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let header = message.header();
            let result = match registry.notify_listeners(event, false).await {
                Ok(consumed) => connection.reply(&header, &consumed).await,
                Err(err) => {
                    let err = CallError::from(err);
                    connection.reply_error(&header, err.dbus_name(), &err.to_string()).await
                }
            };
            if let Err(err) = result {
                tracing::debug!(error = %err, "bus: failed to answer NotifyListenersSync");
            }
        });
    }

    // ========================================================================
    // Root accessible
    // ========================================================================

    fn null_reference(&self) -> WireObjectRef {
        WireObjectRef::from_ref(&ObjectRef::null(self.bus_name.clone()))
    }

    async fn accessible(&self, call: &Call<'_>) -> CallResult {
        match call.member.as_str() {
            "GetChildAtIndex" => {
                let index = call.args::<i32>()?;
                let QueryResult::Child(child) =
                    self.query(RegistryQuery::ChildAtIndex { index }).await?
                else {
                    return Err(unexpected_answer());
                };
                self.reply(call, &WireObjectRef::from_ref(&child)).await
            }
            "GetChildren" => {
                let QueryResult::Applications(apps) =
                    self.query(RegistryQuery::Applications).await?
                else {
                    return Err(unexpected_answer());
                };
                let children: Vec<WireObjectRef> =
                    apps.iter().map(|app| WireObjectRef::from_ref(&app.reference)).collect();
                self.reply(call, &children).await
            }
            "GetIndexInParent" => self.reply(call, &-1_i32).await,
            "GetRelationSet" => {
                self.reply(call, &Vec::<(u32, Vec<WireObjectRef>)>::new()).await
            }
            "GetRole" => self.reply(call, &ROLE_DESKTOP_FRAME).await,
            "GetRoleName" | "GetLocalizedRoleName" => {
                self.reply(call, &ROLE_DESKTOP_FRAME_NAME).await
            }
            "GetState" => self.reply(call, &vec![0_u32, 1]).await,
            "GetAttributes" => self.reply(call, &HashMap::<String, String>::new()).await,
            "GetApplication" => self.reply(call, &self.null_reference()).await,
            "GetInterfaces" => {
                self.reply(call, &vec![ACCESSIBLE_INTERFACE, APPLICATION_INTERFACE, COMPONENT_INTERFACE])
                    .await
            }
            _ => Err(call.unknown_method()),
        }
    }

    async fn component(&self, call: &Call<'_>) -> CallResult {
        let (x, y, width, height) = DESKTOP_EXTENTS;
        match call.member.as_str() {
            "Contains" | "GrabFocus" => self.reply(call, &false).await,
            "GetAccessibleAtPoint" => self.reply(call, &self.null_reference()).await,
            "GetExtents" => self.reply(call, &((x, y, width, height),)).await,
            "GetPosition" => self.reply(call, &(x, y)).await,
            "GetSize" => self.reply(call, &(width, height)).await,
            "GetLayer" => self.reply(call, &LAYER_WINDOW).await,
            "GetMDIZOrder" => self.reply(call, &0_i16).await,
            "GetAlpha" => self.reply(call, &1.0_f64).await,
            _ => Err(call.unknown_method()),
        }
    }

    // ========================================================================
    // Properties
    // ========================================================================

    async fn properties(&self, call: &Call<'_>) -> CallResult {
        match call.member.as_str() {
            "Get" => {
                let (interface, name) = call.args::<(String, String)>()?;
                let mut all = self.property_values(&call.path, &interface).await?;
                let value = all.remove(&name).ok_or(CallError::UnknownProperty(name))?;
                self.reply(call, &value).await
            }
            "GetAll" => {
                let interface = call.args::<String>()?;
                let all = self.property_values(&call.path, &interface).await?;
                self.reply(call, &all).await
            }
            "Set" => {
                let (_, name, _) = call.args::<(String, String, OwnedValue)>()?;
                Err(CallError::ReadOnly(name))
            }
            _ => Err(call.unknown_method()),
        }
    }

    async fn property_values(
        &self,
        path: &str,
        interface: &str,
    ) -> Result<HashMap<String, OwnedValue>, CallError> {
        let mut values: HashMap<String, Value<'static>> = HashMap::new();

        match (path, interface) {
            (ROOT_PATH, ACCESSIBLE_INTERFACE) => {
                let QueryResult::ChildCount(count) = self.query(RegistryQuery::ChildCount).await?
                else {
                    return Err(unexpected_answer());
                };

                values.insert("Name".into(), Value::from(ROOT_NAME));
                values.insert("Description".into(), Value::from(""));
                values.insert(
                    "Parent".into(),
                    object_value(&ObjectRef::new(String::new(), NULL_PATH)),
                );
                values.insert(
                    "ChildCount".into(),
                    Value::from(i32::try_from(count).unwrap_or(i32::MAX)),
                );
                values.insert("Locale".into(), Value::from(""));
                values.insert("AccessibleId".into(), Value::from(""));
            }
            (ROOT_PATH, APPLICATION_INTERFACE) => {
                values.insert("ToolkitName".into(), Value::from(TOOLKIT_NAME));
                values.insert("Version".into(), Value::from("2.0"));
                values.insert("AtspiVersion".into(), Value::from("2.1"));
                values.insert("Id".into(), Value::from(0_i32));
            }
            _ => {}
        }

        values
            .into_iter()
            .map(|(key, value)| {
                OwnedValue::try_from(value)
                    .map(|value| (key, value))
                    .map_err(|err| RegistryError::BusError(err.to_string()).into())
            })
            .collect()
    }

    // ========================================================================
    // Introspection and peer
    // ========================================================================

    async fn introspect(&self, call: &Call<'_>) -> CallResult {
        match call.member.as_str() {
            "Introspect" => self.reply(call, &introspection_xml(&call.path)).await,
            _ => Err(call.unknown_method()),
        }
    }

    async fn peer(&self, call: &Call<'_>) -> CallResult {
        match call.member.as_str() {
            "Ping" => self.reply(call, &()).await,
            _ => Err(call.unknown_method()),
        }
    }
}

fn unexpected_answer() -> CallError {
    RegistryError::ActorError("unexpected query answer".to_string()).into()
}

const STANDARD_INTERFACES_XML: &str = r#"  <interface name="org.freedesktop.DBus.Introspectable">
    <method name="Introspect"><arg type="s" direction="out"/></method>
  </interface>
  <interface name="org.freedesktop.DBus.Peer">
    <method name="Ping"/>
  </interface>
  <interface name="org.freedesktop.DBus.Properties">
    <method name="Get"><arg type="s" direction="in"/><arg type="s" direction="in"/><arg type="v" direction="out"/></method>
    <method name="GetAll"><arg type="s" direction="in"/><arg type="a{sv}" direction="out"/></method>
    <signal name="PropertiesChanged"><arg type="s"/><arg type="a{sv}"/><arg type="as"/></signal>
  </interface>
"#;

const ROOT_XML: &str = r#"  <interface name="org.a11y.atspi.Socket">
    <method name="Embed"><arg type="(so)" direction="in"/><arg type="(so)" direction="out"/></method>
    <method name="Unembed"><arg type="(so)" direction="in"/></method>
    <signal name="Available"><arg type="(so)"/></signal>
  </interface>
  <interface name="org.a11y.atspi.Accessible">
    <property name="Name" type="s" access="read"/>
    <property name="Description" type="s" access="read"/>
    <property name="Parent" type="(so)" access="read"/>
    <property name="ChildCount" type="i" access="read"/>
    <method name="GetChildAtIndex"><arg type="i" direction="in"/><arg type="(so)" direction="out"/></method>
    <method name="GetChildren"><arg type="a(so)" direction="out"/></method>
    <method name="GetIndexInParent"><arg type="i" direction="out"/></method>
    <method name="GetRelationSet"><arg type="a(ua(so))" direction="out"/></method>
    <method name="GetRole"><arg type="u" direction="out"/></method>
    <method name="GetRoleName"><arg type="s" direction="out"/></method>
    <method name="GetLocalizedRoleName"><arg type="s" direction="out"/></method>
    <method name="GetState"><arg type="au" direction="out"/></method>
    <method name="GetAttributes"><arg type="a{ss}" direction="out"/></method>
    <method name="GetApplication"><arg type="(so)" direction="out"/></method>
    <method name="GetInterfaces"><arg type="as" direction="out"/></method>
  </interface>
  <interface name="org.a11y.atspi.Application">
    <property name="ToolkitName" type="s" access="read"/>
    <property name="Version" type="s" access="read"/>
    <property name="AtspiVersion" type="s" access="read"/>
    <property name="Id" type="i" access="read"/>
  </interface>
  <interface name="org.a11y.atspi.Component">
    <method name="Contains"><arg type="i" direction="in"/><arg type="i" direction="in"/><arg type="u" direction="in"/><arg type="b" direction="out"/></method>
    <method name="GetAccessibleAtPoint"><arg type="i" direction="in"/><arg type="i" direction="in"/><arg type="u" direction="in"/><arg type="(so)" direction="out"/></method>
    <method name="GetExtents"><arg type="u" direction="in"/><arg type="(iiii)" direction="out"/></method>
    <method name="GetPosition"><arg type="u" direction="in"/><arg type="i" direction="out"/><arg type="i" direction="out"/></method>
    <method name="GetSize"><arg type="i" direction="out"/><arg type="i" direction="out"/></method>
    <method name="GetLayer"><arg type="u" direction="out"/></method>
    <method name="GetMDIZOrder"><arg type="n" direction="out"/></method>
    <method name="GrabFocus"><arg type="b" direction="out"/></method>
    <method name="GetAlpha"><arg type="d" direction="out"/></method>
  </interface>
"#;

const REGISTRY_XML: &str = r#"  <interface name="org.a11y.atspi.Registry">
    <method name="RegisterEvent"><arg type="s" direction="in"/><arg type="as" direction="in"/></method>
    <method name="DeregisterEvent"><arg type="s" direction="in"/></method>
    <method name="GetRegisteredEvents"><arg type="a(ss)" direction="out"/></method>
    <signal name="EventListenerRegistered"><arg type="s"/><arg type="s"/><arg type="as"/></signal>
    <signal name="EventListenerDeregistered"><arg type="s"/><arg type="s"/></signal>
  </interface>
"#;

const DEC_XML: &str = r#"  <interface name="org.a11y.atspi.DeviceEventController">
    <method name="RegisterKeystrokeListener"><arg type="o" direction="in"/><arg type="a(iisi)" direction="in"/><arg type="u" direction="in"/><arg type="u" direction="in"/><arg type="(bbb)" direction="in"/><arg type="b" direction="out"/></method>
    <method name="DeregisterKeystrokeListener"><arg type="o" direction="in"/><arg type="a(iisi)" direction="in"/><arg type="u" direction="in"/><arg type="u" direction="in"/></method>
    <method name="GetKeystrokeListeners"><arg type="a(souua(iisi)u(bbb))" direction="out"/></method>
    <method name="RegisterDeviceEventListener"><arg type="o" direction="in"/><arg type="u" direction="in"/><arg type="b" direction="out"/></method>
    <method name="DeregisterDeviceEventListener"><arg type="o" direction="in"/><arg type="u" direction="in"/></method>
    <method name="GetDeviceEventListeners"><arg type="a(sou)" direction="out"/></method>
    <method name="GenerateKeyboardEvent"><arg type="i" direction="in"/><arg type="s" direction="in"/><arg type="u" direction="in"/></method>
    <method name="GenerateMouseEvent"><arg type="i" direction="in"/><arg type="i" direction="in"/><arg type="s" direction="in"/></method>
    <method name="NotifyListenersSync"><arg type="(uiuuisb)" direction="in"/><arg type="b" direction="out"/></method>
    <method name="NotifyListenersAsync"><arg type="(uiuuisb)" direction="in"/></method>
  </interface>
"#;

/// Introspection document of `path`. Intermediate paths list their
/// children only.
fn introspection_xml(path: &str) -> String {
    let (interfaces, children): (&str, &[&str]) = match path {
        ROOT_PATH => (ROOT_XML, &[]),
        REGISTRY_PATH => (REGISTRY_XML, &["deviceeventcontroller"]),
        DEC_PATH => (DEC_XML, &[]),
        "/" => ("", &["org"]),
        "/org" => ("", &["a11y"]),
        "/org/a11y" => ("", &["atspi"]),
        "/org/a11y/atspi" => ("", &["accessible", "registry"]),
        "/org/a11y/atspi/accessible" => ("", &["root"]),
        _ => ("", &[]),
    };

    let mut xml = String::from(
        "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n \
         \"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n<node>\n",
    );
    xml.push_str(STANDARD_INTERFACES_XML);
    xml.push_str(interfaces);
    for child in children {
        xml.push_str(&format!("  <node name=\"{child}\"/>\n"));
    }
    xml.push_str("</node>\n");
    xml
}
