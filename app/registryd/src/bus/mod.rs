//! Accessibility bus front end.
//!
//! Everything that touches zbus lives here; the registry and its actor
//! only see [`RegistryHandle`] requests and the [`ListenerTransport`]
//! seam.
//!
//! - [`server`]: method calls on the root, registry and device event
//!   controller objects
//! - [`signals`]: signals announcing registry state changes
//! - [`watcher`]: name-loss tracking and accessibility event intake
//! - [`transport`]: outbound calls to listeners and applications
//! - [`wire`]: D-Bus encodings of the registry types
//!
//! [`ListenerTransport`]: crate::registry::ListenerTransport

pub mod server;
pub mod signals;
pub mod transport;
pub mod watcher;
pub mod wire;

use eyeball::Subscriber;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zbus::Connection;
use zbus::fdo::{DBusProxy, RequestNameFlags, RequestNameReply};
use zbus::names::WellKnownName;

pub use self::server::BusServer;
pub use self::transport::ZbusTransport;
use crate::actor::RegistryHandle;
use crate::error::RegistryError;
use crate::registry::RegistryNotification;

/// Opens the accessibility bus connection: `address` when given, else
/// the session bus.
///
/// # Errors
///
/// Returns an error if the address is invalid or the bus is unreachable.
pub async fn connect(address: Option<&str>) -> Result<Connection, RegistryError> {
    let connection = match address {
        Some(address) => zbus::connection::Builder::address(address)?.build().await?,
        None => Connection::session().await?,
    };
    tracing::debug!(
        unique_name = ?connection.unique_name().map(ToString::to_string),
        "bus: connected"
    );
    Ok(connection)
}

/// Takes ownership of `name`, replacing a previous owner.
///
/// # Errors
///
/// Returns [`RegistryError::BusError`] if the name is invalid or owned by
/// a peer that does not allow replacement.
pub async fn request_name(connection: &Connection, name: &str) -> Result<(), RegistryError> {
    let well_known =
        WellKnownName::try_from(name).map_err(|err| RegistryError::BusError(err.to_string()))?;
    let proxy = DBusProxy::new(connection).await?;
    let flags = RequestNameFlags::AllowReplacement
        | RequestNameFlags::ReplaceExisting
        | RequestNameFlags::DoNotQueue;

    let reply = proxy
        .request_name(well_known, flags)
        .await
        .map_err(|err| RegistryError::BusError(err.to_string()))?;

    match reply {
        RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => {
            tracing::info!(name, "bus: registry name acquired");
            Ok(())
        }
        other => Err(RegistryError::BusError(format!("could not own {name}: {other:?}"))),
    }
}

/// Inputs of [`start`].
pub struct BusServices {
    /// Well-known name to own.
    pub name: String,
    /// Relay accessibility events from applications to subscribers.
    pub relay_events: bool,
    pub notifications: mpsc::UnboundedReceiver<RegistryNotification>,
    pub child_count: Subscriber<usize>,
}

/// Starts serving the registry on `connection` and owns the registry name.
///
/// Returns the spawned tasks; they end when the connection closes or the
/// actor stops.
///
/// # Errors
///
/// Returns an error if the name cannot be owned or a subscription fails.
pub async fn start(
    connection: Connection,
    registry: RegistryHandle,
    services: BusServices,
) -> Result<Vec<JoinHandle<()>>, RegistryError> {
    let BusServices { name, relay_events, notifications, child_count } = services;

    if let Some(unique_name) = connection.unique_name() {
        registry.set_bus_name(unique_name.to_string()).await?;
    }

    let server = BusServer::new(connection.clone(), registry.clone()).await?;
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(signals::run_emitter(connection.clone(), notifications, child_count)));

    let (conn, handle) = (connection.clone(), registry.clone());
    tasks.push(tokio::spawn(async move {
        if let Err(err) = watcher::watch_vanished_names(conn, handle).await {
            tracing::error!(error = %err, "bus: name watch failed");
        }
    }));

    if relay_events {
        let (conn, handle) = (connection.clone(), registry.clone());
        tasks.push(tokio::spawn(async move {
            if let Err(err) = watcher::relay_accessible_events(conn, handle).await {
                tracing::error!(error = %err, "bus: event relay failed");
            }
        }));
    }

    request_name(&connection, &name).await?;
    tasks.push(tokio::spawn(server.run()));

    if let Err(err) = signals::emit_available(&connection).await {
        tracing::warn!(error = %err, "bus: failed to announce the desktop root");
    }

    Ok(tasks)
}
