//! Daemon startup and shutdown.
//!
//! Startup order matters: the registry's notification channel and child
//! count subscription are taken before the registry moves into the actor,
//! and the bus server starts buffering calls before the registry name is
//! owned.

use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};

use crate::actor::RegistryActor;
use crate::bus::{self, BusServices, ZbusTransport};
use crate::config::{self, RegistryConfig};
use crate::error::RegistryError;
use crate::ipc::{self, IpcServer};
use crate::logging;
use crate::registry::{NullPlatform, Registry};

/// Options of `registryd run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Bus address overriding `bus.address`.
    pub address: Option<String>,
    /// Force debug logging.
    pub verbose: bool,
}

/// Runs the daemon until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the runtime cannot start, the bus is unreachable,
/// or the registry name cannot be owned.
pub fn run(options: &RunOptions) -> Result<(), RegistryError> {
    let config = config::init();
    logging::init(&logging::default_directive(&config.log_level, options.verbose));

    if let Some(path) = config::get_config_path() {
        tracing::info!(path = %path.display(), "config: using configuration file");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("registryd")
        .build()?;

    runtime.block_on(serve(config, options))
}

async fn serve(config: &RegistryConfig, options: &RunOptions) -> Result<(), RegistryError> {
    let address = options.address.as_deref().or(config.bus.address.as_deref());
    let connection = bus::connect(address).await?;

    let transport = Arc::new(ZbusTransport::new(connection.clone(), config.listener_timeout()));
    let registry = Registry::new(config.registry_settings(), Arc::new(NullPlatform));
    let services = BusServices {
        name: config.bus.name.clone(),
        relay_events: config.bus.relay_events,
        notifications: bus::signals::forward_notifications(&registry),
        child_count: registry.apps().subscribe_child_count(),
    };
    let handle = RegistryActor::spawn(registry, transport);

    let tasks = bus::start(connection, handle.clone(), services).await?;

    let ipc_handle = handle.clone();
    let socket_path = config::socket_path(config);
    let ipc_server = IpcServer::start(&socket_path, move |query| {
        ipc::handle_registry_query(&ipc_handle, query)
    })
    .inspect_err(|err| tracing::warn!(error = %err, "ipc: control socket disabled"))
    .ok();

    tracing::info!(name = %config.bus.name, "registryd: running");
    wait_for_shutdown().await?;
    tracing::info!("registryd: shutting down");

    drop(ipc_server);
    let _ = handle.shutdown().await;
    for task in tasks {
        task.abort();
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<(), RegistryError> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
