//! Daemon side of the control socket.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use super::{DEFAULT_TIMEOUT_MS, IpcQuery, IpcResponse};
use crate::actor::{QueryResult, RegistryHandle, RegistryQuery};
use crate::error::RegistryError;

/// A running control socket server. Dropping it stops the server and
/// removes the socket file.
#[derive(Debug)]
pub struct IpcServer {
    path: PathBuf,
    running: Arc<AtomicBool>,
}

impl IpcServer {
    /// Binds `path` and serves queries with `handler` on a background
    /// thread, one thread per connection.
    ///
    /// A stale socket file at `path` is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IpcError`] if the socket cannot be bound or
    /// the server thread cannot be spawned.
    pub fn start<F>(path: &Path, handler: F) -> Result<Self, RegistryError>
    where F: Fn(IpcQuery) -> IpcResponse + Send + Sync + 'static {
        remove_socket(path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(path).map_err(|err| {
            RegistryError::IpcError(format!("failed to bind {}: {err}", path.display()))
        })?;

        let running = Arc::new(AtomicBool::new(true));
        let handler = Arc::new(handler);
        let flag = Arc::clone(&running);

        thread::Builder::new()
            .name("ipc-server".to_string())
            .spawn(move || server_loop(&listener, &flag, &handler))
            .map_err(|err| RegistryError::IpcError(format!("failed to spawn server: {err}")))?;

        tracing::info!(path = %path.display(), "ipc: server listening");
        Ok(Self { path: path.to_path_buf(), running })
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    /// Stops accepting connections and removes the socket file.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            // Wake the accept loop so it sees the flag.
            let _ = UnixStream::connect(&self.path);
            remove_socket(&self.path);
            tracing::debug!(path = %self.path.display(), "ipc: server stopped");
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) { self.stop(); }
}

fn remove_socket(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

fn server_loop<F>(listener: &UnixListener, running: &AtomicBool, handler: &Arc<F>)
where F: Fn(IpcQuery) -> IpcResponse + Send + Sync + 'static {
    for stream in listener.incoming() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match stream {
            Ok(stream) => {
                let handler = Arc::clone(handler);
                thread::spawn(move || handle_connection(stream, handler.as_ref()));
            }
            Err(err) => tracing::warn!(error = %err, "ipc: connection error"),
        }
    }
}

fn handle_connection<F>(stream: UnixStream, handler: &F)
where F: Fn(IpcQuery) -> IpcResponse {
    let _ = stream.set_read_timeout(Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)));

    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).is_err() {
        return;
    }

    let response = match serde_json::from_str::<IpcQuery>(line.trim()) {
        Ok(query) => {
            tracing::debug!(?query, "ipc: query");
            handler(query)
        }
        Err(err) => IpcResponse::error(format!("Invalid query: {err}")),
    };

    let response_json = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string());

    let mut stream = stream;
    let _ = writeln!(stream, "{response_json}");
}

/// Answers a control socket query from the registry actor.
///
/// Blocks the calling thread; call it from the socket's connection
/// threads, never from the async runtime.
#[must_use]
pub fn handle_registry_query(registry: &RegistryHandle, query: IpcQuery) -> IpcResponse {
    let registry_query = match query {
        IpcQuery::Ping => return IpcResponse::success("pong"),
        IpcQuery::Status => RegistryQuery::Status,
        IpcQuery::Applications => RegistryQuery::Applications,
        IpcQuery::EventListeners => RegistryQuery::EventListeners,
        IpcQuery::RegisteredEvents => RegistryQuery::RegisteredEvents,
        IpcQuery::KeystrokeListeners => RegistryQuery::KeystrokeListeners,
        IpcQuery::DeviceListeners => RegistryQuery::DeviceListeners,
        IpcQuery::GrabMasks => RegistryQuery::GrabMasks,
    };

    match registry.blocking_query(registry_query) {
        Ok(result) => query_response(result),
        Err(err) => IpcResponse::error(format!("Registry is not running: {err}")),
    }
}

fn query_response(result: QueryResult) -> IpcResponse {
    match result {
        QueryResult::Applications(apps) => IpcResponse::success(apps),
        QueryResult::Child(child) => IpcResponse::success(child),
        QueryResult::ChildCount(count) => IpcResponse::success(count),
        QueryResult::RegisteredEvents(events) => IpcResponse::success(events),
        QueryResult::EventListeners(listeners) => IpcResponse::success(listeners),
        QueryResult::KeystrokeListeners(listeners) => IpcResponse::success(listeners),
        QueryResult::DeviceListeners(listeners) => IpcResponse::success(listeners),
        QueryResult::GrabMasks(masks) => IpcResponse::success(masks),
        QueryResult::Status(status) => IpcResponse::success(status),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::actor::RegistryActor;
    use crate::ipc::send_query;
    use crate::registry::transport::fake::RecordingTransport;
    use crate::registry::{ObjectRef, Registry};

    #[test]
    fn test_server_answers_queries_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registryd.sock");

        let server = IpcServer::start(&path, |query| match query {
            IpcQuery::Ping => IpcResponse::success("pong"),
            _ => IpcResponse::error("unsupported"),
        })
        .unwrap();
        assert!(server.is_running());
        assert!(path.exists());

        assert_eq!(send_query(&path, IpcQuery::Ping).unwrap(), IpcResponse::success("pong"));
        assert_eq!(
            send_query(&path, IpcQuery::Status).unwrap(),
            IpcResponse::error("unsupported")
        );

        drop(server);
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_socket_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registryd.sock");
        std::fs::write(&path, b"stale").unwrap();

        let server = IpcServer::start(&path, |_| IpcResponse::success(true)).unwrap();
        assert_eq!(send_query(&path, IpcQuery::Ping).unwrap(), IpcResponse::success(true));
        server.stop();
        assert!(!server.is_running());
    }

    #[test]
    fn test_registry_queries_reach_the_actor() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let handle = runtime.block_on(async {
            let transport: Arc<RecordingTransport> = RecordingTransport::new();
            let handle = RegistryActor::spawn(Registry::headless(), transport);
            handle.embed(ObjectRef::new(":1.4", "/org/a11y/atspi/accessible/root")).await.unwrap();
            handle
        });

        let response = handle_registry_query(&handle, IpcQuery::Applications);
        let IpcResponse::Success { data } = response else {
            panic!("expected success, got {response:?}");
        };
        assert_eq!(data[0]["reference"]["name"], ":1.4");
        assert_eq!(data[0]["id"], 1);

        let IpcResponse::Success { data } = handle_registry_query(&handle, IpcQuery::Status)
        else {
            panic!("status failed");
        };
        assert_eq!(data["applications"], 1);

        assert_eq!(handle_registry_query(&handle, IpcQuery::Ping), IpcResponse::success("pong"));
    }
}
