//! Client side of the control socket, used by the inspection commands.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use super::{DEFAULT_TIMEOUT_MS, IpcQuery, IpcResponse};

/// Number of attempts for transient connection failures.
const MAX_RETRIES: u32 = 3;

/// Delay between attempts in milliseconds.
const RETRY_DELAY_MS: u64 = 100;

/// Errors of a control socket round trip.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// No daemon listens on the socket.
    #[error("registryd is not running")]
    DaemonNotRunning,

    #[error("Connection timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Sends `query` to the daemon listening on `socket_path`.
///
/// Retries up to three times while the daemon cannot be reached.
///
/// # Errors
///
/// Returns [`IpcError::DaemonNotRunning`] when nothing listens on the
/// socket, or the error of the last attempt.
pub fn send_query(socket_path: &Path, query: IpcQuery) -> Result<IpcResponse, IpcError> {
    let mut last_error = IpcError::DaemonNotRunning;

    for attempt in 0..MAX_RETRIES {
        match send_query_once(socket_path, query) {
            Ok(response) => return Ok(response),
            Err(err) => {
                last_error = err;
                if !matches!(last_error, IpcError::DaemonNotRunning) {
                    break;
                }
                if attempt < MAX_RETRIES - 1 {
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
            }
        }
    }

    Err(last_error)
}

fn send_query_once(socket_path: &Path, query: IpcQuery) -> Result<IpcResponse, IpcError> {
    if !socket_path.exists() {
        return Err(IpcError::DaemonNotRunning);
    }

    let mut stream = UnixStream::connect(socket_path).map_err(|err| match err.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::NotFound
        | ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset => IpcError::DaemonNotRunning,
        _ => IpcError::Io(err),
    })?;

    let timeout = Duration::from_millis(DEFAULT_TIMEOUT_MS);
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let query_json = serde_json::to_string(&query)
        .map_err(|err| IpcError::InvalidResponse(format!("Failed to serialize query: {err}")))?;

    writeln!(stream, "{query_json}").map_err(|err| {
        if err.kind() == ErrorKind::BrokenPipe {
            IpcError::DaemonNotRunning
        } else {
            IpcError::Io(err)
        }
    })?;

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).map_err(|err| match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => IpcError::Timeout,
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => IpcError::DaemonNotRunning,
        _ => IpcError::Io(err),
    })?;

    serde_json::from_str(response_line.trim())
        .map_err(|err| IpcError::InvalidResponse(format!("Failed to parse response: {err}")))
}

/// Whether a daemon answers pings on `socket_path`.
#[must_use]
pub fn is_daemon_running(socket_path: &Path) -> bool {
    matches!(send_query(socket_path, IpcQuery::Ping), Ok(IpcResponse::Success { .. }))
}
