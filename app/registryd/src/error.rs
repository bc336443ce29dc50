//! Error types for registryd.
//!
//! [`RegistryError`] is the crate-wide error. Every variant carries a plain
//! message so errors can be serialized into control-socket replies and
//! mapped onto bus error replies.

use serde::Serialize;
use thiserror::Error;

use crate::actor::ActorError;
use crate::config::ConfigError;

/// Errors that can occur while brokering registrations.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum RegistryError {
    /// Invalid request arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// An event type string did not parse.
    #[error("Invalid event type: {0}")]
    InvalidEventType(String),
    /// A message body did not match any accepted signature.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Accessibility bus error.
    #[error("Bus error: {0}")]
    BusError(String),
    /// Control socket error.
    #[error("IPC error: {0}")]
    IpcError(String),
    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
    /// The registry actor could not be reached.
    #[error("Actor error: {0}")]
    ActorError(String),
    /// Generic command error.
    #[error("{0}")]
    CommandError(String),
}

impl RegistryError {
    /// D-Bus error name used when replying to a failed method call.
    #[must_use]
    pub const fn dbus_name(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) | Self::InvalidEventType(_) | Self::MalformedPayload(_) => {
                "org.freedesktop.DBus.Error.InvalidArgs"
            }
            _ => "org.freedesktop.DBus.Error.Failed",
        }
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err.to_string()) }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self { Self::CommandError(err.to_string()) }
}

impl From<zbus::Error> for RegistryError {
    fn from(err: zbus::Error) -> Self { Self::BusError(err.to_string()) }
}

impl From<ActorError> for RegistryError {
    fn from(err: ActorError) -> Self { Self::ActorError(err.to_string()) }
}

impl From<ConfigError> for RegistryError {
    fn from(err: ConfigError) -> Self { Self::ConfigError(err.to_string()) }
}

impl From<String> for RegistryError {
    fn from(msg: String) -> Self { Self::CommandError(msg) }
}

impl From<&str> for RegistryError {
    fn from(msg: &str) -> Self { Self::CommandError(msg.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_arguments_display() {
        let err = RegistryError::InvalidArguments("invalid keycode -1".to_string());
        assert_eq!(err.to_string(), "invalid keycode -1");
    }

    #[test]
    fn test_invalid_event_type_display() {
        let err = RegistryError::InvalidEventType("empty event type".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Invalid event type"));
        assert!(msg.contains("empty event type"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err: RegistryError = io_err.into();
        assert!(matches!(err, RegistryError::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_actor_error_conversion() {
        let err: RegistryError = ActorError::SendFailed.into();
        assert!(matches!(err, RegistryError::ActorError(_)));
        assert!(err.to_string().contains("channel closed"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: RegistryError = ConfigError::NotFound.into();
        assert!(matches!(err, RegistryError::ConfigError(_)));
    }

    #[test]
    fn test_from_str() {
        let err: RegistryError = "test error".into();
        assert!(matches!(err, RegistryError::CommandError(_)));
    }

    #[test]
    fn test_dbus_error_names() {
        assert_eq!(
            RegistryError::InvalidEventType(String::new()).dbus_name(),
            "org.freedesktop.DBus.Error.InvalidArgs"
        );
        assert_eq!(
            RegistryError::BusError(String::new()).dbus_name(),
            "org.freedesktop.DBus.Error.Failed"
        );
    }

    #[test]
    fn test_error_serializes_with_kind() {
        let err = RegistryError::MalformedPayload("bad signature".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("MalformedPayload"));
        assert!(json.contains("bad signature"));
    }
}
