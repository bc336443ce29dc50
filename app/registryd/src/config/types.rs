//! Configuration types for registryd.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.
//! Every key is optional; missing keys take their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::{APP_ID, REGISTRY_BUS_NAME};
use crate::registry::{PollSettings, RegistrySettings, keymask};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Log filter directive used when `RUST_LOG` is not set
    /// (`error`, `warn`, `info`, `debug`, `trace`, or a full filter).
    pub log_level: String,

    /// Accessibility bus connection.
    pub bus: BusConfig,

    /// Timeout in milliseconds for each remote key or mouse listener call.
    pub listener_timeout_ms: u64,

    /// Pointer polling.
    pub mouse_poll: MousePollConfig,

    /// Keyboard handling.
    pub keyboard: KeyboardConfig,

    /// Control socket used by the introspection commands.
    pub ipc: IpcConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bus: BusConfig::default(),
            listener_timeout_ms: 3000,
            mouse_poll: MousePollConfig::default(),
            keyboard: KeyboardConfig::default(),
            ipc: IpcConfig::default(),
        }
    }
}

impl RegistryConfig {
    #[must_use]
    pub const fn listener_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_timeout_ms)
    }

    /// Settings handed to the registry core.
    #[must_use]
    pub const fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            numlock_physical_mask: self.keyboard.numlock_physical_mask,
            poll: PollSettings {
                enabled: self.mouse_poll.enabled,
                idle_interval: Duration::from_millis(self.mouse_poll.idle_interval_ms),
                moving_interval: Duration::from_millis(self.mouse_poll.moving_interval_ms),
            },
            relay_events: self.bus.relay_events,
        }
    }
}

/// Accessibility bus connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct BusConfig {
    /// Bus address. When absent the session bus is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Well-known name requested on the bus.
    pub name: String,

    /// Re-emit accessibility events raised by applications to the matching
    /// subscribers. Applications broadcast their own events, and a relayed
    /// copy carries the registry's bus name as its sender. Events the
    /// registry raises itself are always delivered.
    pub relay_events: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: None,
            name: REGISTRY_BUS_NAME.to_string(),
            relay_events: false,
        }
    }
}

/// Pointer polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct MousePollConfig {
    /// Whether the pointer is sampled while mouse listeners exist.
    pub enabled: bool,

    /// Sampling interval in milliseconds while the pointer rests.
    pub idle_interval_ms: u64,

    /// Sampling interval in milliseconds while the pointer moves.
    pub moving_interval_ms: u64,
}

impl Default for MousePollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_interval_ms: 100,
            moving_interval_ms: 20,
        }
    }
}

/// Keyboard settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyboardConfig {
    /// Modifier bit the platform reports for NumLock (`Mod2` = 16 on X11).
    pub numlock_physical_mask: u32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self { numlock_physical_mask: keymask::MOD2 }
    }
}

/// Control socket settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct IpcConfig {
    /// Socket path. Defaults to `$XDG_RUNTIME_DIR/registryd.sock`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
}

/// Errors that can occur when loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    NotFound,
    /// The configuration file exists but could not be read.
    IoError(std::io::Error),
    /// The configuration file contains invalid JSON.
    ParseError(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(
                f,
                "No configuration file found. Expected at ~/.config/registryd/config.jsonc \
                or ~/.config/registryd/config.json"
            ),
            Self::IoError(err) => write!(f, "Failed to read configuration file: {err}"),
            Self::ParseError(err) => write!(f, "Failed to parse configuration file: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::ParseError(err) => Some(err),
            Self::NotFound => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err) }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self { Self::ParseError(err) }
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Returns the possible configuration file paths in priority order.
///
/// The function checks the following locations (both `.jsonc` and `.json` variants):
/// 1. `$XDG_CONFIG_HOME/registryd/`
/// 2. `~/.config/registryd/`
/// 3. the platform configuration directory (`dirs::config_dir()`)
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    let mut dirs_to_search = Vec::new();

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        dirs_to_search.push(PathBuf::from(xdg_config).join(APP_ID));
    }
    if let Some(home) = dirs::home_dir() {
        dirs_to_search.push(home.join(".config").join(APP_ID));
    }
    if let Some(config_dir) = dirs::config_dir() {
        dirs_to_search.push(config_dir.join(APP_ID));
    }

    let mut paths = Vec::new();
    for dir in dirs_to_search {
        for filename in CONFIG_FILE_NAMES {
            let path = dir.join(filename);
            // XDG_CONFIG_HOME is usually ~/.config
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    paths
}

/// Loads the configuration from the first available config file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if no configuration file exists in any of the expected locations.
/// Returns `ConfigError::IoError` if a configuration file exists but could not be read.
/// Returns `ConfigError::ParseError` if the configuration file contains invalid JSON.
pub fn load_config() -> Result<(RegistryConfig, PathBuf), ConfigError> {
    for path in config_paths() {
        if path.exists() {
            return load_config_from_path(&path);
        }
    }

    Err(ConfigError::NotFound)
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist, and the same
/// read and parse errors as [`load_config`].
pub fn load_config_from_path(path: &Path) -> Result<(RegistryConfig, PathBuf), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound);
    }

    let file = fs::File::open(path)?;
    // Strip comments from JSONC before parsing
    let reader = json_comments::StripComments::new(file);
    let config: RegistryConfig = serde_json::from_reader(reader)?;
    Ok((config, path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.bus.name, "org.a11y.atspi.Registry");
        assert!(config.bus.address.is_none());
        assert_eq!(config.listener_timeout(), Duration::from_millis(3000));
        assert_eq!(config.keyboard.numlock_physical_mask, 16);
        assert!(config.mouse_poll.enabled);
        assert!(!config.bus.relay_events);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let json = r#"{ "mousePoll": { "idleIntervalMs": 250 } }"#;
        let config: RegistryConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.mouse_poll.idle_interval_ms, 250);
        assert_eq!(config.mouse_poll.moving_interval_ms, 20);
        assert_eq!(config.listener_timeout_ms, 3000);
    }

    #[test]
    fn test_registry_settings_conversion() {
        let config = RegistryConfig {
            keyboard: KeyboardConfig { numlock_physical_mask: keymask::MOD3 },
            bus: BusConfig { relay_events: true, ..BusConfig::default() },
            ..RegistryConfig::default()
        };
        let settings = config.registry_settings();

        assert_eq!(settings.numlock_physical_mask, keymask::MOD3);
        assert!(settings.relay_events);
        assert_eq!(settings.poll.idle_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_load_jsonc_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.jsonc");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{
                // verbose while debugging
                "logLevel": "debug",
                /* custom bus */
                "bus": {{ "address": "unix:path=/tmp/a11y" }}
            }}"#
        )
        .unwrap();

        let (config, loaded_from) = load_config_from_path(&path).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.bus.address.as_deref(), Some("unix:path=/tmp/a11y"));
        assert_eq!(loaded_from, path);
    }

    #[test]
    fn test_load_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_config_from_path(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_from_path(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_config_paths_end_in_app_dir() {
        for path in config_paths() {
            assert!(path.parent().is_some_and(|dir| dir.ends_with(APP_ID)));
        }
    }

    #[test]
    fn test_config_error_display() {
        assert!(ConfigError::NotFound.to_string().contains("No configuration file found"));
    }
}
