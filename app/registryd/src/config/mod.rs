//! Configuration module for registryd.
//!
//! The configuration is loaded once at startup and shared through
//! [`get_config`]. A missing file yields the defaults; a malformed file is
//! reported and also yields the defaults, so the daemon always starts.

mod path;
pub mod types;

use std::path::PathBuf;
use std::sync::OnceLock;

pub use path::expand;
pub use types::{
    BusConfig, ConfigError, IpcConfig, KeyboardConfig, MousePollConfig, RegistryConfig,
    config_paths, load_config as load_config_default, load_config_from_path,
};

use crate::constants::APP_ID;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "REGISTRYD_CONFIG";

/// Global configuration instance, loaded once at startup.
static CONFIG: OnceLock<RegistryConfig> = OnceLock::new();

/// Path to the currently loaded configuration file.
static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Custom config path override (set via CLI --config flag).
static CUSTOM_CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Sets a custom configuration file path to use instead of the default search paths.
///
/// This must be called before `init()` or `get_config()` to take effect.
///
/// # Returns
///
/// `true` if the path was set successfully, `false` if a path was already set.
pub fn set_custom_config_path(path: PathBuf) -> bool { CUSTOM_CONFIG_PATH.set(path).is_ok() }

fn load_or_default() -> RegistryConfig {
    let result = CUSTOM_CONFIG_PATH
        .get()
        .map_or_else(load_config_default, |path| load_config_from_path(path));

    match result {
        Ok((config, path)) => {
            tracing::debug!(path = %path.display(), "config: loaded");
            let _ = CONFIG_PATH.set(path);
            config
        }
        Err(ConfigError::NotFound) => {
            tracing::debug!("config: no configuration file, using defaults");
            RegistryConfig::default()
        }
        Err(err) => {
            tracing::warn!(error = %err, "config: failed to load configuration, using defaults");
            RegistryConfig::default()
        }
    }
}

/// Initializes and returns the global configuration instance.
///
/// This function is idempotent - calling it multiple times will return
/// the same configuration instance.
pub fn init() -> &'static RegistryConfig { CONFIG.get_or_init(load_or_default) }

/// Returns the global configuration instance, initializing it if necessary.
pub fn get_config() -> &'static RegistryConfig { CONFIG.get_or_init(load_or_default) }

/// Returns the path to the loaded configuration file, if any.
pub fn get_config_path() -> Option<&'static PathBuf> { CONFIG_PATH.get() }

/// Control socket location for `config`.
///
/// Uses `ipc.socketPath` when set, else `$XDG_RUNTIME_DIR/registryd.sock`,
/// else the cache directory, else the temp directory.
#[must_use]
pub fn socket_path(config: &RegistryConfig) -> PathBuf {
    if let Some(path) = config.ipc.socket_path.as_deref() {
        return expand(path);
    }

    let file_name = format!("{APP_ID}.sock");
    dirs::runtime_dir()
        .or_else(|| dirs::cache_dir().map(|dir| dir.join(APP_ID)))
        .unwrap_or_else(std::env::temp_dir)
        .join(file_name)
}
