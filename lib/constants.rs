//! Constants for pak.
//!
//! This module contains all path, file name and environment variable constants.

use std::path::PathBuf;
use std::sync::LazyLock;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The manifest file name at the root of every bundle.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata file written next to the extracted bundle contents.
pub const CACHE_METADATA_FILE: &str = ".pak-meta.json";

/// Config store file name inside the home directory.
pub const CONFIG_FILE: &str = "config.json";

/// Schema version written into the config store file.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Default registry URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.pak.dev";

/// Environment variable for a custom registry URL.
pub const REGISTRY_URL_ENV: &str = "PAK_REGISTRY_URL";

/// Environment variable overriding the pak home directory.
pub const PAK_HOME_ENV: &str = "PAK_HOME";

/// Prefix for reading user_config values from the environment (`PAK_USER_CONFIG_<KEY>`).
pub const USER_CONFIG_ENV_PREFIX: &str = "PAK_USER_CONFIG";

/// Marker replaced with the absolute cache directory.
pub const DIRNAME_PLACEHOLDER: &str = "${__dirname}";

/// Subdirectory of a python bundle holding vendored dependencies.
pub const PYTHON_DEPS_DIR: &str = "deps";

/// Search-path variable for python dependencies.
pub const PYTHONPATH_ENV: &str = "PYTHONPATH";

/// Interpreter used for node bundles that declare no command.
pub const DEFAULT_NODE_COMMAND: &str = "node";

/// Generic python interpreter name.
pub const PYTHON_COMMAND: &str = "python";

/// Preferred python interpreter name, probed before falling back to `python`.
pub const PYTHON3_COMMAND: &str = "python3";

/// Exit status for any fatal error raised by pak itself.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Default home directory for pak state.
pub static DEFAULT_HOME_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Some(home) = std::env::var_os(PAK_HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .map(|h| h.join(".pak"))
        .unwrap_or_else(|| PathBuf::from(".pak"))
});

/// Default root of the bundle cache.
pub static DEFAULT_CACHE_PATH: LazyLock<PathBuf> =
    LazyLock::new(|| DEFAULT_HOME_PATH.join("cache"));

/// Default path of the config store file.
pub static DEFAULT_CONFIG_PATH: LazyLock<PathBuf> =
    LazyLock::new(|| DEFAULT_HOME_PATH.join(CONFIG_FILE));

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Environment variable name consulted for a user_config key.
pub fn user_config_env_var(key: &str) -> String {
    format!("{}_{}", USER_CONFIG_ENV_PREFIX, key.to_uppercase())
}

/// Pick the registry URL: env var first, then the stored override, then the default.
pub fn get_registry_url(stored: Option<&str>) -> String {
    std::env::var(REGISTRY_URL_ENV)
        .ok()
        .filter(|url| !url.is_empty())
        .or_else(|| stored.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string())
}
