//! Error types for pak.

use crate::constants::user_config_env_var;
use std::path::PathBuf;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Result type for pak operations.
pub type PakResult<T> = Result<T, PakError>;

/// Error type for pak operations.
#[derive(Debug, Error)]
pub enum PakError {
    /// Cache metadata could not be read. Recovered locally as a cache miss.
    #[error("Cache metadata at {path} is unreadable: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    /// Bundle extraction failed.
    #[error("Failed to extract bundle: {0}")]
    ExtractionFailed(String),

    /// Downloaded bundle does not match the registry's checksum.
    #[error("Checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Manifest not found in the extracted bundle.
    #[error("manifest.json not found in {0}")]
    ManifestMissing(PathBuf),

    /// Manifest present but not usable.
    #[error("Invalid manifest at {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    /// The manifest declares a server type outside the supported set.
    #[error("Unsupported server type: {0}")]
    UnsupportedServerKind(String),

    /// The config store file exists but cannot be trusted.
    #[error("Config file {path} is corrupted: {reason}")]
    ConfigCorrupted { path: PathBuf, reason: String },

    /// Required user_config values could not be resolved.
    #[error("{}", missing_config_message(package, keys))]
    MissingRequiredConfig { package: String, keys: Vec<String> },

    /// The server process could not be started.
    #[error("Failed to start server: {0}")]
    SpawnFailure(String),

    /// Registry returned an error response.
    #[error("Registry error (HTTP {status}): {message}")]
    Registry { status: u16, message: String },

    /// User cancelled an interactive prompt.
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Names the missing keys along with both ways to supply them.
fn missing_config_message(package: &str, keys: &[String]) -> String {
    let env_vars: Vec<String> = keys.iter().map(|k| user_config_env_var(k)).collect();
    format!(
        "Missing required config for {}: {}. Run `pak config set {} KEY=value` or set {}",
        package,
        keys.join(", "),
        package,
        env_vars.join(", ")
    )
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_names_keys_and_remedies() {
        let err = PakError::MissingRequiredConfig {
            package: "@acme/tool".into(),
            keys: vec!["api_key".into(), "region".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("api_key, region"));
        assert!(msg.contains("pak config set @acme/tool"));
        assert!(msg.contains("PAK_USER_CONFIG_API_KEY"));
        assert!(msg.contains("PAK_USER_CONFIG_REGION"));
    }
}
