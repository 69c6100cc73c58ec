//! Persisted per-package configuration.
//!
//! A single JSON file holds saved user_config values for every package plus an
//! optional registry URL override. The store is loaded once per invocation and
//! handed by reference to whatever needs it; every mutation is written back
//! immediately.

use crate::constants::{CONFIG_SCHEMA_VERSION, DEFAULT_CONFIG_PATH};
use crate::error::{PakError, PakResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// On-disk layout of the config store. Unknown fields are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    /// Schema version.
    version: String,

    /// Time of the last write (RFC 3339).
    last_updated: String,

    /// Registry URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    registry_url: Option<String>,

    /// Saved values keyed by package name, then by config key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    packages: Option<BTreeMap<String, BTreeMap<String, String>>>,
}

/// Handle on the config store file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    data: ConfigFile,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ConfigStore {
    /// Load the store from the default location.
    pub fn load_default() -> PakResult<Self> {
        Self::load(DEFAULT_CONFIG_PATH.as_path())
    }

    /// Load the store from `path`. A missing file yields an empty store; a
    /// file that does not match the schema is reported as corrupted.
    pub fn load(path: impl Into<PathBuf>) -> PakResult<Self> {
        let path = path.into();

        let data = match std::fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| PakError::ConfigCorrupted {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigFile::empty(),
            Err(e) => return Err(PakError::Io(e)),
        };

        Ok(Self { path, data })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored registry URL override.
    pub fn registry_url(&self) -> Option<&str> {
        self.data.registry_url.as_deref()
    }

    /// Set or remove the registry URL override.
    pub fn set_registry_url(&mut self, url: Option<String>) -> PakResult<()> {
        self.data.registry_url = url;
        self.save()
    }

    /// All saved values for a package.
    pub fn package_config(&self, package: &str) -> Option<&BTreeMap<String, String>> {
        self.data.packages.as_ref()?.get(package)
    }

    /// A single saved value.
    pub fn get_value(&self, package: &str, key: &str) -> Option<&str> {
        self.package_config(package)?.get(key).map(String::as_str)
    }

    /// Save a value for a package.
    pub fn set_value(&mut self, package: &str, key: &str, value: &str) -> PakResult<()> {
        self.data
            .packages
            .get_or_insert_with(BTreeMap::new)
            .entry(package.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.save()
    }

    /// Remove a single value. Returns whether anything was removed.
    pub fn clear_value(&mut self, package: &str, key: &str) -> PakResult<bool> {
        let Some(packages) = self.data.packages.as_mut() else {
            return Ok(false);
        };
        let Some(values) = packages.get_mut(package) else {
            return Ok(false);
        };

        let removed = values.remove(key).is_some();
        if values.is_empty() {
            packages.remove(package);
        }

        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Remove every value saved for a package. Returns whether anything was removed.
    pub fn clear_package(&mut self, package: &str) -> PakResult<bool> {
        let removed = self
            .data
            .packages
            .as_mut()
            .and_then(|p| p.remove(package))
            .is_some();

        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Write the store back to disk via a temp file and rename.
    fn save(&mut self) -> PakResult<()> {
        if let Some(packages) = self.data.packages.as_mut() {
            packages.retain(|_, values| !values.is_empty());
        }
        if self.data.packages.as_ref().is_some_and(BTreeMap::is_empty) {
            self.data.packages = None;
        }

        self.data.version = CONFIG_SCHEMA_VERSION.to_string();
        self.data.last_updated = chrono::Utc::now().to_rfc3339();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl ConfigFile {
    fn empty() -> Self {
        Self {
            version: CONFIG_SCHEMA_VERSION.to_string(),
            last_updated: chrono::Utc::now().to_rfc3339(),
            registry_url: None,
            packages: None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::load(dir.path().join("config.json")).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.package_config("@acme/tool").is_none());
        assert!(store.registry_url().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_set_value_persists() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_value("@acme/tool", "api_key", "secret").unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.get_value("@acme/tool", "api_key"), Some("secret"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], CONFIG_SCHEMA_VERSION);
        assert!(raw["lastUpdated"].is_string());
        assert_eq!(raw["packages"]["@acme/tool"]["api_key"], "secret");
    }

    #[test]
    fn test_clearing_last_value_removes_package() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_value("@acme/tool", "a", "1").unwrap();
        store.set_value("@acme/tool", "b", "2").unwrap();

        assert!(store.clear_value("@acme/tool", "a").unwrap());
        assert_eq!(store.get_value("@acme/tool", "b"), Some("2"));

        assert!(store.clear_value("@acme/tool", "b").unwrap());
        assert!(store.package_config("@acme/tool").is_none());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(raw.get("packages").is_none());
    }

    #[test]
    fn test_clear_missing_value_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(!store.clear_value("@acme/tool", "a").unwrap());
        assert!(!store.clear_package("@acme/tool").unwrap());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_clear_package() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_value("@acme/tool", "a", "1").unwrap();
        store.set_value("@acme/other", "a", "1").unwrap();

        assert!(store.clear_package("@acme/tool").unwrap());
        let reloaded = store_in(&dir);
        assert!(reloaded.package_config("@acme/tool").is_none());
        assert_eq!(reloaded.get_value("@acme/other", "a"), Some("1"));
    }

    #[test]
    fn test_registry_url_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .set_registry_url(Some("https://mirror.example".into()))
            .unwrap();
        assert_eq!(
            store_in(&dir).registry_url(),
            Some("https://mirror.example")
        );
    }

    #[test]
    fn test_unknown_field_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"version":"1.0.0","lastUpdated":"2024-01-01T00:00:00Z","extra":true}"#,
        )
        .unwrap();

        let err = ConfigStore::load(&path).unwrap_err();
        assert!(matches!(err, PakError::ConfigCorrupted { .. }));
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn test_wrong_type_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"version":"1.0.0","lastUpdated":"x","packages":{"@a/b":{"k":1}}}"#,
        )
        .unwrap();

        assert!(matches!(
            ConfigStore::load(&path),
            Err(PakError::ConfigCorrupted { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            ConfigStore::load(&path),
            Err(PakError::ConfigCorrupted { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_value("@acme/tool", "token", "t").unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
