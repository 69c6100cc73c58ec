//! Local bundle cache.
//!
//! Each package gets one directory under the cache root holding the most
//! recently extracted bundle plus a small metadata record describing which
//! version and platform it came from.

use crate::constants::{CACHE_METADATA_FILE, DEFAULT_CACHE_PATH};
use crate::error::{PakError, PakResult};
use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Metadata stored alongside an extracted bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Resolved bundle version.
    pub version: String,

    /// When the bundle was pulled.
    pub pulled_at: DateTime<Utc>,

    /// Platform of the pulled artifact.
    pub platform: Platform,

    /// Package the directory was pulled for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Maps package names to cache directories.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

/// Capability for unpacking a downloaded bundle.
pub trait ArchiveExtractor {
    /// Extract `archive` into `dest_dir`, creating it if needed.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> PakResult<()>;
}

/// Extracts `.mcpb` (zip) bundles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CacheStore {
    /// Create a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for a package: `@scope/name` becomes `<root>/scope-name`.
    pub fn cache_dir(&self, name: &str) -> PathBuf {
        let dir_name = name.strip_prefix('@').unwrap_or(name).replace(['/', '\\'], "-");
        self.root.join(dir_name)
    }

    /// Read the metadata in `dir`. Missing or malformed files yield `None`.
    pub fn read_metadata(dir: &Path) -> Option<CacheMetadata> {
        let path = dir.join(CACHE_METADATA_FILE);
        let content = std::fs::read_to_string(&path).ok()?;

        match serde_json::from_str(&content) {
            Ok(meta) => Some(meta),
            Err(e) => {
                let err = PakError::CacheCorrupt {
                    path,
                    reason: e.to_string(),
                };
                tracing::warn!("{}; treating as cache miss", err);
                None
            }
        }
    }

    /// Metadata for `name`, ignoring records written for a different package.
    pub fn lookup(&self, name: &str) -> Option<CacheMetadata> {
        let meta = Self::read_metadata(&self.cache_dir(name))?;
        match meta.name.as_deref() {
            Some(owner) if owner != name => {
                tracing::warn!(
                    "cache directory for {} belongs to {}; treating as cache miss",
                    name,
                    owner
                );
                None
            }
            _ => Some(meta),
        }
    }

    /// Write metadata into `dir` through a temp file and rename.
    pub fn write_metadata(dir: &Path, meta: &CacheMetadata) -> PakResult<()> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(CACHE_METADATA_FILE);
        let tmp_path = dir.join(format!("{}.tmp", CACHE_METADATA_FILE));
        std::fs::write(&tmp_path, serde_json::to_string_pretty(meta)?)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Remove a cache directory tree if it exists.
    pub fn remove_entry(dir: &Path) -> PakResult<()> {
        match std::fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PakError::Io(e)),
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PATH.as_path())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Decide whether the registry must be consulted for a package.
///
/// A forced refresh always pulls. Otherwise a missing cache pulls, an explicit
/// version pulls only when it differs from the cached one, and a "latest"
/// request trusts whatever is cached.
pub fn pull_required(cached: Option<&CacheMetadata>, requested: Option<&str>, force: bool) -> bool {
    if force {
        return true;
    }

    match (cached, requested) {
        (None, _) => true,
        (Some(meta), Some(version)) => meta.version != version,
        (Some(_), None) => false,
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> PakResult<()> {
        use zip::ZipArchive;

        let failed = |what: &str, e: &dyn std::fmt::Display| {
            PakError::ExtractionFailed(format!("{}: {}", what, e))
        };

        std::fs::create_dir_all(dest_dir)
            .map_err(|e| failed("Failed to create cache directory", &e))?;

        let file =
            std::fs::File::open(archive).map_err(|e| failed("Failed to open bundle", &e))?;
        let mut zip =
            ZipArchive::new(file).map_err(|e| failed("Failed to read ZIP archive", &e))?;

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| failed("Failed to read archive entry", &e))?;

            let entry_path = entry.enclosed_name().ok_or_else(|| {
                PakError::ExtractionFailed(format!("Invalid entry path: {}", entry.name()))
            })?;
            let dest_path = dest_dir.join(entry_path);

            if entry.is_dir() {
                std::fs::create_dir_all(&dest_path)
                    .map_err(|e| failed("Failed to create directory", &e))?;
                continue;
            }

            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| failed("Failed to create directory", &e))?;
            }

            let mut out = std::fs::File::create(&dest_path)
                .map_err(|e| failed("Failed to create file", &e))?;
            std::io::copy(&mut entry, &mut out)
                .map_err(|e| failed("Failed to write file", &e))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&dest_path, std::fs::Permissions::from_mode(mode))
                    .map_err(|e| failed("Failed to set permissions", &e))?;
            }
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
