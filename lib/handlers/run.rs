//! `pak run` handler.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use colored::Colorize;

use crate::cache::{ArchiveExtractor, CacheMetadata, CacheStore, ZipExtractor, pull_required};
use crate::config_store::ConfigStore;
use crate::constants::get_registry_url;
use crate::error::PakResult;
use crate::launcher::{LaunchPlan, build_launch_plan, command_available, supervise};
use crate::manifest::read_manifest;
use crate::platform::{Platform, detect_platform};
use crate::prompt::{LinePrompt, TerminalPrompt, is_interactive};
use crate::references::PackageRef;
use crate::registry::{RegistryClient, RegistryGateway, verify_checksum};
use crate::user_config::{ambient_env, resolve_user_config};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Version requested from the registry when none is given.
const LATEST: &str = "latest";

/// File name of the downloaded artifact inside the scratch directory.
const DOWNLOAD_FILE: &str = "bundle.mcpb";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Fetch (if needed), configure and run a package. Returns the server's exit code.
pub async fn run_package(package: &str, update: bool) -> PakResult<i32> {
    let package = PackageRef::parse(package);
    let mut store = ConfigStore::load_default()?;
    let gateway = RegistryClient::new(get_registry_url(store.registry_url()))?;
    let cache = CacheStore::default();
    let ambient = ambient_env();

    let mut terminal = is_interactive().then(TerminalPrompt::new);
    let prompt = terminal.as_mut().map(|p| p as &mut dyn LinePrompt);

    let plan = prepare_launch(
        &package,
        update,
        &cache,
        &gateway,
        &ZipExtractor,
        detect_platform(),
        &mut store,
        &ambient,
        prompt,
        &command_available,
    )
    .await?;

    eprintln!(
        "  {} Starting {}",
        "→".bright_blue(),
        package.name().bright_cyan()
    );

    supervise(&plan).await
}

/// Everything up to the spawn: cache, manifest, user config and launch plan.
#[allow(clippy::too_many_arguments)]
pub async fn prepare_launch(
    package: &PackageRef,
    update: bool,
    cache: &CacheStore,
    gateway: &dyn RegistryGateway,
    extractor: &dyn ArchiveExtractor,
    platform: Platform,
    store: &mut ConfigStore,
    ambient: &BTreeMap<String, String>,
    prompt: Option<&mut dyn LinePrompt>,
    probe: &dyn Fn(&str) -> bool,
) -> PakResult<LaunchPlan> {
    let cache_dir = ensure_cached(cache, gateway, extractor, package, platform, update).await?;
    let manifest = read_manifest(&cache_dir)?;

    let values = resolve_user_config(
        package.name(),
        &manifest.user_config,
        store,
        ambient,
        prompt,
    )?;

    build_launch_plan(&manifest, &cache_dir, &values, ambient, probe)
}

/// Make sure an extracted copy of `package` is in the cache and return its directory.
pub async fn ensure_cached(
    cache: &CacheStore,
    gateway: &dyn RegistryGateway,
    extractor: &dyn ArchiveExtractor,
    package: &PackageRef,
    platform: Platform,
    force: bool,
) -> PakResult<PathBuf> {
    let name = package.name();
    let cache_dir = cache.cache_dir(name);
    let cached = cache.lookup(name);

    if !pull_required(cached.as_ref(), package.version(), force) {
        tracing::info!(package = name, "cache hit");
        return Ok(cache_dir);
    }

    let requested = package.version().unwrap_or(LATEST);
    let resolved = gateway.resolve(name, requested, platform).await?;
    tracing::info!(package = name, version = %resolved.version, "resolved bundle");

    if package.version().is_none()
        && cached
            .as_ref()
            .is_some_and(|meta| meta.version == resolved.version)
    {
        tracing::info!(package = name, "cached bundle is already the latest");
        return Ok(cache_dir);
    }

    eprintln!(
        "  {} Downloading {}@{}",
        "→".bright_blue(),
        name.bright_cyan(),
        resolved.version.bright_cyan()
    );

    let scratch = tempfile::TempDir::new()?;
    let archive = scratch.path().join(DOWNLOAD_FILE);
    gateway.download(&resolved, &archive).await?;

    if let Some(expected) = resolved.sha256.as_deref() {
        verify_checksum(&archive, expected, name)?;
    }

    CacheStore::remove_entry(&cache_dir)?;
    if let Err(e) = extractor.extract(&archive, &cache_dir) {
        discard_partial_entry(&cache_dir);
        return Err(e);
    }

    CacheStore::write_metadata(
        &cache_dir,
        &CacheMetadata {
            version: resolved.version.clone(),
            pulled_at: Utc::now(),
            platform: resolved.platform,
            name: Some(name.to_string()),
        },
    )?;

    eprintln!(
        "  {} Cached {}@{}",
        "✓".bright_green(),
        name.bright_cyan(),
        resolved.version.bright_cyan()
    );

    Ok(cache_dir)
}

/// Remove a half-extracted cache entry. Returns whether the directory is gone.
fn discard_partial_entry(cache_dir: &Path) -> bool {
    match CacheStore::remove_entry(cache_dir) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %cache_dir.display(), error = %e, "failed to remove partial cache entry");
            false
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PakError;
    use crate::registry::{ResolvedBundle, sha256_file};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const PACKAGE: &str = "@acme/tool";

    const MANIFEST: &str = r#"{
        "name": "@acme/tool",
        "version": "1.2.0",
        "server": {
            "type": "node",
            "entry_point": "server.sh",
            "mcp_config": {
                "command": "/bin/sh",
                "args": ["${__dirname}/server.sh", "${user_config.greeting}"],
                "env": { "GREETING": "${user_config.greeting}" }
            }
        },
        "user_config": {
            "greeting": { "type": "string", "default": "hello" }
        }
    }"#;

    /// Gateway serving zip bundles built on the fly.
    struct FakeGateway {
        latest: String,
        script: String,
        sha256: Option<String>,
        corrupt: bool,
        resolves: AtomicUsize,
        downloads: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn new(latest: &str) -> Self {
            Self {
                latest: latest.to_string(),
                script: "exit 0\n".to_string(),
                sha256: None,
                corrupt: false,
                resolves: AtomicUsize::new(0),
                downloads: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.resolves.load(Ordering::SeqCst),
                self.downloads.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl RegistryGateway for FakeGateway {
        async fn resolve(
            &self,
            _name: &str,
            version: &str,
            platform: Platform,
        ) -> PakResult<ResolvedBundle> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(version.to_string());

            let version = if version == LATEST {
                self.latest.clone()
            } else {
                version.to_string()
            };
            Ok(ResolvedBundle {
                url: format!("https://cdn.example/{}.mcpb", version),
                version,
                platform,
                size: None,
                sha256: self.sha256.clone(),
            })
        }

        async fn download(&self, _bundle: &ResolvedBundle, dest: &Path) -> PakResult<u64> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if self.corrupt {
                std::fs::write(dest, b"not a zip")?;
            } else {
                write_bundle(dest, &self.script);
            }
            Ok(std::fs::metadata(dest)?.len())
        }
    }

    fn write_bundle(path: &Path, script: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("manifest.json", options).unwrap();
        zip.write_all(MANIFEST.as_bytes()).unwrap();
        zip.start_file("server.sh", options).unwrap();
        zip.write_all(script.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    fn platform() -> Platform {
        detect_platform()
    }

    #[tokio::test]
    async fn test_miss_then_hit_without_registry_calls() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path());
        let gateway = FakeGateway::new("1.2.0");
        let package = PackageRef::parse(PACKAGE);

        let cache_dir = ensure_cached(&cache, &gateway, &ZipExtractor, &package, platform(), false)
            .await
            .unwrap();
        assert_eq!(cache_dir, dir.path().join("acme-tool"));
        assert!(cache_dir.join("manifest.json").exists());
        assert_eq!(gateway.calls(), (1, 1));
        assert_eq!(*gateway.requested.lock().unwrap(), vec!["latest"]);

        let meta = cache.lookup(PACKAGE).unwrap();
        assert_eq!(meta.version, "1.2.0");
        assert_eq!(meta.name.as_deref(), Some(PACKAGE));

        ensure_cached(&cache, &gateway, &ZipExtractor, &package, platform(), false)
            .await
            .unwrap();
        assert_eq!(gateway.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_explicit_version_pulls_only_when_different() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path());
        let gateway = FakeGateway::new("1.2.0");

        let latest = PackageRef::parse(PACKAGE);
        ensure_cached(&cache, &gateway, &ZipExtractor, &latest, platform(), false)
            .await
            .unwrap();

        let same = PackageRef::parse("@acme/tool@1.2.0");
        ensure_cached(&cache, &gateway, &ZipExtractor, &same, platform(), false)
            .await
            .unwrap();
        assert_eq!(gateway.calls(), (1, 1));

        let older = PackageRef::parse("@acme/tool@1.0.0");
        ensure_cached(&cache, &gateway, &ZipExtractor, &older, platform(), false)
            .await
            .unwrap();
        assert_eq!(gateway.calls(), (2, 2));
        assert_eq!(cache.lookup(PACKAGE).unwrap().version, "1.0.0");
    }

    #[tokio::test]
    async fn test_update_skips_download_when_latest_unchanged() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path());
        let gateway = FakeGateway::new("1.2.0");
        let package = PackageRef::parse(PACKAGE);

        ensure_cached(&cache, &gateway, &ZipExtractor, &package, platform(), false)
            .await
            .unwrap();
        let first = cache.lookup(PACKAGE).unwrap();

        ensure_cached(&cache, &gateway, &ZipExtractor, &package, platform(), true)
            .await
            .unwrap();
        assert_eq!(gateway.calls(), (2, 1));
        assert_eq!(cache.lookup(PACKAGE).unwrap(), first);
    }

    #[tokio::test]
    async fn test_update_replaces_stale_bundle() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path());
        let package = PackageRef::parse(PACKAGE);

        let old = FakeGateway::new("1.0.0");
        let cache_dir = ensure_cached(&cache, &old, &ZipExtractor, &package, platform(), false)
            .await
            .unwrap();
        std::fs::write(cache_dir.join("stale.txt"), "x").unwrap();

        let new = FakeGateway::new("2.0.0");
        ensure_cached(&cache, &new, &ZipExtractor, &package, platform(), true)
            .await
            .unwrap();
        assert_eq!(new.calls(), (1, 1));
        assert_eq!(cache.lookup(PACKAGE).unwrap().version, "2.0.0");
        assert!(!cache_dir.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path());
        let cache_dir = cache.cache_dir(PACKAGE);
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join(crate::constants::CACHE_METADATA_FILE), "{oops").unwrap();

        let gateway = FakeGateway::new("1.2.0");
        ensure_cached(
            &cache,
            &gateway,
            &ZipExtractor,
            &PackageRef::parse(PACKAGE),
            platform(),
            false,
        )
        .await
        .unwrap();
        assert_eq!(gateway.calls(), (1, 1));
        assert_eq!(cache.lookup(PACKAGE).unwrap().version, "1.2.0");
    }

    #[tokio::test]
    async fn test_extraction_failure_leaves_no_metadata() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path());
        let mut gateway = FakeGateway::new("1.2.0");
        gateway.corrupt = true;

        let result = ensure_cached(
            &cache,
            &gateway,
            &ZipExtractor,
            &PackageRef::parse(PACKAGE),
            platform(),
            false,
        )
        .await;
        assert!(matches!(result, Err(PakError::ExtractionFailed(_))));
        assert!(cache.lookup(PACKAGE).is_none());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_fatal() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path());
        let mut gateway = FakeGateway::new("1.2.0");
        gateway.sha256 = Some("00".into());

        let result = ensure_cached(
            &cache,
            &gateway,
            &ZipExtractor,
            &PackageRef::parse(PACKAGE),
            platform(),
            false,
        )
        .await;
        assert!(matches!(result, Err(PakError::ChecksumMismatch { .. })));
        assert!(!cache.cache_dir(PACKAGE).exists());
    }

    #[tokio::test]
    async fn test_checksum_match_is_accepted() {
        let scratch = TempDir::new().unwrap();
        let expected = scratch.path().join("expected.mcpb");
        let mut gateway = FakeGateway::new("1.2.0");
        write_bundle(&expected, &gateway.script);
        gateway.sha256 = Some(sha256_file(&expected).unwrap());

        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path());
        ensure_cached(
            &cache,
            &gateway,
            &ZipExtractor,
            &PackageRef::parse(PACKAGE),
            platform(),
            false,
        )
        .await
        .unwrap();
        assert!(cache.lookup(PACKAGE).is_some());
    }

    #[tokio::test]
    async fn test_stored_value_substituted_but_ambient_env_wins() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path().join("cache"));
        let mut store = ConfigStore::load(dir.path().join("config.json")).unwrap();
        store.set_value(PACKAGE, "greeting", "stored").unwrap();
        let gateway = FakeGateway::new("1.2.0");

        let mut ambient = BTreeMap::new();
        ambient.insert("GREETING".to_string(), "ambient".to_string());
        ambient.insert("PAK_USER_CONFIG_GREETING".to_string(), "env".to_string());

        let plan = prepare_launch(
            &PackageRef::parse(PACKAGE),
            false,
            &cache,
            &gateway,
            &ZipExtractor,
            platform(),
            &mut store,
            &ambient,
            None,
            &|_: &str| true,
        )
        .await
        .unwrap();

        let cache_dir = cache.cache_dir(PACKAGE);
        assert_eq!(plan.program, "/bin/sh");
        assert_eq!(
            plan.args,
            vec![
                cache_dir.join("server.sh").to_string_lossy().into_owned(),
                "stored".to_string()
            ]
        );
        assert_eq!(plan.env["GREETING"], "ambient");
        assert_eq!(plan.cwd, cache_dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cached_server_exit_code_is_returned() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path().join("cache"));
        let mut store = ConfigStore::load(dir.path().join("config.json")).unwrap();
        let mut gateway = FakeGateway::new("1.2.0");
        gateway.script = "[ \"$1\" = hello ] && exit 7\nexit 1\n".to_string();

        let plan = prepare_launch(
            &PackageRef::parse(PACKAGE),
            false,
            &cache,
            &gateway,
            &ZipExtractor,
            platform(),
            &mut store,
            &BTreeMap::new(),
            None,
            &|_: &str| true,
        )
        .await
        .unwrap();

        assert_eq!(supervise(&plan).await.unwrap(), 7);
    }

    #[test]
    fn test_discard_partial_entry_reports_cleanup_failure() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("acme-tool");
        std::fs::create_dir_all(partial.join("lib")).unwrap();
        std::fs::write(partial.join("lib/half.js"), "x").unwrap();
        assert!(discard_partial_entry(&partial));
        assert!(!partial.exists());

        let not_a_dir = dir.path().join("file");
        std::fs::write(&not_a_dir, "x").unwrap();
        assert!(!discard_partial_entry(&not_a_dir));
        assert!(not_a_dir.exists());
    }
}
