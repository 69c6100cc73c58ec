//! `pak config` handlers.

use std::collections::{BTreeMap, BTreeSet};

use colored::Colorize;

use crate::cache::CacheStore;
use crate::commands::ConfigCommand;
use crate::config_store::ConfigStore;
use crate::constants::{DEFAULT_REGISTRY_URL, REGISTRY_URL_ENV, get_registry_url};
use crate::error::{PakError, PakResult};
use crate::manifest::read_manifest;
use crate::references::PackageRef;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Dispatch a `pak config` subcommand against the default store and cache.
pub async fn config_pak(cmd: ConfigCommand) -> PakResult<()> {
    let mut store = ConfigStore::load_default()?;
    let cache = CacheStore::default();

    match cmd {
        ConfigCommand::Set { package, values } => config_set(&mut store, &package, &values),
        ConfigCommand::Get { package, key } => config_get(&store, &cache, &package, key.as_deref()),
        ConfigCommand::Clear { package, keys } => config_clear(&mut store, &package, &keys),
        ConfigCommand::Registry { url, reset } => config_registry(&mut store, url, reset),
    }
}

/// Save `KEY=VALUE` pairs for a package.
pub fn config_set(store: &mut ConfigStore, package: &str, values: &[String]) -> PakResult<()> {
    let package = PackageRef::parse(package);
    let values = parse_config_values(values)?;

    if values.is_empty() {
        return Err(PakError::Generic(
            "No values given. Expected one or more KEY=VALUE".into(),
        ));
    }

    for (key, value) in &values {
        store.set_value(package.name(), key, value)?;
    }

    println!(
        "  {} Saved {} value(s) for {}",
        "✓".bright_green(),
        values.len(),
        package.name().bright_cyan()
    );
    Ok(())
}

/// Show saved values for a package, masking fields the cached manifest marks sensitive.
pub fn config_get(
    store: &ConfigStore,
    cache: &CacheStore,
    package: &str,
    key: Option<&str>,
) -> PakResult<()> {
    let package = PackageRef::parse(package);
    let name = package.name();
    let sensitive = sensitive_keys(cache, name);

    let Some(values) = store.package_config(name) else {
        println!("  {} No saved config for {}", "·".dimmed(), name.bright_cyan());
        return Ok(());
    };

    match key {
        Some(key) => {
            let value = values.get(key).ok_or_else(|| {
                PakError::Generic(format!("No saved value for '{}' in {}", key, name))
            })?;
            println!("{}", display_value(key, value, &sensitive));
        }
        None => {
            println!("  {}", name.bright_cyan().bold());
            for (key, value) in values {
                println!(
                    "    {} = {}",
                    key.bright_white(),
                    display_value(key, value, &sensitive)
                );
            }
        }
    }

    Ok(())
}

/// Remove saved values. With no keys every value for the package goes.
pub fn config_clear(store: &mut ConfigStore, package: &str, keys: &[String]) -> PakResult<()> {
    let package = PackageRef::parse(package);
    let name = package.name();

    if keys.is_empty() {
        if store.clear_package(name)? {
            println!("  {} Cleared config for {}", "✓".bright_green(), name.bright_cyan());
        } else {
            println!("  {} No saved config for {}", "·".dimmed(), name.bright_cyan());
        }
        return Ok(());
    }

    for key in keys {
        if store.clear_value(name, key)? {
            println!("  {} Removed {}", "✓".bright_green(), key.bright_white());
        } else {
            println!("  {} {} was not set", "·".dimmed(), key.bright_white());
        }
    }

    Ok(())
}

/// Show, set or reset the registry URL override.
pub fn config_registry(store: &mut ConfigStore, url: Option<String>, reset: bool) -> PakResult<()> {
    if reset {
        store.set_registry_url(None)?;
        println!(
            "  {} Registry reset to {}",
            "✓".bright_green(),
            DEFAULT_REGISTRY_URL.bright_cyan()
        );
        return Ok(());
    }

    if let Some(url) = url {
        let url = url.trim_end_matches('/').to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PakError::Generic(format!(
                "Invalid registry URL '{}'. Expected http:// or https://",
                url
            )));
        }
        store.set_registry_url(Some(url.clone()))?;
        println!("  {} Registry set to {}", "✓".bright_green(), url.bright_cyan());
        return Ok(());
    }

    let effective = get_registry_url(store.registry_url());
    let source = if std::env::var(REGISTRY_URL_ENV).is_ok_and(|v| !v.is_empty()) {
        REGISTRY_URL_ENV
    } else if store.registry_url().is_some() {
        "config"
    } else {
        "default"
    };
    println!("{} {}", effective, format!("({})", source).dimmed());
    Ok(())
}

/// Parse `KEY=VALUE` arguments.
fn parse_config_values(values: &[String]) -> PakResult<BTreeMap<String, String>> {
    let mut config = BTreeMap::new();

    for value in values {
        match value.split_once('=') {
            Some((key, val)) if !key.trim().is_empty() => {
                config.insert(key.trim().to_string(), val.to_string());
            }
            _ => {
                return Err(PakError::Generic(format!(
                    "Invalid config format '{}'. Expected KEY=VALUE",
                    value
                )));
            }
        }
    }

    Ok(config)
}

/// Keys the cached manifest of `package` marks as sensitive, if it is cached.
fn sensitive_keys(cache: &CacheStore, package: &str) -> BTreeSet<String> {
    cache
        .lookup(package)
        .and_then(|_| read_manifest(&cache.cache_dir(package)).ok())
        .map(|m| {
            m.user_config
                .iter()
                .filter(|(_, field)| field.is_sensitive())
                .map(|(key, _)| key.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn display_value(key: &str, value: &str, sensitive: &BTreeSet<String>) -> String {
    if sensitive.contains(key) {
        mask_sensitive(value)
    } else {
        value.to_string()
    }
}

/// Mask a sensitive value for display.
fn mask_sensitive(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "***".to_string()
    } else {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
