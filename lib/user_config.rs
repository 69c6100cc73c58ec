//! Resolution of user_config values.
//!
//! Each declared field is resolved from, in order: the config store, the
//! `PAK_USER_CONFIG_<KEY>` environment variable, then the declared default.
//! Required fields that are still missing are prompted for when a terminal is
//! available and are fatal otherwise.

use std::collections::BTreeMap;

use colored::Colorize;
use indexmap::IndexMap;

use crate::config_store::ConfigStore;
use crate::constants::user_config_env_var;
use crate::error::{PakError, PakResult};
use crate::manifest::UserConfigField;
use crate::prompt::{LinePrompt, is_affirmative};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolve every declared user_config field for `package`.
///
/// `ambient` is the process environment. Pass `None` for `prompt` when stdin
/// is not a terminal. Values answered interactively may be written to `store`.
pub fn resolve_user_config(
    package: &str,
    fields: &IndexMap<String, UserConfigField>,
    store: &mut ConfigStore,
    ambient: &BTreeMap<String, String>,
    prompt: Option<&mut dyn LinePrompt>,
) -> PakResult<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    let mut queued = Vec::new();

    for (key, field) in fields {
        let resolved = store
            .get_value(package, key)
            .map(str::to_string)
            .or_else(|| ambient.get(&user_config_env_var(key)).cloned())
            .or_else(|| field.default_string());

        match resolved {
            Some(value) => {
                values.insert(key.clone(), value);
            }
            None if field.is_required() => queued.push(key.as_str()),
            None => {}
        }
    }

    if queued.is_empty() {
        return Ok(values);
    }

    let Some(prompt) = prompt else {
        return Err(PakError::MissingRequiredConfig {
            package: package.to_string(),
            keys: queued.into_iter().map(str::to_string).collect(),
        });
    };

    eprintln!(
        "  {} {} needs configuration",
        "›".bright_cyan(),
        package.bright_white()
    );

    for key in queued {
        let field = &fields[key];
        let answer = prompt.read_line(&prompt_text(key, field), field.is_sensitive())?;

        if answer.is_empty() {
            match field.default_string() {
                Some(default) => {
                    values.insert(key.to_string(), default);
                    continue;
                }
                None => {
                    return Err(PakError::MissingRequiredConfig {
                        package: package.to_string(),
                        keys: vec![key.to_string()],
                    });
                }
            }
        }

        let save = prompt.read_line("Save for future runs? [Y/n]", false)?;
        if is_affirmative(&save) {
            store.set_value(package, key, &answer)?;
            tracing::debug!(package, key, "saved config value");
        }

        values.insert(key.to_string(), answer);
    }

    Ok(values)
}

/// Collect the process environment into a map.
pub fn ambient_env() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

/// Build the prompt text for a field: title, description and default hint.
fn prompt_text(key: &str, field: &UserConfigField) -> String {
    let mut text = field.title.clone().unwrap_or_else(|| key.to_string());

    if let Some(description) = field.description.as_deref().filter(|d| !d.is_empty()) {
        text.push_str(&format!(" ({})", description));
    }

    if let Some(default) = field.default_string() {
        text.push_str(&format!(" [default: {}]", default));
    }

    text
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
