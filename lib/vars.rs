//! Placeholder substitution for manifest args and env values.
//!
//! Two independent, literal passes:
//! - `${__dirname}` becomes the absolute cache directory.
//! - `${user_config.KEY}` becomes the resolved value for `KEY`, or is left
//!   untouched when `KEY` has no value.
//!
//! Neither pass is recursive and there is no escape syntax.

use crate::constants::DIRNAME_PLACEHOLDER;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Regex pattern for user_config variable references. Keys run up to the closing brace.
const USER_CONFIG_VAR_PATTERN: &str = r"\$\{user_config\.([^}]+)\}";

/// Compiled regex for user_config variable references.
static USER_CONFIG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(USER_CONFIG_VAR_PATTERN).expect("Invalid regex pattern"));

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Replace every `${__dirname}` with `dirname`.
pub fn substitute_dirname(s: &str, dirname: &str) -> String {
    s.replace(DIRNAME_PLACEHOLDER, dirname)
}

/// Replace `${user_config.KEY}` references that have a value; keep the rest verbatim.
pub fn substitute_user_config(s: &str, values: &BTreeMap<String, String>) -> String {
    USER_CONFIG_REGEX
        .replace_all(s, |cap: &Captures| match values.get(&cap[1]) {
            Some(value) => value.clone(),
            None => cap[0].to_string(),
        })
        .into_owned()
}

/// Apply both passes to one string.
pub fn substitute(s: &str, dirname: &str, values: &BTreeMap<String, String>) -> String {
    substitute_user_config(&substitute_dirname(s, dirname), values)
}

/// Substitute every argument.
pub fn substitute_args(
    args: &[String],
    dirname: &str,
    values: &BTreeMap<String, String>,
) -> Vec<String> {
    args.iter().map(|a| substitute(a, dirname, values)).collect()
}

/// Substitute every env value. Keys are left alone.
pub fn substitute_env(
    env: &BTreeMap<String, String>,
    dirname: &str,
    values: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    env.iter()
        .map(|(k, v)| (k.clone(), substitute(v, dirname, values)))
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
