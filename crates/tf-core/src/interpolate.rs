//! `${VAR}` and `${VAR:default}` expansion for configuration values

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Placeholder pattern: variable name up to `}` or `:`, optional default
static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("valid regex"))
}

/// Expand placeholders using `lookup` for variable values.
///
/// A variable that `lookup` does not know expands to its default, or to the
/// empty string when no default is given. Text without placeholders is
/// returned unchanged.
pub fn interpolate_str(value: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    if !value.contains("${") {
        return value.to_string();
    }
    placeholder_regex()
        .replace_all(value, |caps: &Captures<'_>| {
            let name = &caps[1];
            lookup(name).unwrap_or_else(|| {
                caps.get(2)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
        })
        .into_owned()
}

/// Look a variable up in the process environment
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Expand placeholders from the process environment
pub fn interpolate_env(value: &str) -> String {
    interpolate_str(value, &env_lookup)
}

#[cfg(test)]
#[path = "interpolate_test.rs"]
mod tests;
