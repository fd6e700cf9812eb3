//! Shared serde helper functions used across multiple modules.

use serde::{Deserialize, Deserializer};

/// Serde default function that returns `true`.
///
/// Used for boolean fields that should default to enabled/active.
pub fn default_true() -> bool {
    true
}

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Combined with `#[serde(default)]`: an absent key yields `None`, `key: null`
/// yields `Some(None)` and `key: value` yields `Some(Some(value))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
