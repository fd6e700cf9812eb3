//! Strongly-typed identifiers for tenants and pipelines.
//!
//! Both identifiers share one invariant: lowercase ASCII letter first, then
//! lowercase letters, digits or underscores (`^[a-z][a-z0-9_]*$`). Keeping the
//! slash out of identifiers is what makes node keys unambiguous.

/// Returns `true` when `s` matches `^[a-z][a-z0-9_]*$`.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Define a strongly-typed identifier newtype.
///
/// Generates:
/// - The struct with `Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize`
/// - Custom `Deserialize` (rejects strings failing [`is_valid_identifier`])
/// - `try_new()` (returns Option), `as_str()`, `into_inner()`
/// - `Display`, `AsRef<str>`, `Deref<Target=str>`, `Borrow<str>`
/// - `TryFrom<&str>`, `PartialEq<str>`, `PartialEq<&str>`
macro_rules! define_identifier {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $Name(String);

        impl<'de> serde::Deserialize<'de> for $Name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $Name::try_new(s.clone()).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        concat!("invalid ", stringify!($Name), " '{}': expected ^[a-z][a-z0-9_]*$"),
                        s
                    ))
                })
            }
        }

        impl $Name {
            /// Try to create a new identifier, returning `None` if it fails the pattern.
            pub fn try_new(name: impl Into<String>) -> Option<Self> {
                let s = name.into();
                if $crate::identifier::is_valid_identifier(&s) {
                    Some(Self(s))
                } else {
                    None
                }
            }

            /// Return the underlying identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str { &self.0 }
        }

        impl TryFrom<&str> for $Name {
            type Error = String;
            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::try_new(s).ok_or_else(|| {
                    format!(concat!("invalid ", stringify!($Name), " '{}'"), s)
                })
            }
        }

        impl PartialEq<str> for $Name {
            fn eq(&self, other: &str) -> bool { self.0 == other }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool { self.0 == *other }
        }
    };
}

define_identifier! {
    /// Tenant identifier, unique across every loaded tenant.
    pub struct TenantId;
}

define_identifier! {
    /// Pipeline name, unique within one tenant.
    pub struct PipelineName;
}

#[cfg(test)]
#[path = "identifier_test.rs"]
mod tests;
