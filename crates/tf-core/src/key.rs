//! Node keys: the `{tenant}/{kind}/{local_name}` naming scheme
//!
//! Every node in a compiled graph is identified by a [`NodeKey`]. Keys are
//! built only through [`key_for`], so equal triples always give equal keys and
//! different triples never collide (tenant ids cannot contain `/`).

use crate::identifier::TenantId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of work a node performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageKind {
    /// Read the source table into storage
    #[serde(rename = "extract")]
    Extract,
    /// Procedural transform over extracted data
    #[serde(rename = "transfer")]
    Transfer,
    /// Write to the configured sinks
    #[serde(rename = "load")]
    Load,
    /// Model managed by the SQL transformation tool
    #[serde(rename = "dbt")]
    SqlModel,
}

impl StageKind {
    /// All kinds, in pipeline order
    pub const ALL: [StageKind; 4] = [
        StageKind::Extract,
        StageKind::Transfer,
        StageKind::Load,
        StageKind::SqlModel,
    ];

    /// Token used in the textual key form
    pub fn token(self) -> &'static str {
        match self {
            StageKind::Extract => "extract",
            StageKind::Transfer => "transfer",
            StageKind::Load => "load",
            StageKind::SqlModel => "dbt",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.token() == token)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Globally unique node identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    tenant: TenantId,
    kind: StageKind,
    local_name: String,
}

/// Build the key for a node.
///
/// `local_name` is the pipeline name for extract, transfer and load nodes and
/// the model name for SQL-model nodes.
pub fn key_for(tenant: &TenantId, kind: StageKind, local_name: &str) -> NodeKey {
    NodeKey {
        tenant: tenant.clone(),
        kind,
        local_name: local_name.to_string(),
    }
}

impl NodeKey {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Parse the textual form produced by `Display`
    pub fn parse(text: &str) -> Result<Self, KeyParseError> {
        let mut parts = text.splitn(3, '/');
        let (Some(tenant), Some(kind), Some(local)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyParseError::Shape(text.to_string()));
        };
        let tenant =
            TenantId::try_new(tenant).ok_or_else(|| KeyParseError::Tenant(tenant.to_string()))?;
        let kind = StageKind::from_token(kind).ok_or_else(|| KeyParseError::Kind(kind.to_string()))?;
        if local.is_empty() {
            return Err(KeyParseError::Shape(text.to_string()));
        }
        Ok(key_for(&tenant, kind, local))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.kind, self.local_name)
    }
}

impl FromStr for NodeKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for NodeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Why a textual key could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("node key '{0}' must have the form tenant/kind/name")]
    Shape(String),

    #[error("invalid tenant id '{0}' in node key")]
    Tenant(String),

    #[error("unknown stage kind '{0}' in node key (expected extract, transfer, load or dbt)")]
    Kind(String),
}

#[cfg(test)]
#[path = "key_test.rs"]
mod tests;
