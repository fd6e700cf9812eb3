//! Tenant configuration discovery and loading
//!
//! A tenants directory holds one configuration per tenant, either as
//! `<dir>/<tenant>/config.yaml` or, in the legacy layout, as
//! `<dir>/tenant_<id>.yaml`. Directories starting with `_` or `.` (templates,
//! hidden folders) are skipped.

use crate::error::{CoreError, CoreResult};
use crate::interpolate::env_lookup;
use crate::spec::{RawTenant, TenantSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File name of a tenant's configuration inside its directory
pub const TENANT_CONFIG_FILE: &str = "config.yaml";

const LEGACY_PREFIX: &str = "tenant_";

/// A configuration file found during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredConfig {
    /// Tenant name implied by the layout (directory name or file suffix)
    pub hint: String,
    pub path: PathBuf,
}

/// Find tenant configuration files, directory layout first, each group sorted.
///
/// A legacy file is skipped when a tenant directory with the same name exists.
pub fn discover_tenant_configs(dir: &Path) -> CoreResult<Vec<DiscoveredConfig>> {
    if !dir.is_dir() {
        return Err(CoreError::ConfigNotFound {
            path: dir.display().to_string(),
        });
    }

    let mut from_dirs = Vec::new();
    let mut legacy = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source: e,
    })? {
        let entry = entry.map_err(|e| CoreError::IoWithPath {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            log::warn!("Skipping non UTF-8 path {}", path.display());
            continue;
        };

        if path.is_dir() {
            if name.starts_with('_') || name.starts_with('.') {
                continue;
            }
            let config = path.join(TENANT_CONFIG_FILE);
            if config.is_file() {
                from_dirs.push(DiscoveredConfig { hint: name, path: config });
            }
        } else if let Some(id) = name
            .strip_prefix(LEGACY_PREFIX)
            .and_then(|rest| rest.strip_suffix(".yaml"))
        {
            legacy.push(DiscoveredConfig {
                hint: id.to_string(),
                path,
            });
        }
    }

    from_dirs.sort_by(|a, b| a.path.cmp(&b.path));
    legacy.sort_by(|a, b| a.path.cmp(&b.path));
    legacy.retain(|file| {
        let shadowed = from_dirs.iter().any(|d| d.hint == file.hint);
        if shadowed {
            log::debug!(
                "Ignoring legacy config {}: directory layout already provides '{}'",
                file.path.display(),
                file.hint
            );
        }
        !shadowed
    });

    from_dirs.extend(legacy);
    Ok(from_dirs)
}

/// Read, interpolate and validate one tenant configuration file
pub fn load_tenant_file(path: &Path) -> CoreResult<TenantSpec> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut raw = RawTenant::from_yaml_str(&content).map_err(|e| CoreError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    raw.interpolate_with(&env_lookup);
    Ok(TenantSpec::from_raw(raw)?)
}

/// A validated tenant together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedTenant {
    pub spec: TenantSpec,
    pub config_path: PathBuf,
}

impl LoadedTenant {
    /// Directory containing the configuration file
    pub fn config_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// SQL-model manifest location, resolved against the configuration directory
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.spec
            .sql_models()
            .manifest_path
            .as_ref()
            .map(|p| if p.is_absolute() { p.clone() } else { self.config_dir().join(p) })
    }
}

/// A configuration file that could not be loaded
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: CoreError,
}

/// Every tenant found in a tenants directory.
///
/// A broken file does not stop the others from loading; it is recorded as a
/// [`LoadFailure`] instead.
#[derive(Debug, Default)]
pub struct TenantCatalog {
    tenants: Vec<LoadedTenant>,
    failures: Vec<LoadFailure>,
}

impl TenantCatalog {
    /// Discover and load every tenant configuration under `dir`
    pub fn load_dir(dir: &Path) -> CoreResult<Self> {
        let mut catalog = Self::default();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();

        for found in discover_tenant_configs(dir)? {
            let spec = match load_tenant_file(&found.path) {
                Ok(spec) => spec,
                Err(error) => {
                    log::warn!("Failed to load tenant config {}: {}", found.path.display(), error);
                    catalog.failures.push(LoadFailure {
                        path: found.path,
                        error,
                    });
                    continue;
                }
            };

            let id = spec.id().to_string();
            if let Some(first) = seen.get(&id) {
                let error = CoreError::DuplicateTenant {
                    tenant: id,
                    first: first.display().to_string(),
                    second: found.path.display().to_string(),
                };
                log::warn!("{error}");
                catalog.failures.push(LoadFailure {
                    path: found.path,
                    error,
                });
                continue;
            }

            if id != found.hint {
                log::debug!(
                    "Tenant id '{}' differs from its location name '{}' ({})",
                    id,
                    found.hint,
                    found.path.display()
                );
            }
            log::info!(
                "Loaded tenant: {} ({}), {} pipeline(s)",
                id,
                spec.name(),
                spec.pipelines().len()
            );
            seen.insert(id, found.path.clone());
            catalog.tenants.push(LoadedTenant {
                spec,
                config_path: found.path,
            });
        }

        Ok(catalog)
    }

    /// Loaded tenants in discovery order
    pub fn tenants(&self) -> &[LoadedTenant] {
        &self.tenants
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn get(&self, tenant: &str) -> Option<&LoadedTenant> {
        self.tenants.iter().find(|t| t.spec.id() == tenant)
    }

    pub fn into_parts(self) -> (Vec<LoadedTenant>, Vec<LoadFailure>) {
        (self.tenants, self.failures)
    }
}

#[cfg(test)]
#[path = "loading_test.rs"]
mod tests;
