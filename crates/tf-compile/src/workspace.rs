//! Whole-directory compilation
//!
//! A [`Workspace`] is a tenants directory loaded into a
//! [`TenantCatalog`](tf_core::loading::TenantCatalog). Compiling it reads each
//! enabled tenant's SQL-model manifest (if configured) and compiles the tenant.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tf_core::error::CoreResult;
use tf_core::loading::{LoadFailure, LoadedTenant, TenantCatalog};
use tf_sqlmodel::SqlManifest;

use crate::batch::{compile_tenant_with, par_compile, TenantOutcome};

/// Tenants loaded from one directory
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    tenants: Vec<LoadedTenant>,
    load_failures: Vec<LoadFailure>,
}

impl Workspace {
    /// Load every tenant configuration under `dir`
    pub fn load(dir: &Path) -> CoreResult<Self> {
        let (tenants, load_failures) = TenantCatalog::load_dir(dir)?.into_parts();
        log::info!(
            "Loaded {} tenant(s) from {} ({} failed)",
            tenants.len(),
            dir.display(),
            load_failures.len()
        );
        Ok(Self {
            root: dir.to_path_buf(),
            tenants,
            load_failures,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tenants(&self) -> &[LoadedTenant] {
        &self.tenants
    }

    /// Configuration files that could not be loaded
    pub fn load_failures(&self) -> &[LoadFailure] {
        &self.load_failures
    }

    /// Compile every loaded tenant sequentially
    pub fn compile(&self, environment: Option<&str>) -> Vec<TenantOutcome> {
        self.tenants
            .iter()
            .map(|tenant| compile_loaded(tenant, environment))
            .collect()
    }

    /// Compile every loaded tenant in parallel; `num_threads` caps the pool
    pub fn compile_parallel(
        &self,
        environment: Option<&str>,
        num_threads: Option<usize>,
    ) -> Vec<TenantOutcome> {
        par_compile(&self.tenants, num_threads, |tenant| {
            compile_loaded(tenant, environment)
        })
    }
}

fn compile_loaded(tenant: &LoadedTenant, environment: Option<&str>) -> TenantOutcome {
    compile_tenant_with(&tenant.spec, environment, || match tenant.manifest_path() {
        Some(path) => SqlManifest::load(&path).map(Cow::Owned),
        None => Ok(Cow::Owned(SqlManifest::empty())),
    })
}

/// Load a tenants directory and compile everything in it
pub fn compile_workspace(dir: &Path, environment: Option<&str>) -> CoreResult<Vec<TenantOutcome>> {
    Ok(Workspace::load(dir)?.compile(environment))
}
