//! Compiling many tenants at once
//!
//! Each tenant compiles independently; one tenant's failure never affects the
//! others. Outcomes are returned in input order.

use rayon::prelude::*;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use tf_core::environment::resolve_environment;
use tf_core::error::{CoreError, CoreResult};
use tf_core::graph::TenantGraph;
use tf_core::identifier::TenantId;
use tf_core::spec::TenantSpec;
use tf_sqlmodel::SqlManifest;

use crate::compiler::compile;

/// Result of compiling one tenant
#[derive(Debug)]
pub enum OutcomeStatus {
    Compiled(TenantGraph),
    /// Tenant disabled for the environment; nothing was compiled
    Skipped { reason: String },
    Failed(CoreError),
}

/// Outcome for one tenant in a batch
#[derive(Debug)]
pub struct TenantOutcome {
    pub tenant: TenantId,
    /// Environment the tenant was (or would have been) compiled for
    pub environment: String,
    pub status: OutcomeStatus,
}

impl TenantOutcome {
    pub fn graph(&self) -> Option<&TenantGraph> {
        match &self.status {
            OutcomeStatus::Compiled(graph) => Some(graph),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CoreError> {
        match &self.status {
            OutcomeStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.status, OutcomeStatus::Compiled(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }
}

/// Outcome counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub compiled: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[TenantOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Compiled(_) => summary.compiled += 1,
                OutcomeStatus::Skipped { .. } => summary.skipped += 1,
                OutcomeStatus::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.compiled + self.skipped + self.failed
    }
}

/// Compile one tenant, honouring its enablement for the chosen environment.
///
/// The environment is picked by [`resolve_environment`]; a tenant without an
/// entry in `manifests` compiles against an empty manifest.
pub fn compile_tenant(
    tenant: &TenantSpec,
    environment: Option<&str>,
    manifests: &HashMap<TenantId, SqlManifest>,
) -> TenantOutcome {
    compile_tenant_with(tenant, environment, || {
        Ok(manifests
            .get(tenant.id())
            .map_or_else(|| Cow::Owned(SqlManifest::empty()), Cow::Borrowed))
    })
}

/// Like [`compile_tenant`], with the manifest supplied lazily.
///
/// `manifest` is only called for tenants enabled in the environment; its
/// error fails the tenant.
pub(crate) fn compile_tenant_with<'m, F>(
    tenant: &TenantSpec,
    environment: Option<&str>,
    manifest: F,
) -> TenantOutcome
where
    F: FnOnce() -> CoreResult<Cow<'m, SqlManifest>>,
{
    let env = resolve_environment(environment, tenant);
    let status = if !tenant.is_enabled_for(&env) {
        log::info!("Skipped tenant: {} (disabled for {})", tenant.id(), env);
        OutcomeStatus::Skipped {
            reason: format!("tenant '{}' is disabled for environment '{}'", tenant.id(), env),
        }
    } else {
        match manifest().and_then(|m| compile(tenant, &env, &m)) {
            Ok(graph) => OutcomeStatus::Compiled(graph),
            Err(err) => {
                log::warn!("Failed to compile tenant '{}': {}", tenant.id(), err);
                OutcomeStatus::Failed(err)
            }
        }
    };
    TenantOutcome {
        tenant: tenant.id().clone(),
        environment: env,
        status,
    }
}

/// Compile every tenant sequentially
pub fn compile_all(
    tenants: &[TenantSpec],
    environment: Option<&str>,
    manifests: &HashMap<TenantId, SqlManifest>,
) -> Vec<TenantOutcome> {
    tenants
        .iter()
        .map(|tenant| compile_tenant(tenant, environment, manifests))
        .collect()
}

/// Compile every tenant in parallel.
///
/// Produces the same outcomes, in the same order, as [`compile_all`].
/// `num_threads` caps the worker pool; `None` uses the global rayon pool.
pub fn compile_all_parallel(
    tenants: &[TenantSpec],
    environment: Option<&str>,
    manifests: &HashMap<TenantId, SqlManifest>,
    num_threads: Option<usize>,
) -> Vec<TenantOutcome> {
    par_compile(tenants, num_threads, |tenant| {
        compile_tenant(tenant, environment, manifests)
    })
}

/// Map `compile_one` over `items` on a rayon pool, keeping input order
pub(crate) fn par_compile<T, F>(
    items: &[T],
    num_threads: Option<usize>,
    compile_one: F,
) -> Vec<TenantOutcome>
where
    T: Sync,
    F: Fn(&T) -> TenantOutcome + Sync + Send,
{
    let pool = match num_threads {
        Some(n) if n > 0 => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
            Ok(pool) => Some(pool),
            Err(err) => {
                log::warn!("Falling back to the global thread pool: {}", err);
                None
            }
        },
        _ => None,
    };

    match pool {
        Some(pool) => pool.install(|| items.par_iter().map(&compile_one).collect()),
        None => items.par_iter().map(&compile_one).collect(),
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
