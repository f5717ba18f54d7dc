//! Module registry and contract: the seam between the generic engine and
//! the per-domain logic (contacts, leads, products, orders, invoices,
//! memberships, form submissions) that actually knows how to map a row to
//! and from the remote ERP's model. Per-domain transforms are explicitly
//! out of scope here — this only defines the contract a transform module
//! must satisfy to be dispatched by the engine.

pub mod registry;

use crate::context::Context;
use crate::crypto::store::DecryptedCredential;
use crate::errors::ModuleFailure;
use crate::queue::Job;
use crate::rpc::RpcClient;
use async_trait::async_trait;
use std::collections::HashMap;

pub use registry::{ModuleRegistry, ModuleStats};

/// Severity of a single dependency notice (e.g. a disabled prerequisite
/// module, an expired remote field mapping).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeSeverity {
    Info,
    Warning,
    Error,
}

/// Whether a module is currently able to run, plus any notices an admin
/// surface would want to display alongside that verdict.
#[derive(Clone, Debug, Default)]
pub struct DependencyStatus {
    pub available: bool,
    pub notices: Vec<(NoticeSeverity, String)>,
}

impl DependencyStatus {
    pub fn available() -> Self {
        Self {
            available: true,
            notices: Vec::new(),
        }
    }
}

#[async_trait]
pub trait SyncModule: Send + Sync {
    /// Stable identifier used as the `module` column and in dedup keys
    /// (e.g. `"contacts"`, `"invoices"`).
    fn id(&self) -> &'static str;

    fn entity_type(&self) -> &'static str;

    /// Entity types this module handles, mapped to the remote model name
    /// they sync against (e.g. `"contact" -> "res.partner"`). The webhook
    /// receiver uses this in reverse to resolve an inbound remote model
    /// name back to the module that owns it.
    fn remote_models(&self) -> HashMap<&'static str, &'static str>;

    /// Name of a mutual-exclusivity group this module belongs to, if any.
    /// At most one module per group may be enabled for a tenant at a time —
    /// `ModuleRegistry::enable` enforces this.
    fn exclusive_group(&self) -> Option<&'static str> {
        None
    }

    /// Whether this module's prerequisites (credentials, remote fields,
    /// peer modules) are currently satisfied.
    fn dependency_status(&self) -> DependencyStatus {
        DependencyStatus::available()
    }

    /// Pushes one local change described by `job` to the remote ERP.
    async fn push(
        &self,
        ctx: &Context,
        rpc: &dyn RpcClient,
        credential: &DecryptedCredential,
        job: &Job,
    ) -> Result<(), ModuleFailure>;

    /// Pulls one remote change described by `job` into the local platform.
    /// Same per-job shape as `push` — the job's `payload`/`remote_id`
    /// identify what changed; this does not do its own listing.
    async fn pull(
        &self,
        ctx: &Context,
        rpc: &dyn RpcClient,
        credential: &DecryptedCredential,
        job: &Job,
    ) -> Result<(), ModuleFailure>;
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Minimal fake used by engine tests — out-of-scope for per-domain
    /// transforms, but the engine still needs *something* implementing the
    /// contract to drive.
    pub struct FakeModule {
        pub module_id: &'static str,
        pub push_calls: Mutex<Vec<i64>>,
        pub pull_calls: Mutex<Vec<i64>>,
        pub fail_push: bool,
        pub fail_pull: bool,
        pub exclusive_group: Option<&'static str>,
    }

    impl FakeModule {
        pub fn new(module_id: &'static str) -> Self {
            Self {
                module_id,
                push_calls: Mutex::new(Vec::new()),
                pull_calls: Mutex::new(Vec::new()),
                fail_push: false,
                fail_pull: false,
                exclusive_group: None,
            }
        }

        pub fn failing(module_id: &'static str) -> Self {
            Self {
                module_id,
                push_calls: Mutex::new(Vec::new()),
                pull_calls: Mutex::new(Vec::new()),
                fail_push: true,
                fail_pull: false,
                exclusive_group: None,
            }
        }

        pub fn in_group(module_id: &'static str, group: &'static str) -> Self {
            Self {
                module_id,
                push_calls: Mutex::new(Vec::new()),
                pull_calls: Mutex::new(Vec::new()),
                fail_push: false,
                fail_pull: false,
                exclusive_group: Some(group),
            }
        }
    }

    #[async_trait]
    impl SyncModule for FakeModule {
        fn id(&self) -> &'static str {
            self.module_id
        }

        fn entity_type(&self) -> &'static str {
            "fake"
        }

        fn remote_models(&self) -> HashMap<&'static str, &'static str> {
            let mut map = HashMap::new();
            map.insert("fake", "x.fake");
            map
        }

        fn exclusive_group(&self) -> Option<&'static str> {
            self.exclusive_group
        }

        async fn push(
            &self,
            _ctx: &Context,
            _rpc: &dyn RpcClient,
            _credential: &DecryptedCredential,
            job: &Job,
        ) -> Result<(), ModuleFailure> {
            self.push_calls.lock().push(job.id());

            if self.fail_push {
                Err(ModuleFailure::retryable("fake module configured to fail"))
            } else {
                Ok(())
            }
        }

        async fn pull(
            &self,
            _ctx: &Context,
            _rpc: &dyn RpcClient,
            _credential: &DecryptedCredential,
            job: &Job,
        ) -> Result<(), ModuleFailure> {
            self.pull_calls.lock().push(job.id());

            if self.fail_pull {
                Err(ModuleFailure::retryable("fake module configured to fail"))
            } else {
                Ok(())
            }
        }
    }
}
