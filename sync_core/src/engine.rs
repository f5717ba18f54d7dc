//! The sync engine: claims due jobs, checks the circuit breaker and
//! module-enabled setting, dispatches to the matching `SyncModule`, and
//! resolves the outcome back into the queue — backoff on retryable failure,
//! terminal on exhaustion or a non-retryable error, paging an admin when a
//! breaker trips.

use crate::circuit_breaker::CircuitBreaker;
use crate::context::Context;
use crate::crypto::store::CredentialStore;
use crate::entity_map::EntityMapRepository;
use crate::errors::SyncResult;
use crate::lock::AdvisoryLock;
use crate::module::ModuleRegistry;
use crate::notify::AdminNotifier;
use crate::queue::QueueRepository;
use crate::rpc::RpcClient;
use crate::settings::{SettingsStore, SyncDirection};
use crate::tenant::Tenant;
use entities::sea_orm_active_enums::JobDirection;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Key the global circuit-breaker scope is tracked under, distinct from the
/// per-`"tenant:module"` keys every module uses.
const GLOBAL_BREAKER_SCOPE: &str = "__global__";

/// How long to wait for the advisory lock before giving up on this round
/// and trying again next tick.
const LOCK_WAIT_SECONDS: u64 = 10;

/// Bounds how long a single batch may run. Not derived from the
/// credential's `timeout_seconds` — that only bounds individual RPC calls
/// (see `DomainRpcClient::call`) — this is a coarser backstop against a
/// module that hangs without ever making an RPC call.
const BATCH_TIMEOUT: Duration = Duration::from_secs(600);

pub struct SyncEngine {
    db: DatabaseConnection,
    queue: Arc<dyn QueueRepository>,
    modules: Arc<ModuleRegistry>,
    rpc: Arc<dyn RpcClient>,
    credentials: Arc<CredentialStore>,
    entity_map_repo: Arc<dyn EntityMapRepository>,
    circuit_breaker: Arc<CircuitBreaker>,
    notifier: Arc<dyn AdminNotifier>,
    settings: Arc<dyn SettingsStore>,
}

#[derive(Debug, Default)]
pub struct EngineReport {
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub terminal: usize,
    pub skipped_disabled: usize,
    pub skipped_circuit_open: usize,
    pub skipped_direction: usize,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DatabaseConnection,
        queue: Arc<dyn QueueRepository>,
        modules: Arc<ModuleRegistry>,
        rpc: Arc<dyn RpcClient>,
        credentials: Arc<CredentialStore>,
        entity_map_repo: Arc<dyn EntityMapRepository>,
        circuit_breaker: Arc<CircuitBreaker>,
        notifier: Arc<dyn AdminNotifier>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            db,
            queue,
            modules,
            rpc,
            credentials,
            entity_map_repo,
            circuit_breaker,
            notifier,
            settings,
        }
    }

    /// Claims and drains one batch for `tenant`. Called on a fixed interval
    /// by whatever drives the scheduler — `sync_core_cli` uses
    /// `tokio::time::interval`; triggering itself is out of scope here.
    ///
    /// Acquires the tenant's advisory lock for the whole batch: the
    /// status-guarded `UPDATE` in `claim_batch` is only a second line of
    /// defence against two workers racing, not the primary one. If another
    /// worker already holds the lock, this returns an empty report rather
    /// than waiting indefinitely.
    pub async fn run_once(&self, tenant: &Tenant) -> SyncResult<EngineReport> {
        let lock_name = format!("sync_core:{}", tenant.as_str());

        let Some(lock) = AdvisoryLock::acquire(&self.db, &lock_name, LOCK_WAIT_SECONDS).await? else {
            info!(tenant = tenant.as_str(), "advisory lock held elsewhere, skipping round");
            return Ok(EngineReport::default());
        };

        let result = self.run_once_locked(tenant).await;
        lock.release().await?;

        result
    }

    async fn run_once_locked(&self, tenant: &Tenant) -> SyncResult<EngineReport> {
        if !self.circuit_breaker.allow(GLOBAL_BREAKER_SCOPE) {
            info!(tenant = tenant.as_str(), "global circuit breaker open, skipping round");
            return Ok(EngineReport::default());
        }

        let sync_direction = self.settings.sync_direction(tenant).await?;
        let batch_size = self.settings.batch_size(tenant).await?;
        let jobs = self.queue.claim_batch(tenant, batch_size as u64).await?;

        let mut report = EngineReport {
            claimed: jobs.len(),
            ..Default::default()
        };

        let ctx = Context::new(tenant.clone(), BATCH_TIMEOUT, self.entity_map_repo.clone());

        for job in jobs {
            let breaker_key = format!("{}:{}", tenant.as_str(), job.0.module);

            if !self.settings.module_enabled(tenant, &job.0.module).await? {
                self.queue.release(job.id()).await?;
                report.skipped_disabled += 1;
                continue;
            }

            if direction_excluded(sync_direction, job.0.direction) {
                self.queue.release(job.id()).await?;
                report.skipped_direction += 1;
                continue;
            }

            if !self.circuit_breaker.allow(&breaker_key) {
                self.queue.release(job.id()).await?;
                report.skipped_circuit_open += 1;
                continue;
            }

            let Some(module) = self.modules.get(&job.0.module) else {
                self.queue
                    .mark_terminal(&job, &format!("unknown module: {}", job.0.module))
                    .await?;
                report.terminal += 1;
                continue;
            };

            let credential = match self.credentials.load_cached(tenant, &ctx).await {
                Ok(cred) => cred,
                Err(e) => {
                    self.queue.mark_terminal(&job, &e.to_string()).await?;
                    report.terminal += 1;
                    continue;
                }
            };

            let outcome = match job.0.direction {
                JobDirection::Push => module.push(&ctx, self.rpc.as_ref(), credential.as_ref(), &job).await,
                JobDirection::Pull => module.pull(&ctx, self.rpc.as_ref(), credential.as_ref(), &job).await,
            };

            match outcome {
                Ok(()) => {
                    self.queue.mark_completed(&job).await?;
                    self.circuit_breaker.record_success(&breaker_key);
                    self.circuit_breaker.record_success(GLOBAL_BREAKER_SCOPE);
                    report.completed += 1;
                }
                Err(failure) => {
                    self.circuit_breaker.record_failure(&breaker_key);
                    self.circuit_breaker.record_failure(GLOBAL_BREAKER_SCOPE);

                    if self.circuit_breaker.is_open(&breaker_key) {
                        warn!(tenant = tenant.as_str(), module = %job.0.module, "circuit opened");
                        let _ = self
                            .notifier
                            .notify_circuit_open(tenant.as_str(), &job.0.module, &failure.message)
                            .await;
                    }

                    if self.circuit_breaker.is_open(GLOBAL_BREAKER_SCOPE) {
                        warn!(tenant = tenant.as_str(), "global circuit opened");
                        let _ = self
                            .notifier
                            .notify_circuit_open(tenant.as_str(), "*", &failure.message)
                            .await;
                    }

                    if failure.retryable && !job.exhausted() {
                        self.queue.mark_failed(&job, &failure.message).await?;
                        report.retried += 1;
                    } else {
                        self.queue.mark_terminal(&job, &failure.message).await?;
                        report.terminal += 1;
                    }
                }
            }
        }

        info!(
            tenant = tenant.as_str(),
            claimed = report.claimed,
            completed = report.completed,
            retried = report.retried,
            terminal = report.terminal,
            "sync batch drained"
        );

        Ok(report)
    }
}

/// Whether `direction` should be skipped given the tenant's configured
/// `sync.direction`.
fn direction_excluded(sync_direction: SyncDirection, direction: JobDirection) -> bool {
    matches!(
        (sync_direction, direction),
        (SyncDirection::PushOnly, JobDirection::Pull) | (SyncDirection::PullOnly, JobDirection::Push)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CredentialCipher, MasterKey};
    use crate::entity_map::SeaOrmEntityMapRepository;
    use crate::module::test_support::FakeModule;
    use crate::notify::NullNotifier;
    use crate::queue::SeaOrmQueueRepository;
    use crate::settings::test_support::InMemorySettingsStore;
    use crate::transport::{HttpTransport, RawResponse, Transport};
    use async_trait::async_trait;
    use entities::credential::Model as CredentialModel;
    use entities::sea_orm_active_enums::{JobAction, JobDirection, Protocol};
    use entities::sync_queue::Model as QueueModel;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn lock_row(acquired: i64) -> BTreeMap<String, Value> {
        let mut row = BTreeMap::new();
        row.insert("acquired".to_string(), Value::BigInt(Some(acquired)));
        row
    }

    struct NoopTransport;

    #[async_trait]
    impl Transport for NoopTransport {
        async fn post(
            &self,
            _url: &str,
            _content_type: &str,
            _body: Vec<u8>,
            _timeout: Duration,
        ) -> SyncResult<RawResponse> {
            unreachable!("FakeModule never calls the RPC client")
        }
    }

    fn queue_job_row(tenant: &str, module: &str) -> QueueModel {
        QueueModel {
            id: 1,
            tenant: tenant.to_string(),
            module: module.to_string(),
            entity_type: "contact".to_string(),
            direction: JobDirection::Push,
            action: JobAction::Update,
            local_id: Some(1),
            remote_id: None,
            payload: "{}".to_string(),
            priority: 5,
            status: entities::sea_orm_active_enums::JobStatus::Pending,
            attempts: 0,
            max_attempts: 5,
            error_message: None,
            scheduled_at: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
            processed_at: None,
        }
    }

    fn credential_row(tenant: &str, cipher: &CredentialCipher) -> CredentialModel {
        CredentialModel {
            id: 1,
            tenant: tenant.to_string(),
            url: "https://erp.example.com".to_string(),
            database: "acme_prod".to_string(),
            username: "sync-bot".to_string(),
            encrypted_api_key: cipher.encrypt("key").unwrap(),
            protocol: Protocol::JsonRpc,
            timeout_seconds: 30,
        }
    }

    #[tokio::test]
    async fn completes_a_job_when_module_succeeds() {
        let tenant = Tenant::new("acme");
        let cipher = Arc::new(CredentialCipher::new(MasterKey::from_bytes([1u8; 32])));

        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![lock_row(1)]])
            .append_query_results([vec![queue_job_row("acme", "contacts")]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_query_results([vec![credential_row("acme", &cipher)]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_query_results([vec![lock_row(1)]])
            .into_connection();

        let entity_map_repo = Arc::new(SeaOrmEntityMapRepository::new(db.clone()));
        let queue = Arc::new(SeaOrmQueueRepository::new(db.clone()));
        let credentials = Arc::new(CredentialStore::new(db.clone(), cipher));

        let modules = Arc::new(ModuleRegistry::new(
            MockDatabase::new(DatabaseBackend::MySql).into_connection(),
        ));
        modules.register(Arc::new(FakeModule::new("contacts")));

        let engine = SyncEngine::new(
            db,
            queue,
            modules,
            Arc::new(crate::rpc::domain::DomainRpcClient::new(Arc::new(NoopTransport))),
            credentials,
            entity_map_repo,
            Arc::new(CircuitBreaker::new(3, Duration::from_secs(60))),
            Arc::new(NullNotifier),
            Arc::new(InMemorySettingsStore::new()),
        );

        let report = engine.run_once(&tenant).await.unwrap();

        assert_eq!(report.claimed, 1);
        assert_eq!(report.completed, 1);
    }

    #[tokio::test]
    async fn skips_jobs_for_disabled_modules() {
        let tenant = Tenant::new("acme");
        let cipher = Arc::new(CredentialCipher::new(MasterKey::from_bytes([1u8; 32])));

        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![lock_row(1)]])
            .append_query_results([vec![queue_job_row("acme", "contacts")]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_query_results([vec![lock_row(1)]])
            .into_connection();

        let entity_map_repo = Arc::new(SeaOrmEntityMapRepository::new(db.clone()));
        let queue = Arc::new(SeaOrmQueueRepository::new(db.clone()));
        let credentials = Arc::new(CredentialStore::new(db.clone(), cipher));

        let modules = Arc::new(ModuleRegistry::new(
            MockDatabase::new(DatabaseBackend::MySql).into_connection(),
        ));
        modules.register(Arc::new(FakeModule::new("contacts")));

        let settings = Arc::new(InMemorySettingsStore::new());
        settings.set_module_enabled(&tenant, "contacts", false);

        let engine = SyncEngine::new(
            db,
            queue,
            modules,
            Arc::new(crate::rpc::domain::DomainRpcClient::new(Arc::new(NoopTransport))),
            credentials,
            entity_map_repo,
            Arc::new(CircuitBreaker::new(3, Duration::from_secs(60))),
            Arc::new(NullNotifier),
            settings,
        );

        let report = engine.run_once(&tenant).await.unwrap();

        assert_eq!(report.claimed, 1);
        assert_eq!(report.skipped_disabled, 1);
        assert_eq!(report.completed, 0);
    }

    #[tokio::test]
    async fn pull_jobs_dispatch_to_module_pull() {
        let tenant = Tenant::new("acme");
        let cipher = Arc::new(CredentialCipher::new(MasterKey::from_bytes([1u8; 32])));

        let mut job_row = queue_job_row("acme", "contacts");
        job_row.direction = JobDirection::Pull;

        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![lock_row(1)]])
            .append_query_results([vec![job_row]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_query_results([vec![credential_row("acme", &cipher)]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_query_results([vec![lock_row(1)]])
            .into_connection();

        let entity_map_repo = Arc::new(SeaOrmEntityMapRepository::new(db.clone()));
        let queue = Arc::new(SeaOrmQueueRepository::new(db.clone()));
        let credentials = Arc::new(CredentialStore::new(db.clone(), cipher));

        let modules = Arc::new(ModuleRegistry::new(
            MockDatabase::new(DatabaseBackend::MySql).into_connection(),
        ));
        let fake = Arc::new(FakeModule::new("contacts"));
        modules.register(fake.clone());

        let engine = SyncEngine::new(
            db,
            queue,
            modules,
            Arc::new(crate::rpc::domain::DomainRpcClient::new(Arc::new(NoopTransport))),
            credentials,
            entity_map_repo,
            Arc::new(CircuitBreaker::new(3, Duration::from_secs(60))),
            Arc::new(NullNotifier),
            Arc::new(InMemorySettingsStore::new()),
        );

        let report = engine.run_once(&tenant).await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(fake.pull_calls.lock().len(), 1);
        assert!(fake.push_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn push_only_direction_skips_pull_jobs() {
        let tenant = Tenant::new("acme");
        let cipher = Arc::new(CredentialCipher::new(MasterKey::from_bytes([1u8; 32])));

        let mut job_row = queue_job_row("acme", "contacts");
        job_row.direction = JobDirection::Pull;

        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![lock_row(1)]])
            .append_query_results([vec![job_row]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_query_results([vec![lock_row(1)]])
            .into_connection();

        let entity_map_repo = Arc::new(SeaOrmEntityMapRepository::new(db.clone()));
        let queue = Arc::new(SeaOrmQueueRepository::new(db.clone()));
        let credentials = Arc::new(CredentialStore::new(db.clone(), cipher));

        let modules = Arc::new(ModuleRegistry::new(
            MockDatabase::new(DatabaseBackend::MySql).into_connection(),
        ));
        modules.register(Arc::new(FakeModule::new("contacts")));

        let settings = Arc::new(InMemorySettingsStore::new());
        settings.set_direction(&tenant, crate::settings::SyncDirection::PushOnly);

        let engine = SyncEngine::new(
            db,
            queue,
            modules,
            Arc::new(crate::rpc::domain::DomainRpcClient::new(Arc::new(NoopTransport))),
            credentials,
            entity_map_repo,
            Arc::new(CircuitBreaker::new(3, Duration::from_secs(60))),
            Arc::new(NullNotifier),
            settings,
        );

        let report = engine.run_once(&tenant).await.unwrap();

        assert_eq!(report.claimed, 1);
        assert_eq!(report.skipped_direction, 1);
        assert_eq!(report.completed, 0);
    }
}
