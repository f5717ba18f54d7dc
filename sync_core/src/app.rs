//! Composition root: wires a database connection into the credential
//! store, queue repository, module registry, engine, and webhook router.
//! `sync_core_cli` is the only caller — this is where DI happens, kept out
//! of `lib.rs` so library consumers can assemble their own subset.

use crate::circuit_breaker::CircuitBreaker;
use crate::crypto::store::CredentialStore;
use crate::crypto::{CredentialCipher, MasterKey};
use crate::entity_map::SeaOrmEntityMapRepository;
use crate::module::{ModuleRegistry, SyncModule};
use crate::notify::{AdminNotifier, NullNotifier, PagerDutyNotifier};
use crate::queue::{QueueRepository, SeaOrmQueueRepository};
use crate::rpc::domain::DomainRpcClient;
use crate::rpc::RpcClient;
use crate::settings::SettingsStore;
use crate::transport::HttpTransport;
use crate::webhook::WebhookState;
use anyhow::Context as _;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CIRCUIT_THRESHOLD: u32 = 5;
const DEFAULT_CIRCUIT_COOLDOWN: Duration = Duration::from_secs(300);

pub struct AppConfig {
    pub database_url: String,
    pub master_key: MasterKey,
    pub pagerduty_routing_key: Option<String>,
}

pub struct App {
    pub db: DatabaseConnection,
    pub queue: Arc<dyn QueueRepository>,
    pub modules: Arc<ModuleRegistry>,
    pub rpc: Arc<dyn RpcClient>,
    pub credentials: Arc<CredentialStore>,
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub notifier: Arc<dyn AdminNotifier>,
    pub settings: Arc<dyn SettingsStore>,
}

impl App {
    pub async fn connect(config: AppConfig, settings: Arc<dyn SettingsStore>) -> anyhow::Result<Self> {
        let db = Database::connect(&config.database_url)
            .await
            .context("connecting to sync_core database")?;

        migration::Migrator::up(&db, None)
            .await
            .context("running pending migrations")?;

        let queue: Arc<dyn QueueRepository> = Arc::new(SeaOrmQueueRepository::new(db.clone()));
        let modules = Arc::new(ModuleRegistry::new(db.clone()));

        let transport = Arc::new(HttpTransport::new());
        let rpc: Arc<dyn RpcClient> = Arc::new(DomainRpcClient::new(transport));

        let cipher = Arc::new(CredentialCipher::new(config.master_key));
        let credentials = Arc::new(CredentialStore::new(db.clone(), cipher));

        let notifier: Arc<dyn AdminNotifier> = match config.pagerduty_routing_key {
            Some(key) => Arc::new(PagerDutyNotifier::new(key).context("building pagerduty client")?),
            None => Arc::new(NullNotifier),
        };

        Ok(Self {
            db,
            queue,
            modules,
            rpc,
            credentials,
            circuit_breaker: Arc::new(CircuitBreaker::new(DEFAULT_CIRCUIT_THRESHOLD, DEFAULT_CIRCUIT_COOLDOWN)),
            notifier,
            settings,
        })
    }

    pub fn register_module(&self, module: Arc<dyn SyncModule>) {
        self.modules.register(module);
    }

    pub fn engine(&self) -> crate::engine::SyncEngine {
        crate::engine::SyncEngine::new(
            self.db.clone(),
            self.queue.clone(),
            self.modules.clone(),
            self.rpc.clone(),
            self.credentials.clone(),
            Arc::new(SeaOrmEntityMapRepository::new(self.db.clone())),
            self.circuit_breaker.clone(),
            self.notifier.clone(),
            self.settings.clone(),
        )
    }

    pub fn webhook_router(&self) -> axum::Router {
        let state = Arc::new(WebhookState::new(
            self.queue.clone(),
            self.modules.clone(),
            self.settings.clone(),
        ));
        crate::webhook::router(state)
    }
}
