//! Module registration and the `stats()` surface the (out-of-scope) admin
//! UI would read from. Lookups go through `ArcSwap` so registering or
//! replacing a module never blocks a concurrent dispatch; `stats()` is
//! cached with `moka` since it's a handful of `COUNT`s an admin page might
//! poll every few seconds and none of it needs to be perfectly fresh.

use super::SyncModule;
use crate::errors::SyncResult;
use crate::tenant::Tenant;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use entities::sea_orm_active_enums::JobStatus;
use entities::sync_queue::{Column, Entity};
use hashbrown::HashMap;
use moka::future::Cache;
use parking_lot::Mutex;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ModuleStats {
    pub pending: u64,
    pub processing: u64,
    pub failed: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
}

pub struct ModuleRegistry {
    db: DatabaseConnection,
    modules: ArcSwap<HashMap<&'static str, Arc<dyn SyncModule>>>,
    enabled: Mutex<HashMap<&'static str, bool>>,
    stats_cache: Cache<String, ModuleStats>,
}

impl ModuleRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            modules: ArcSwap::from_pointee(HashMap::new()),
            enabled: Mutex::new(HashMap::new()),
            stats_cache: Cache::builder()
                .time_to_live(Duration::from_secs(30))
                .max_capacity(1_000)
                .build(),
        }
    }

    pub fn register(&self, module: Arc<dyn SyncModule>) {
        let mut next = (**self.modules.load()).clone();
        let id = module.id();
        next.insert(id, module);
        self.modules.store(Arc::new(next));
        self.enabled.lock().entry(id).or_insert(true);
    }

    pub fn get(&self, module_id: &str) -> Option<Arc<dyn SyncModule>> {
        self.modules.load().get(module_id).cloned()
    }

    pub fn module_ids(&self) -> Vec<&'static str> {
        self.modules.load().keys().copied().collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn SyncModule>> {
        self.modules.load().values().cloned().collect()
    }

    /// Resolves the module that owns `remote_model`, i.e. the one whose
    /// `remote_models()` maps some entity type to it. Used by the webhook
    /// receiver to turn an inbound model name into a dispatch target.
    pub fn resolve_by_remote_model(&self, remote_model: &str) -> Option<Arc<dyn SyncModule>> {
        self.modules
            .load()
            .values()
            .find(|module| module.remote_models().values().any(|m| *m == remote_model))
            .cloned()
    }

    /// Ids of other registered modules sharing `module_id`'s exclusive
    /// group, if it has one. Empty if the module doesn't exist or belongs
    /// to no group.
    pub fn conflicts(&self, module_id: &str) -> Vec<&'static str> {
        let modules = self.modules.load();
        let Some(group) = modules.get(module_id).and_then(|m| m.exclusive_group()) else {
            return Vec::new();
        };

        modules
            .values()
            .filter(|m| m.id() != module_id && m.exclusive_group() == Some(group))
            .map(|m| m.id())
            .collect()
    }

    pub fn is_enabled(&self, module_id: &str) -> bool {
        self.enabled.lock().get(module_id).copied().unwrap_or(true)
    }

    /// Enables or disables `module_id`. Enabling a module that belongs to
    /// an exclusive group disables every other module in that group first
    /// — returns the ids turned off as a side effect of this call. A no-op
    /// (empty return) if `module_id` isn't registered.
    pub fn enable(&self, module_id: &str, enabled: bool) -> Vec<&'static str> {
        let Some(id) = self.modules.load().get(module_id).map(|m| m.id()) else {
            return Vec::new();
        };

        let mut disabled_peers = Vec::new();

        if enabled {
            for peer in self.conflicts(id) {
                if self.is_enabled(peer) {
                    self.enabled.lock().insert(peer, false);
                    disabled_peers.push(peer);
                }
            }
        }

        self.enabled.lock().insert(id, enabled);

        disabled_peers
    }

    pub async fn stats(&self, tenant: &Tenant, module_id: &str) -> SyncResult<ModuleStats> {
        let cache_key = format!("{}:{}", tenant.as_str(), module_id);

        if let Some(cached) = self.stats_cache.get(&cache_key).await {
            return Ok(cached);
        }

        let stats = self.compute_stats(tenant, module_id).await?;
        self.stats_cache.insert(cache_key, stats.clone()).await;

        Ok(stats)
    }

    async fn compute_stats(&self, tenant: &Tenant, module_id: &str) -> SyncResult<ModuleStats> {
        let base = Entity::find()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .filter(Column::Module.eq(module_id));

        let pending = base
            .clone()
            .filter(Column::Status.eq(JobStatus::Pending))
            .count(&self.db)
            .await?;

        let processing = base
            .clone()
            .filter(Column::Status.eq(JobStatus::Processing))
            .count(&self.db)
            .await?;

        let failed = base
            .clone()
            .filter(Column::Status.eq(JobStatus::Failed))
            .count(&self.db)
            .await?;

        let last_synced_at = base
            .filter(Column::Status.eq(JobStatus::Completed))
            .order_by_desc(Column::ProcessedAt)
            .limit(1)
            .one(&self.db)
            .await?
            .and_then(|row| row.processed_at);

        Ok(ModuleStats {
            pending,
            processing,
            failed,
            last_synced_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::test_support::FakeModule;

    #[test]
    fn register_and_get_round_trip() {
        let db = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::MySql).into_connection();
        let registry = ModuleRegistry::new(db);

        registry.register(Arc::new(FakeModule::new("contacts")));

        assert!(registry.get("contacts").is_some());
        assert!(registry.get("orders").is_none());
        assert_eq!(registry.module_ids(), vec!["contacts"]);
    }

    #[test]
    fn enabling_a_module_disables_its_exclusive_group_peers() {
        let db = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::MySql).into_connection();
        let registry = ModuleRegistry::new(db);

        registry.register(Arc::new(FakeModule::in_group("crm_contacts", "contacts")));
        registry.register(Arc::new(FakeModule::in_group("legacy_contacts", "contacts")));

        assert_eq!(registry.conflicts("crm_contacts"), vec!["legacy_contacts"]);

        let disabled = registry.enable("crm_contacts", true);
        assert_eq!(disabled, vec!["legacy_contacts"]);
        assert!(registry.is_enabled("crm_contacts"));
        assert!(!registry.is_enabled("legacy_contacts"));
    }

    #[test]
    fn resolves_module_by_remote_model() {
        let db = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::MySql).into_connection();
        let registry = ModuleRegistry::new(db);

        registry.register(Arc::new(FakeModule::new("contacts")));

        assert!(registry.resolve_by_remote_model("x.fake").is_some());
        assert!(registry.resolve_by_remote_model("res.partner").is_none());
    }
}
