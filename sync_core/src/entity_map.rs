//! Bidirectional local↔remote id index.
//!
//! `EntityMapRepository` is the durable side (backed by `entities::entity_map`
//! via sea-orm); `EntityMap` wraps it with a per-request cache that must be
//! bound to a request-scoped context and must not outlive it. Each
//! `EntityMap` is constructed fresh per `Context`, so cross-tenant leakage is
//! structurally impossible — there is no process-wide cache to leak through.

use crate::errors::SyncResult;
use crate::tenant::Tenant;
use async_trait::async_trait;
use entities::entity_map::{ActiveModel, Column, Entity, Model};
use hashbrown::HashMap;
use parking_lot::Mutex;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

#[async_trait]
pub trait EntityMapRepository: Send + Sync {
    async fn find_by_local(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
        local_id: i64,
    ) -> SyncResult<Option<Model>>;

    async fn find_by_remote(
        &self,
        tenant: &Tenant,
        module: &str,
        remote_model: &str,
        remote_id: i64,
    ) -> SyncResult<Option<Model>>;

    async fn find_many_by_local(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
        local_ids: &[i64],
    ) -> SyncResult<Vec<Model>>;

    async fn find_many_by_remote(
        &self,
        tenant: &Tenant,
        module: &str,
        remote_model: &str,
        remote_ids: &[i64],
    ) -> SyncResult<Vec<Model>>;

    async fn upsert(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
        local_id: i64,
        remote_id: i64,
        remote_model: &str,
        sync_hash: &str,
    ) -> SyncResult<()>;

    async fn delete(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
        local_id: i64,
    ) -> SyncResult<()>;

    async fn list_for_module(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
    ) -> SyncResult<Vec<Model>>;
}

pub struct SeaOrmEntityMapRepository {
    db: DatabaseConnection,
}

impl SeaOrmEntityMapRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntityMapRepository for SeaOrmEntityMapRepository {
    async fn find_by_local(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
        local_id: i64,
    ) -> SyncResult<Option<Model>> {
        let row = Entity::find()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .filter(Column::Module.eq(module))
            .filter(Column::EntityType.eq(entity_type))
            .filter(Column::LocalId.eq(local_id))
            .one(&self.db)
            .await?;

        Ok(row)
    }

    async fn find_by_remote(
        &self,
        tenant: &Tenant,
        module: &str,
        remote_model: &str,
        remote_id: i64,
    ) -> SyncResult<Option<Model>> {
        let row = Entity::find()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .filter(Column::Module.eq(module))
            .filter(Column::RemoteModel.eq(remote_model))
            .filter(Column::RemoteId.eq(remote_id))
            .one(&self.db)
            .await?;

        Ok(row)
    }

    async fn find_many_by_local(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
        local_ids: &[i64],
    ) -> SyncResult<Vec<Model>> {
        let rows = Entity::find()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .filter(Column::Module.eq(module))
            .filter(Column::EntityType.eq(entity_type))
            .filter(Column::LocalId.is_in(local_ids.iter().copied()))
            .all(&self.db)
            .await?;

        Ok(rows)
    }

    async fn find_many_by_remote(
        &self,
        tenant: &Tenant,
        module: &str,
        remote_model: &str,
        remote_ids: &[i64],
    ) -> SyncResult<Vec<Model>> {
        let rows = Entity::find()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .filter(Column::Module.eq(module))
            .filter(Column::RemoteModel.eq(remote_model))
            .filter(Column::RemoteId.is_in(remote_ids.iter().copied()))
            .all(&self.db)
            .await?;

        Ok(rows)
    }

    async fn upsert(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
        local_id: i64,
        remote_id: i64,
        remote_model: &str,
        sync_hash: &str,
    ) -> SyncResult<()> {
        let existing = self
            .find_by_local(tenant, module, entity_type, local_id)
            .await?;

        let now = chrono::Utc::now();

        let mut active: ActiveModel = match existing {
            Some(model) => model.into(),
            None => ActiveModel {
                tenant: Set(tenant.as_str().to_string()),
                module: Set(module.to_string()),
                entity_type: Set(entity_type.to_string()),
                local_id: Set(local_id),
                ..Default::default()
            },
        };

        active.remote_id = Set(remote_id);
        active.remote_model = Set(remote_model.to_string());
        active.sync_hash = Set(sync_hash.to_string());
        active.last_synced_at = Set(now);

        active.save(&self.db).await?;

        Ok(())
    }

    async fn delete(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
        local_id: i64,
    ) -> SyncResult<()> {
        Entity::delete_many()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .filter(Column::Module.eq(module))
            .filter(Column::EntityType.eq(entity_type))
            .filter(Column::LocalId.eq(local_id))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn list_for_module(
        &self,
        tenant: &Tenant,
        module: &str,
        entity_type: &str,
    ) -> SyncResult<Vec<Model>> {
        let rows = Entity::find()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .filter(Column::Module.eq(module))
            .filter(Column::EntityType.eq(entity_type))
            .all(&self.db)
            .await?;

        Ok(rows)
    }
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct LocalKey {
    module: String,
    entity_type: String,
    local_id: i64,
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct RemoteKey {
    module: String,
    remote_model: String,
    remote_id: i64,
}

/// Request-scoped cache in front of `EntityMapRepository`. One instance per
/// `Context` — never stored in a static, never shared across tenants.
pub struct EntityMap {
    tenant: Tenant,
    repo: Arc<dyn EntityMapRepository>,
    local_to_remote: Mutex<HashMap<LocalKey, i64>>,
    remote_to_local: Mutex<HashMap<RemoteKey, i64>>,
}

impl EntityMap {
    pub fn new(tenant: Tenant, repo: Arc<dyn EntityMapRepository>) -> Self {
        Self {
            tenant,
            repo,
            local_to_remote: Mutex::new(HashMap::new()),
            remote_to_local: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_remote(
        &self,
        module: &str,
        entity_type: &str,
        local_id: i64,
    ) -> SyncResult<Option<i64>> {
        let key = LocalKey {
            module: module.to_string(),
            entity_type: entity_type.to_string(),
            local_id,
        };

        if let Some(remote_id) = self.local_to_remote.lock().get(&key) {
            return Ok(Some(*remote_id));
        }

        let row = self
            .repo
            .find_by_local(&self.tenant, module, entity_type, local_id)
            .await?;

        if let Some(row) = row {
            self.cache_both(module, entity_type, row.local_id, row.remote_id, &row.remote_model);
            Ok(Some(row.remote_id))
        } else {
            Ok(None)
        }
    }

    pub async fn get_local(
        &self,
        module: &str,
        remote_model: &str,
        remote_id: i64,
    ) -> SyncResult<Option<i64>> {
        let key = RemoteKey {
            module: module.to_string(),
            remote_model: remote_model.to_string(),
            remote_id,
        };

        if let Some(local_id) = self.remote_to_local.lock().get(&key) {
            return Ok(Some(*local_id));
        }

        let row = self
            .repo
            .find_by_remote(&self.tenant, module, remote_model, remote_id)
            .await?;

        if let Some(row) = row {
            self.cache_both(module, &row.entity_type, row.local_id, row.remote_id, remote_model);
            Ok(Some(row.local_id))
        } else {
            Ok(None)
        }
    }

    pub async fn get_remote_batch(
        &self,
        module: &str,
        entity_type: &str,
        local_ids: &[i64],
    ) -> SyncResult<HashMap<i64, i64>> {
        let mut out = HashMap::new();
        let mut misses = Vec::new();

        for &local_id in local_ids {
            let key = LocalKey {
                module: module.to_string(),
                entity_type: entity_type.to_string(),
                local_id,
            };

            match self.local_to_remote.lock().get(&key) {
                Some(remote_id) => {
                    out.insert(local_id, *remote_id);
                }
                None => misses.push(local_id),
            }
        }

        if !misses.is_empty() {
            let rows = self
                .repo
                .find_many_by_local(&self.tenant, module, entity_type, &misses)
                .await?;

            for row in rows {
                self.cache_both(module, entity_type, row.local_id, row.remote_id, &row.remote_model);
                out.insert(row.local_id, row.remote_id);
            }
        }

        Ok(out)
    }

    pub async fn get_local_batch(
        &self,
        module: &str,
        remote_model: &str,
        remote_ids: &[i64],
    ) -> SyncResult<HashMap<i64, i64>> {
        let mut out = HashMap::new();
        let mut misses = Vec::new();

        for &remote_id in remote_ids {
            let key = RemoteKey {
                module: module.to_string(),
                remote_model: remote_model.to_string(),
                remote_id,
            };

            match self.remote_to_local.lock().get(&key) {
                Some(local_id) => {
                    out.insert(remote_id, *local_id);
                }
                None => misses.push(remote_id),
            }
        }

        if !misses.is_empty() {
            let rows = self
                .repo
                .find_many_by_remote(&self.tenant, module, remote_model, &misses)
                .await?;

            for row in rows {
                self.cache_both(module, &row.entity_type, row.local_id, row.remote_id, remote_model);
                out.insert(row.remote_id, row.local_id);
            }
        }

        Ok(out)
    }

    pub async fn save(
        &self,
        module: &str,
        entity_type: &str,
        local_id: i64,
        remote_id: i64,
        remote_model: &str,
        sync_hash: &str,
    ) -> SyncResult<()> {
        self.repo
            .upsert(
                &self.tenant,
                module,
                entity_type,
                local_id,
                remote_id,
                remote_model,
                sync_hash,
            )
            .await?;

        self.cache_both(module, entity_type, local_id, remote_id, remote_model);

        Ok(())
    }

    pub async fn remove(&self, module: &str, entity_type: &str, local_id: i64) -> SyncResult<()> {
        // look up the remote side first so we can evict that direction too
        let existing = self
            .repo
            .find_by_local(&self.tenant, module, entity_type, local_id)
            .await?;

        self.repo.delete(&self.tenant, module, entity_type, local_id).await?;

        self.local_to_remote.lock().remove(&LocalKey {
            module: module.to_string(),
            entity_type: entity_type.to_string(),
            local_id,
        });

        if let Some(row) = existing {
            self.remote_to_local.lock().remove(&RemoteKey {
                module: module.to_string(),
                remote_model: row.remote_model,
                remote_id: row.remote_id,
            });
        }

        Ok(())
    }

    pub async fn list_for_module(
        &self,
        module: &str,
        entity_type: &str,
    ) -> SyncResult<HashMap<i64, (i64, String)>> {
        let rows = self
            .repo
            .list_for_module(&self.tenant, module, entity_type)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.local_id, (row.remote_id, row.sync_hash)))
            .collect())
    }

    pub fn flush_cache(&self) {
        self.local_to_remote.lock().clear();
        self.remote_to_local.lock().clear();
    }

    fn cache_both(
        &self,
        module: &str,
        entity_type: &str,
        local_id: i64,
        remote_id: i64,
        remote_model: &str,
    ) {
        self.local_to_remote.lock().insert(
            LocalKey {
                module: module.to_string(),
                entity_type: entity_type.to_string(),
                local_id,
            },
            remote_id,
        );

        self.remote_to_local.lock().insert(
            RemoteKey {
                module: module.to_string(),
                remote_model: remote_model.to_string(),
                remote_id,
            },
            local_id,
        );
    }
}

/// SHA-256 over a canonical JSON serialisation of `payload`, used to detect
/// whether a previously-synced entity has actually changed.
pub fn sync_hash(payload: &serde_json::Value) -> String {
    use sha2::{Digest, Sha256};

    // serde_json's BTreeMap-backed `Value` (when parsed with the `preserve_order`
    // feature off, which we don't enable) already serialises object keys in
    // sorted order, giving us a canonical form for free.
    let canonical = serde_json::to_vec(payload).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&canonical);

    hex::encode(hasher.finalize())
}
