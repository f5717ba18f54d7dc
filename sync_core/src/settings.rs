//! The settings persistence layer is an external collaborator, assumed as a
//! key/value store exposing typed getters. This module is just the seam —
//! the trait the core reads through, plus the recognised configuration
//! keys. Nothing here persists anything; a real deployment plugs in its own
//! `SettingsStore` backed by whatever key/value store the admin UI writes
//! to.

use crate::errors::SyncResult;
use crate::tenant::Tenant;
use async_trait::async_trait;
use entities::sea_orm_active_enums::LogLevel;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncDirection {
    Bidirectional,
    PushOnly,
    PullOnly,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictRule {
    NewestWins,
    RemoteWins,
    LocalWins,
}

/// Recognised configuration options, read through typed getters so the core
/// never has to parse a raw string/JSON blob itself.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn sync_direction(&self, tenant: &Tenant) -> SyncResult<SyncDirection>;

    async fn conflict_rule(&self, tenant: &Tenant) -> SyncResult<ConflictRule>;

    /// `sync.batch_size` ∈ [1, 500].
    async fn batch_size(&self, tenant: &Tenant) -> SyncResult<u32>;

    async fn log_min_level(&self, tenant: &Tenant) -> SyncResult<LogLevel>;

    /// `log.retention_days` ∈ [1, 365].
    async fn log_retention_days(&self, tenant: &Tenant) -> SyncResult<u32>;

    async fn module_enabled(&self, tenant: &Tenant, module: &str) -> SyncResult<bool>;

    async fn module_settings(&self, tenant: &Tenant, module: &str) -> SyncResult<serde_json::Value>;

    async fn webhook_token(&self, tenant: &Tenant) -> SyncResult<Option<String>>;

    /// Reverse lookup used by the webhook receiver: the inbound request
    /// carries only a token, not a tenant id, so the tenant has to be
    /// recovered from whichever tenant's token matches.
    async fn resolve_tenant_by_token(&self, token: &str) -> SyncResult<Option<Tenant>>;
}

/// Test-only stand-in for a real `SettingsStore`. Not a shipped backend —
/// see the module doc comment. Kept in the library (rather than behind
/// `#[cfg(test)]`) purely so both unit tests and `tests/*.rs` integration
/// tests can share it.
pub mod test_support {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct InMemorySettingsStore {
        direction: RwLock<HashMap<String, SyncDirection>>,
        conflict_rule: RwLock<HashMap<String, ConflictRule>>,
        batch_size: RwLock<HashMap<String, u32>>,
        log_min_level: RwLock<HashMap<String, LogLevel>>,
        log_retention_days: RwLock<HashMap<String, u32>>,
        module_enabled: RwLock<HashMap<(String, String), bool>>,
        module_settings: RwLock<HashMap<(String, String), serde_json::Value>>,
        webhook_token: RwLock<HashMap<String, String>>,
    }

    impl InMemorySettingsStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_direction(&self, tenant: &Tenant, direction: SyncDirection) {
            self.direction
                .write()
                .insert(tenant.as_str().to_string(), direction);
        }

        pub fn set_batch_size(&self, tenant: &Tenant, batch_size: u32) {
            self.batch_size
                .write()
                .insert(tenant.as_str().to_string(), batch_size);
        }

        pub fn set_module_enabled(&self, tenant: &Tenant, module: &str, enabled: bool) {
            self.module_enabled
                .write()
                .insert((tenant.as_str().to_string(), module.to_string()), enabled);
        }

        pub fn set_webhook_token(&self, tenant: &Tenant, token: impl Into<String>) {
            self.webhook_token
                .write()
                .insert(tenant.as_str().to_string(), token.into());
        }
    }

    #[async_trait]
    impl SettingsStore for InMemorySettingsStore {
        async fn sync_direction(&self, tenant: &Tenant) -> SyncResult<SyncDirection> {
            Ok(self
                .direction
                .read()
                .get(tenant.as_str())
                .copied()
                .unwrap_or(SyncDirection::Bidirectional))
        }

        async fn conflict_rule(&self, tenant: &Tenant) -> SyncResult<ConflictRule> {
            Ok(self
                .conflict_rule
                .read()
                .get(tenant.as_str())
                .copied()
                .unwrap_or(ConflictRule::NewestWins))
        }

        async fn batch_size(&self, tenant: &Tenant) -> SyncResult<u32> {
            Ok(self
                .batch_size
                .read()
                .get(tenant.as_str())
                .copied()
                .unwrap_or(50))
        }

        async fn log_min_level(&self, tenant: &Tenant) -> SyncResult<LogLevel> {
            Ok(self
                .log_min_level
                .read()
                .get(tenant.as_str())
                .copied()
                .unwrap_or(LogLevel::Info))
        }

        async fn log_retention_days(&self, tenant: &Tenant) -> SyncResult<u32> {
            Ok(self
                .log_retention_days
                .read()
                .get(tenant.as_str())
                .copied()
                .unwrap_or(30))
        }

        async fn module_enabled(&self, tenant: &Tenant, module: &str) -> SyncResult<bool> {
            Ok(self
                .module_enabled
                .read()
                .get(&(tenant.as_str().to_string(), module.to_string()))
                .copied()
                .unwrap_or(true))
        }

        async fn module_settings(
            &self,
            tenant: &Tenant,
            module: &str,
        ) -> SyncResult<serde_json::Value> {
            Ok(self
                .module_settings
                .read()
                .get(&(tenant.as_str().to_string(), module.to_string()))
                .cloned()
                .unwrap_or(serde_json::Value::Null))
        }

        async fn webhook_token(&self, tenant: &Tenant) -> SyncResult<Option<String>> {
            Ok(self.webhook_token.read().get(tenant.as_str()).cloned())
        }

        async fn resolve_tenant_by_token(&self, token: &str) -> SyncResult<Option<Tenant>> {
            Ok(self
                .webhook_token
                .read()
                .iter()
                .find(|(_, stored)| stored.as_str() == token)
                .map(|(tenant, _)| Tenant::new(tenant.clone())))
        }
    }
}
