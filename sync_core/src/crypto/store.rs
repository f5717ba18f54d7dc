//! Durable credential lookup + decryption. Sits between the `credential`
//! table and the RPC client: callers ask for a tenant's connection details
//! and get back a `DecryptedCredential` with the API key already unsealed,
//! never a raw row.

use super::CredentialCipher;
use crate::context::Context;
use crate::errors::{SyncError, SyncResult};
use crate::ssrf::SsrfGuard;
use crate::tenant::Tenant;
use entities::credential::{ActiveModel, Column, Entity};
use entities::sea_orm_active_enums::Protocol;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use zeroize::Zeroizing;

pub struct DecryptedCredential {
    pub url: String,
    pub database: String,
    pub username: String,
    pub api_key: Zeroizing<String>,
    pub protocol: Protocol,
    pub timeout_seconds: u16,
}

pub struct CredentialStore {
    db: DatabaseConnection,
    cipher: Arc<CredentialCipher>,
    ssrf: SsrfGuard,
}

#[allow(clippy::too_many_arguments)]
impl CredentialStore {
    pub fn new(db: DatabaseConnection, cipher: Arc<CredentialCipher>) -> Self {
        Self {
            db,
            cipher,
            ssrf: SsrfGuard::new(),
        }
    }

    /// Validates `url` against the SSRF policy, encrypts `api_key`, and
    /// upserts the tenant's credential row. This is the only write path —
    /// an admin surface (out of scope here) is expected to call it, never
    /// the sync engine itself.
    pub async fn save(
        &self,
        tenant: &Tenant,
        url: &str,
        database: &str,
        username: &str,
        api_key: &str,
        protocol: Protocol,
        timeout_seconds: u16,
    ) -> SyncResult<()> {
        self.ssrf.validate(url).await?;

        let encrypted_api_key = self.cipher.encrypt(api_key)?;

        let existing = Entity::find()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .one(&self.db)
            .await?;

        let mut active: ActiveModel = match existing {
            Some(model) => model.into(),
            None => ActiveModel {
                tenant: Set(tenant.as_str().to_string()),
                ..Default::default()
            },
        };

        active.url = Set(url.to_string());
        active.database = Set(database.to_string());
        active.username = Set(username.to_string());
        active.encrypted_api_key = Set(encrypted_api_key);
        active.protocol = Set(protocol);
        active.timeout_seconds = Set(timeout_seconds as i16);

        active.save(&self.db).await?;

        Ok(())
    }

    pub async fn load(&self, tenant: &Tenant) -> SyncResult<DecryptedCredential> {
        let row = Entity::find()
            .filter(Column::Tenant.eq(tenant.as_str()))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                SyncError::ConfigurationMissing(format!("no credential configured for tenant {tenant}"))
            })?;

        let api_key = self.cipher.decrypt(&row.encrypted_api_key)?;

        Ok(DecryptedCredential {
            url: row.url,
            database: row.database,
            username: row.username,
            api_key,
            protocol: row.protocol,
            timeout_seconds: row.timeout_seconds as u16,
        })
    }

    /// Like `load`, but reuses `ctx`'s credential cache instead of
    /// decrypting again if this `Context` has already fetched one this
    /// request. Callers that process more than one job per `Context` (the
    /// engine's batch loop) should always go through this, not `load`.
    pub async fn load_cached(&self, tenant: &Tenant, ctx: &Context) -> SyncResult<Arc<DecryptedCredential>> {
        if let Some(cached) = ctx.cached_credential() {
            return Ok(cached);
        }

        let credential = Arc::new(self.load(tenant).await?);
        ctx.cache_credential(credential.clone());

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MasterKey;
    use entities::credential::Model;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn loads_and_decrypts_credential() {
        let cipher = Arc::new(CredentialCipher::new(MasterKey::from_bytes([3u8; 32])));
        let sealed = cipher.encrypt("test-api-key").unwrap();

        let row = Model {
            id: 1,
            tenant: "acme".to_string(),
            url: "https://erp.example.com".to_string(),
            database: "acme_prod".to_string(),
            username: "sync-bot".to_string(),
            encrypted_api_key: sealed,
            protocol: Protocol::JsonRpc,
            timeout_seconds: 30,
        };

        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![row]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let store = CredentialStore::new(db, cipher);
        let decrypted = store.load(&Tenant::new("acme")).await.unwrap();

        assert_eq!(decrypted.api_key.as_str(), "test-api-key");
        assert_eq!(decrypted.username, "sync-bot");
    }

    #[tokio::test]
    async fn missing_credential_is_configuration_error() {
        let cipher = Arc::new(CredentialCipher::new(MasterKey::from_bytes([3u8; 32])));

        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([Vec::<Model>::new()])
            .into_connection();

        let store = CredentialStore::new(db, cipher);
        let err = store.load(&Tenant::new("ghost")).await.unwrap_err();

        assert!(matches!(err, SyncError::ConfigurationMissing(_)));
    }
}
