//! Request-scoped context: carries the tenant, a deadline, and per-request
//! caches, and must not outlive the unit of work it was built for. One
//! `Context` is built per batch drained from the queue (or per webhook
//! delivery) and dropped at the end of that unit of work — its `EntityMap`
//! cache and credential cache die with it, so a credential rotation is
//! visible no later than the next batch.

use crate::crypto::store::DecryptedCredential;
use crate::entity_map::{EntityMap, EntityMapRepository};
use crate::tenant::Tenant;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Context {
    pub tenant: Tenant,
    deadline: Instant,
    pub entity_map: EntityMap,
    credential_cache: Mutex<Option<Arc<DecryptedCredential>>>,
}

impl Context {
    pub fn new(tenant: Tenant, timeout: Duration, entity_map_repo: Arc<dyn EntityMapRepository>) -> Self {
        let entity_map = EntityMap::new(tenant.clone(), entity_map_repo);

        Self {
            tenant,
            deadline: Instant::now() + timeout,
            entity_map,
            credential_cache: Mutex::new(None),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn time_remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Decrypted credential for this request, if it has already been
    /// fetched once this request. Never persisted past `Context`'s
    /// lifetime — see `CredentialStore::load_cached`, the only intended
    /// caller.
    pub fn cached_credential(&self) -> Option<Arc<DecryptedCredential>> {
        self.credential_cache.lock().clone()
    }

    pub fn cache_credential(&self, credential: Arc<DecryptedCredential>) {
        *self.credential_cache.lock() = Some(credential);
    }

    pub fn invalidate_credential(&self) {
        self.credential_cache.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_map::SeaOrmEntityMapRepository;
    use entities::sea_orm_active_enums::Protocol;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn test_context() -> Context {
        let db = MockDatabase::new(DatabaseBackend::MySql).into_connection();
        let repo = Arc::new(SeaOrmEntityMapRepository::new(db));
        Context::new(Tenant::new("acme"), Duration::from_secs(30), repo)
    }

    fn sample_credential() -> DecryptedCredential {
        DecryptedCredential {
            url: "https://erp.example.com".to_string(),
            database: "acme_prod".to_string(),
            username: "sync-bot".to_string(),
            api_key: zeroize::Zeroizing::new("secret-key".to_string()),
            protocol: Protocol::JsonRpc,
            timeout_seconds: 30,
        }
    }

    #[test]
    fn credential_cache_round_trips() {
        let ctx = test_context();
        assert!(ctx.cached_credential().is_none());

        ctx.cache_credential(Arc::new(sample_credential()));
        assert_eq!(ctx.cached_credential().unwrap().api_key.as_str(), "secret-key");

        ctx.invalidate_credential();
        assert!(ctx.cached_credential().is_none());
    }

    #[test]
    fn deadline_starts_unexpired() {
        let ctx = test_context();
        assert!(!ctx.is_expired());
        assert!(ctx.time_remaining() > Duration::from_secs(0));
    }
}
