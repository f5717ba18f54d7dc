//! Cross-process serialization for the engine's batch loop.
//!
//! `MySQL` `GET_LOCK`/`RELEASE_LOCK` over the same `DatabaseConnection`
//! everything else in this crate uses, issued as raw SQL via
//! `Statement::from_sql_and_values` since sea-orm's query builder has no
//! notion of an advisory lock — the same escape hatch the rest of the
//! examples pack reaches for when a query doesn't fit the builder. This is
//! the primary mechanism that keeps two worker processes from draining the
//! same tenant's queue at once; the atomic status-guarded `UPDATE` in
//! `claim_batch` only catches what slips through when the lock itself is
//! unavailable (e.g. a backend that isn't MySQL).

use crate::errors::{SyncError, SyncResult};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement};

#[derive(Debug, FromQueryResult)]
struct LockResult {
    acquired: Option<i64>,
}

/// A held `GET_LOCK` advisory lock. Dropping this without calling
/// `release` leaves the lock held until the underlying connection closes —
/// always prefer an explicit `release().await`.
pub struct AdvisoryLock {
    db: DatabaseConnection,
    name: String,
    held: bool,
}

impl AdvisoryLock {
    /// Attempts to acquire the named lock, waiting up to `timeout_seconds`.
    /// Returns `Ok(None)` if another holder still has it when the wait
    /// times out — callers should treat that as "skip this round", not an
    /// error.
    pub async fn acquire(
        db: &DatabaseConnection,
        name: &str,
        timeout_seconds: u64,
    ) -> SyncResult<Option<Self>> {
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT GET_LOCK(?, ?) AS acquired",
            [name.into(), (timeout_seconds as i64).into()],
        );

        let result = LockResult::find_by_statement(stmt)
            .one(db)
            .await?
            .ok_or_else(|| SyncError::Other(anyhow::anyhow!("GET_LOCK returned no row")))?;

        if result.acquired == Some(1) {
            Ok(Some(Self {
                db: db.clone(),
                name: name.to_string(),
                held: true,
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(mut self) -> SyncResult<()> {
        let stmt = Statement::from_sql_and_values(
            self.db.get_database_backend(),
            "SELECT RELEASE_LOCK(?) AS acquired",
            [self.name.clone().into()],
        );

        LockResult::find_by_statement(stmt).one(&self.db).await?;
        self.held = false;

        Ok(())
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if self.held {
            tracing::warn!(lock = %self.name, "advisory lock dropped without explicit release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn lock_row(acquired: i64) -> BTreeMap<String, Value> {
        let mut row = BTreeMap::new();
        row.insert("acquired".to_string(), Value::BigInt(Some(acquired)));
        row
    }

    #[tokio::test]
    async fn acquires_when_get_lock_returns_one() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![lock_row(1)]])
            .into_connection();

        let lock = AdvisoryLock::acquire(&db, "sync_core:acme", 10).await.unwrap();
        assert!(lock.is_some());
    }

    #[tokio::test]
    async fn reports_none_when_another_holder_has_it() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![lock_row(0)]])
            .into_connection();

        let lock = AdvisoryLock::acquire(&db, "sync_core:acme", 10).await.unwrap();
        assert!(lock.is_none());
    }

    #[tokio::test]
    async fn release_sends_release_lock_and_clears_the_held_flag() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![lock_row(1)]])
            .append_query_results([vec![lock_row(1)]])
            .into_connection();

        let lock = AdvisoryLock::acquire(&db, "sync_core:acme", 10)
            .await
            .unwrap()
            .unwrap();

        lock.release().await.unwrap();
    }
}
