//! Isolated units of work against the backing store.
//!
//! Every externally visible mutation runs inside a SQLite IMMEDIATE
//! transaction: the write lock is taken up front, so two operations on the
//! same account or wager serialize instead of interleaving their
//! read-modify-write. Lock contention is retried a bounded number of
//! times before surfacing as `Unavailable`.

use std::thread;
use std::time::Duration;

use diesel::prelude::*;
use tracing::warn;

use super::connection::DbPool;
use crate::config::StorageConfig;
use crate::error::{Error, Result};

/// Run `op` inside an IMMEDIATE transaction, retrying on lock contention.
///
/// The closure may run more than once; it must not carry side effects
/// outside the connection it is handed.
pub fn with_immediate_tx<T, F>(pool: &DbPool, storage: &StorageConfig, op: F) -> Result<T>
where
    F: Fn(&mut SqliteConnection) -> Result<T>,
{
    let max_attempts = storage.max_retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
        match conn.immediate_transaction(|conn| op(conn)) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_busy() && attempt < max_attempts => {
                warn!(attempt, "storage busy, retrying unit of work");
                thread::sleep(Duration::from_millis(u64::from(attempt) * 25));
            }
            Err(err) if err.is_busy() => {
                return Err(Error::Unavailable {
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::connection::memory_pool;
    use crate::store::schema::accounts;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn commits_on_success() {
        let pool = memory_pool();
        let storage = StorageConfig::default();

        with_immediate_tx(&pool, &storage, |conn| {
            diesel::insert_into(accounts::table)
                .values((
                    accounts::user_id.eq("alice"),
                    accounts::balance.eq("10.00"),
                ))
                .execute(conn)?;
            Ok(())
        })
        .unwrap();

        let mut conn = pool.get().unwrap();
        let count: i64 = accounts::table.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn rolls_back_on_error() {
        let pool = memory_pool();
        let storage = StorageConfig::default();

        let result: Result<()> = with_immediate_tx(&pool, &storage, |conn| {
            diesel::insert_into(accounts::table)
                .values((accounts::user_id.eq("bob"), accounts::balance.eq("10.00")))
                .execute(conn)?;
            Err(Error::Parse("forced failure".to_string()))
        });
        assert!(result.is_err());

        let mut conn = pool.get().unwrap();
        let count: i64 = accounts::table.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 0, "failed unit of work must leave no partial state");
    }

    #[test]
    fn busy_errors_are_retried_then_surfaced() {
        let pool = memory_pool();
        let storage = StorageConfig {
            max_retries: 3,
            ..StorageConfig::default()
        };
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_immediate_tx(&pool, &storage, |_conn| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Database("database is locked".to_string()))
        });

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(Error::Unavailable { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn non_busy_errors_are_not_retried() {
        let pool = memory_pool();
        let storage = StorageConfig::default();
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_immediate_tx(&pool, &storage, |_conn| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Parse("boom".to_string()))
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
