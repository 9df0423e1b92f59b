use std::sync::Arc;

use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;

use crate::error::AppError;

/// Runs closures inside a database transaction.
///
/// SQLite admits a single writer at a time, so write transactions are also
/// serialized behind an in-process lock; losers of a race then observe the
/// winner's committed state instead of a driver-level busy error. The
/// conditional writes issued by the repositories remain the authoritative
/// guard on roster capacity and token consumption.
#[derive(Clone)]
pub struct DatabaseTransaction {
    pool: SqlitePool,
    write_guard: Arc<Mutex<()>>,
}

impl DatabaseTransaction {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Run a closure inside a transaction
    pub async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: for<'a> FnOnce(
            &'a mut Transaction<'_, Sqlite>,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<T, AppError>> + Send + 'a>,
        >,
        T: Send,
    {
        let _guard = self.write_guard.lock().await;
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await.map_err(AppError::from)?;
                Ok(value)
            }
            Err(err) => {
                log::warn!("Transaction failed with error: {}, rolling back", err);
                if let Err(rollback_err) = tx.rollback().await {
                    log::error!(
                        "Rollback failed after error (orig: {}, rollback: {})",
                        err,
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}
