pub mod chunk_store;
pub mod providers;
pub mod settings;

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::info;

use crate::{core::repo::Atomic, error::RagError, map_err};

/// Connects and runs pending migrations. Unreachable database is a fatal
/// error: the caller is expected to let this propagate to process exit.
/// `acquire_timeout` bounds how long a caller waits for a pool connection,
/// so a saturated pool fails fast instead of queuing requests indefinitely.
pub async fn init(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<PgPool, RagError> {
    let pool = map_err!(
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
    );
    map_err!(sqlx::migrate!("../migrations").run(&pool).await);
    info!("connected to postgres and ran migrations");
    Ok(pool)
}

impl Atomic for PgPool {
    type Tx = Transaction<'static, Postgres>;

    async fn start_tx(&self) -> Result<Self::Tx, RagError> {
        Ok(map_err!(self.begin().await))
    }

    async fn commit_tx(&self, tx: Self::Tx) -> Result<(), RagError> {
        map_err!(tx.commit().await);
        Ok(())
    }

    async fn abort_tx(&self, tx: Self::Tx) -> Result<(), RagError> {
        map_err!(tx.rollback().await);
        Ok(())
    }
}
