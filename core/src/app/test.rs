//! Test suites and utilities.

use std::time::Duration;

use sqlx::PgPool;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;

pub type PostgresContainer = ContainerAsync<Postgres>;

/// Starts a postgres test container, connects to it, and runs migrations.
/// When using suitest's [`before_all`][suitest::before_all], make sure you
/// return the container too, otherwise it gets dropped and torn down while
/// the suite is still running.
pub async fn init_postgres() -> (PgPool, PostgresContainer) {
    let pg_image = Postgres::default().start().await.expect("postgres container error");

    let pg_host = pg_image.get_host().await.unwrap();
    let pg_port = pg_image.get_host_port_ipv4(5432).await.unwrap();
    let pg_url = format!("postgresql://postgres:postgres@{pg_host}:{pg_port}/postgres");

    let pool = crate::app::repo::pg::init(&pg_url, 5, Duration::from_secs(5))
        .await
        .expect("failed to connect to postgres test container");

    (pool, pg_image)
}
