#![allow(clippy::unused_async, clippy::expect_used, dead_code)]
//! Test helpers for integration tests.
//!
//! Each test gets its own database, created on demand from
//! `CADENCE_TEST_DATABASE_URL` and dropped by [`TestDb::cleanup`]. Tests skip
//! themselves when the variable is unset.

use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use cadence_core::config::DatabaseConfig;
use cadence_db::db::connection::{DbPool, create_pool};
use cadence_db::db::migrate::run_migrations;
use cadence_db::store::PgAggregateStore;

pub use tracing;

const DATABASE_URL_VAR: &str = "CADENCE_TEST_DATABASE_URL";

/// Returns the server URL without a database name, if configured.
fn base_database_url() -> Option<String> {
    let url = std::env::var(DATABASE_URL_VAR).ok()?;
    Some(url.trim_end_matches('/').to_string())
}

async fn admin_connection(base: &str) -> anyhow::Result<AsyncPgConnection> {
    Ok(AsyncPgConnection::establish(&format!("{base}/postgres")).await?)
}

/// An isolated, migrated database for one test.
pub struct TestDb {
    base: String,
    name: String,
    pool: DbPool,
}

impl TestDb {
    /// ## Summary
    /// Creates and migrates a fresh database.
    ///
    /// Returns `Ok(None)` when no test server is configured.
    ///
    /// ## Errors
    /// Returns an error if the database cannot be created or migrated.
    pub async fn new() -> anyhow::Result<Option<Self>> {
        let Some(base) = base_database_url() else {
            tracing::warn!("{DATABASE_URL_VAR} is not set, skipping database test");
            return Ok(None);
        };

        let name = format!("cadence_test_{}", uuid::Uuid::new_v4().simple());
        let mut admin = admin_connection(&base).await?;
        diesel::sql_query(format!("DROP DATABASE IF EXISTS {name} WITH (FORCE)"))
            .execute(&mut admin)
            .await?;
        diesel::sql_query(format!("CREATE DATABASE {name}"))
            .execute(&mut admin)
            .await?;

        let url = format!("{base}/{name}");
        run_migrations(&url).await?;
        let pool = create_pool(&DatabaseConfig {
            url,
            max_connections: 2,
        })
        .await?;

        Ok(Some(Self { base, name, pool }))
    }

    #[must_use]
    pub fn store(&self) -> PgAggregateStore {
        PgAggregateStore::new(self.pool.clone())
    }

    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// ## Summary
    /// Counts rows of `table` in this database.
    ///
    /// ## Errors
    /// Returns an error if the query fails.
    pub async fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        #[derive(diesel::QueryableByName)]
        struct Count {
            #[diesel(sql_type = diesel::sql_types::BigInt)]
            count: i64,
        }

        let mut conn = self.pool.get().await?;
        let row: Count = diesel::sql_query(format!("SELECT COUNT(*) AS count FROM {table}"))
            .get_result(&mut conn)
            .await?;
        Ok(row.count)
    }

    /// ## Summary
    /// Drops the database. The pool is closed first.
    ///
    /// ## Errors
    /// Returns an error if the drop fails.
    pub async fn cleanup(self) -> anyhow::Result<()> {
        let Self { base, name, pool } = self;
        drop(pool);
        let mut admin = admin_connection(&base).await?;
        diesel::sql_query(format!("DROP DATABASE IF EXISTS {name} WITH (FORCE)"))
            .execute(&mut admin)
            .await?;
        Ok(())
    }
}

/// Creates a [`TestDb`] or returns from the calling test when none is configured.
macro_rules! test_db_or_skip {
    () => {
        match $crate::helpers::TestDb::new()
            .await
            .expect("Failed to create test database")
        {
            Some(db) => db,
            None => return,
        }
    };
}

pub(crate) use test_db_or_skip;
