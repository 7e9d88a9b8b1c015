//! Embedded schema migrations.

use diesel::Connection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::error::{DbError, DbResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// ## Summary
/// Applies every pending migration to the database at `database_url`.
///
/// Migrations run on a blocking connection inside `spawn_blocking`.
///
/// ## Errors
/// Returns `DbError::Migration` if connecting or migrating fails.
#[tracing::instrument(skip(database_url))]
pub async fn run_migrations(database_url: &str) -> DbResult<()> {
    let url = database_url.to_string();

    let applied = tokio::task::spawn_blocking(move || {
        let mut conn = diesel::PgConnection::establish(&url)
            .map_err(|e| DbError::Migration(format!("failed to connect: {e}")))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.len())
            .map_err(|e| DbError::Migration(format!("failed to run migrations: {e}")))
    })
    .await
    .map_err(|e| DbError::Migration(format!("migration task failed: {e}")))??;

    tracing::info!(applied, "Database migrations applied");

    Ok(())
}
