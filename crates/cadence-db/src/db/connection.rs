//! Connection pooling for the aggregate store.

use std::time::Duration;

use cadence_core::config::DatabaseConfig;
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};

use crate::db::DbProvider;
use crate::error::DbResult;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection<'pool> = PooledConnection<'pool, AsyncPgConnection>;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// ## Summary
/// Creates the pool described by `config` and checks out one connection so a bad URL
/// fails at start-up rather than on the first request.
///
/// ## Errors
/// Returns an error if the pool cannot be built or the database is unreachable.
#[tracing::instrument(skip(config), fields(max_connections = config.max_connections))]
pub async fn create_pool(config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.as_str());

    let pool = Pool::builder()
        .max_size(u32::from(config.max_connections.max(1)))
        .min_idle(Some(1))
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)
        .await?;

    drop(pool.get().await?);
    tracing::info!("Database pool ready");

    Ok(pool)
}

impl DbProvider for DbPool {
    fn get_connection<'a>(
        &'a self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = DbResult<DbConnection<'a>>> + Send + 'a>>
    {
        Box::pin(async move { Ok(self.get().await?) })
    }
}
