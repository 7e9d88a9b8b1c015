use cadence_core::store::StoreError;
use thiserror::Error;

/// Database layer errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Pool error: {0}")]
    PoolError(#[from] diesel_async::pooled_connection::bb8::RunError),

    #[error("Invalid row in {table}: {message}")]
    InvalidRow {
        table: &'static str,
        message: String,
    },

    #[error("Migration error: {0}")]
    Migration(String),

    #[error(transparent)]
    CoreError(#[from] cadence_core::error::CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DbError {
    pub(crate) fn invalid_row(table: &'static str, error: impl std::fmt::Display) -> Self {
        Self::InvalidRow {
            table,
            message: error.to_string(),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::Store(inner) => inner,
            DbError::InvalidRow { .. } | DbError::CoreError(_) => Self::Integrity(error.to_string()),
            DbError::DatabaseError(_) | DbError::PoolError(_) | DbError::Migration(_) => {
                Self::Backend(error.to_string())
            }
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
