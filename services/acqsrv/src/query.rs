//! Scalar query execution for QUERY measurements

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use errors::{AcqError, AcqResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// Runs a query and returns the first column of the first row
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute_scalar(&self, query: &str) -> AcqResult<Option<f64>>;
}

/// SQLite-backed executor
#[derive(Debug, Clone)]
pub struct SqliteQueryExecutor {
    pool: SqlitePool,
}

impl SqliteQueryExecutor {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(path: impl AsRef<Path>, read_only: bool) -> AcqResult<Self> {
        let path = path.as_ref();
        if read_only && !path.exists() {
            return Err(AcqError::configuration(format!(
                "database file not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .read_only(read_only)
            .create_if_missing(!read_only);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        info!(
            "Query database opened{}: {}",
            if read_only { " (read-only)" } else { "" },
            path.display()
        );
        Ok(Self { pool })
    }
}

/// First column as a number; NULL and empty results are no value
fn first_column(row: &SqliteRow) -> AcqResult<Option<f64>> {
    if let Ok(value) = row.try_get::<Option<f64>, _>(0) {
        return Ok(value);
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(0) {
        return Ok(value.map(|v| v as f64));
    }
    let text: Option<String> = row.try_get(0)?;
    match text {
        None => Ok(None),
        Some(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AcqError::query(format!("non-numeric result '{}'", text))),
    }
}

#[async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn execute_scalar(&self, query: &str) -> AcqResult<Option<f64>> {
        let row = sqlx::query(query).fetch_optional(&self.pool).await?;
        let value = match row {
            Some(row) => first_column(&row)?,
            None => None,
        };
        debug!("Query '{}' -> {:?}", query, value);
        Ok(value)
    }
}
