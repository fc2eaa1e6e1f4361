use crate::queries::Queries;
use crate::ClientResult;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::str::FromStr;

/// Host storage: a small SQLite key/value store.
pub struct ClientDatabase {
    pub pool: SqlitePool,
}

impl ClientDatabase {
    pub async fn new(database_url: &str) -> ClientResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // An in-memory database lives only as long as its connections, so pin one.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> ClientResult<()> {
        sqlx::query(Queries::SCHEMA).execute(&self.pool).await?;
        tracing::debug!("DATABASE: schema ready");
        Ok(())
    }

    pub async fn get_item(&self, key: &str) -> ClientResult<Option<String>> {
        let row = sqlx::query(Queries::GET_ITEM)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.try_get("value")).transpose()?)
    }

    pub async fn set_item(&self, key: &str, value: &str) -> ClientResult<()> {
        sqlx::query(Queries::UPSERT_ITEM)
            .bind(key)
            .bind(value)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> ClientResult<()> {
        sqlx::query(Queries::REMOVE_ITEM)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn keys(&self) -> ClientResult<Vec<String>> {
        let rows = sqlx::query(Queries::LIST_KEYS).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get("storage_key").map_err(Into::into))
            .collect()
    }
}
