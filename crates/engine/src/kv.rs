use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use common::{KvStore, Result};

/// Apply the workspace migrations to `pool`.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(sqlx::Error::from)?;
    Ok(())
}

/// `KvStore` persisted in the `kv_store` SQLite table.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        debug!(key, "Saved key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sqlx::sqlite::SqlitePoolOptions;
    use strategy::PersistentCounter;

    use super::*;

    async fn pool() -> SqlitePool {
        // One connection: every in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn absent_key_loads_as_none() {
        let store = SqliteKvStore::new(pool().await);
        assert_eq!(store.load("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_overwrites_previous_value() {
        let store = SqliteKvStore::new(pool().await);
        store.save("k", "1").await.unwrap();
        store.save("k", "2").await.unwrap();
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn counter_survives_a_new_store_handle() {
        let pool = pool().await;

        let counter = PersistentCounter::new(Arc::new(SqliteKvStore::new(pool.clone())));
        assert_eq!(counter.increment("counter").await.unwrap(), 1);
        assert_eq!(counter.increment("counter").await.unwrap(), 2);
        drop(counter);

        let store = SqliteKvStore::new(pool);
        assert_eq!(store.load("counter").await.unwrap().as_deref(), Some("2"));
        let counter = PersistentCounter::new(Arc::new(store));
        assert_eq!(counter.increment("counter").await.unwrap(), 3);
    }
}
