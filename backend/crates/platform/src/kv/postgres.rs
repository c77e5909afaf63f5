//! PostgreSQL expiring store
//!
//! Backed by the `kv_entries` table from `database/migrations`.

use super::{ExpiringStore, KvResult};
use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn expiry_ms(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| Utc::now().timestamp_millis() + ttl.as_millis() as i64)
}

impl ExpiringStore for PgStore {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let now_ms = Utc::now().timestamp_millis();

        let value = sqlx::query_scalar::<_, Vec<u8>>(
            r#"
            SELECT value FROM kv_entries
            WHERE key = $1 AND (expires_at_ms IS NULL OR expires_at_ms > $2)
            "#,
        )
        .bind(key)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> KvResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at_ms)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at_ms = EXCLUDED.expires_at_ms
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_ms(ttl))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> KvResult<u64> {
        let now_ms = Utc::now().timestamp_millis();

        let deleted = sqlx::query("DELETE FROM kv_entries WHERE expires_at_ms < $1")
            .bind(now_ms)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!(deleted, "Purged expired key/value entries");

        Ok(deleted)
    }
}
