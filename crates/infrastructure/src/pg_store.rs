//! PostgreSQL 实现的层级键值存储。
//!
//! 所有节点存放在 `store_nodes` 一张表中，`parent` 列用于列举直接子节点，
//! `seq` 记录首次写入顺序。

use application::{CredentialStore, StoreEntry};
use async_trait::async_trait;
use domain::{StoreError, StorePath};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::error;
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> StoreError {
    error!(error = %err, "存储访问失败");
    StoreError::unavailable(err.to_string())
}

fn parent_of(path: &StorePath) -> Option<String> {
    path.parent().map(String::from)
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        sqlx::query_scalar::<_, Value>("SELECT value FROM store_nodes WHERE path = $1")
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO store_nodes (path, parent, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (path) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(path.as_str())
        .bind(parent_of(path))
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn create(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO store_nodes (path, parent, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (path) DO NOTHING
            "#,
        )
        .bind(path.as_str())
        .bind(parent_of(path))
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    async fn update(&self, path: &StorePath, partial: Value) -> Result<(), StoreError> {
        if !partial.is_object() {
            return Err(StoreError::corrupt(
                path.as_str(),
                "update requires a JSON object",
            ));
        }
        let result = sqlx::query(
            "UPDATE store_nodes SET value = value || $2 WHERE path = $1 AND jsonb_typeof(value) = 'object'",
        )
        .bind(path.as_str())
        .bind(partial)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    async fn append(&self, _parent: &StorePath) -> Result<Uuid, StoreError> {
        sqlx::query_scalar::<_, Uuid>("SELECT gen_random_uuid()")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM store_nodes WHERE path = $1 OR left(path, length($1) + 1) = $1 || '/'",
        )
        .bind(path.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn children(&self, parent: &StorePath) -> Result<Vec<StoreEntry>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Value)>(
            "SELECT path, value FROM store_nodes WHERE parent = $1 ORDER BY seq",
        )
        .bind(parent.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter()
            .map(|(path, value)| -> Result<StoreEntry, StoreError> {
                let path = StorePath::parse(path.as_str())
                    .map_err(|err| StoreError::corrupt(path.as_str(), err.to_string()))?;
                Ok(StoreEntry { path, value })
            })
            .collect()
    }

    async fn exists(&self, path: &StorePath) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM store_nodes WHERE path = $1)")
            .bind(path.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn test_and_set(
        &self,
        path: &StorePath,
        field: &str,
        expected: Value,
        replacement: Value,
    ) -> Result<bool, StoreError> {
        // 单条 UPDATE 在行锁下完成比较与替换
        let result = sqlx::query(
            r#"
            UPDATE store_nodes
            SET value = jsonb_set(value, ARRAY[$2::text], $4)
            WHERE path = $1 AND value -> $2::text = $3
            "#,
        )
        .bind(path.as_str())
        .bind(field)
        .bind(expected)
        .bind(replacement)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() == 1)
    }
}
