use std::sync::Arc;

use application::{CredentialStore, MemoryCredentialStore, PasswordHasher};
use config::AppConfig;
use thiserror::Error;
use tracing::info;

use crate::{
    migrations::MIGRATOR,
    password::BcryptPasswordHasher,
    pg_store::{create_pg_pool, PgCredentialStore},
};

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub store_url: String,
    pub max_connections: u32,
    pub bcrypt_cost: u32,
}

impl From<&AppConfig> for InfrastructureConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            store_url: config.store.url.clone(),
            max_connections: config.store.max_connections,
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("unsupported store url scheme: {0}")]
    UnsupportedStore(String),
}

#[derive(Clone)]
pub struct Infrastructure {
    pub store: Arc<dyn CredentialStore>,
    pub password_hasher: Arc<BcryptPasswordHasher>,
}

impl Infrastructure {
    /// 根据存储 URL 选择后端：`memory://` 或 `postgres://`
    pub async fn connect(config: InfrastructureConfig) -> Result<Self, InfrastructureError> {
        let store: Arc<dyn CredentialStore> = if config.store_url.starts_with("memory://") {
            info!("使用进程内存储，数据不会持久化");
            Arc::new(MemoryCredentialStore::new())
        } else if config.store_url.starts_with("postgres://")
            || config.store_url.starts_with("postgresql://")
        {
            let pool = create_pg_pool(&config.store_url, config.max_connections).await?;
            MIGRATOR.run(&pool).await?;
            info!("PostgreSQL 存储已就绪");
            Arc::new(PgCredentialStore::new(pool))
        } else {
            let scheme = config
                .store_url
                .split_once("://")
                .map(|(scheme, _)| scheme.to_owned())
                .unwrap_or_default();
            return Err(InfrastructureError::UnsupportedStore(scheme));
        };

        let password_hasher = Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost));

        Ok(Self {
            store,
            password_hasher,
        })
    }

    pub fn password_hasher_trait(&self) -> Arc<dyn PasswordHasher> {
        self.password_hasher.clone()
    }
}
