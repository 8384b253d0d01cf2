//! 统一配置中心
//!
//! 配置按以下优先级合并：
//! - 内置默认值
//! - 便捷环境变量 `PORT`、`DATABASE_URL`、`JWT_SECRET`
//! - `BOREDROOM_` 前缀的环境变量，`__` 表示嵌套，例如 `BOREDROOM_JWT__SESSION_TTL_HOURS`
//!
//! 签名密钥没有默认值，缺失时加载失败。

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const ENV_PREFIX: &str = "BOREDROOM_";

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub store: StoreConfig,
    #[validate(nested)]
    pub jwt: JwtConfig,
    #[validate(nested)]
    pub invites: InviteConfig,
    #[validate(nested)]
    pub rooms: RoomConfig,
    #[validate(range(min = 4, max = 31))]
    pub bcrypt_cost: u32,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// 持久化存储配置，`memory://` 或 `postgres://...`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    #[validate(length(min = 1))]
    pub url: String,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    #[validate(range(min = 1))]
    pub session_ttl_hours: i64,
    #[validate(range(min = 1))]
    pub invite_ttl_minutes: i64,
}

/// 启动时生成的邀请码批次
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InviteConfig {
    #[validate(range(min = 1, max = 10000))]
    pub batch_size: usize,
}

/// 房间过期清理
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RoomConfig {
    #[validate(range(min = 1))]
    pub reaper_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 5000,
                cors_origins: vec!["*".into()],
            },
            store: StoreConfig {
                url: "memory://".into(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                session_ttl_hours: 24,
                invite_ttl_minutes: 15,
            },
            invites: InviteConfig { batch_size: 10 },
            rooms: RoomConfig {
                reaper_interval_secs: 60,
            },
            bcrypt_cost: 10,
        }
    }
}

impl AppConfig {
    /// 从环境变量加载并校验配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 默认值与环境变量合并后的 figment，便于测试时追加覆盖
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .merge(
                Env::raw()
                    .only(&["DATABASE_URL"])
                    .map(|_| "store.url".into()),
            )
            .merge(Env::raw().only(&["JWT_SECRET"]).map(|_| "jwt.secret".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// 基础校验之外的规则
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::InvalidJwtSecret(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }
        let supported = ["memory://", "postgres://", "postgresql://"];
        if !supported
            .iter()
            .any(|scheme| self.store.url.starts_with(scheme))
        {
            return Err(ConfigError::UnsupportedStore(self.store.url_scheme()));
        }
        Validate::validate(self)?;
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl StoreConfig {
    /// 只返回协议部分，避免把连接串中的口令写进日志
    pub fn url_scheme(&self) -> String {
        self.url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_owned())
            .unwrap_or_else(|| "<none>".to_owned())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("JWT_SECRET is required")]
    MissingSecret,
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
    #[error("unsupported store scheme: {0}")]
    UnsupportedStore(String),
}
