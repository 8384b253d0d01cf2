//! 基础设施层实现。
//!
//! 提供持久化存储与密码哈希等适配器，实现应用层定义的接口。

pub mod builder;
pub mod migrations;
pub mod password;
pub mod pg_store;

pub use builder::{Infrastructure, InfrastructureConfig, InfrastructureError};
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use pg_store::{create_pg_pool, PgCredentialStore};
