//! 密码哈希端口。明文只在调用期间存在，不会被记录或持久化。

use async_trait::async_trait;
use domain::PasswordHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordHasherError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored hash could not be checked: {0}")]
    Verify(String),
    #[error("hashing task aborted: {0}")]
    Aborted(String),
}

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// 生成带盐哈希
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError>;

    /// 哈希本身损坏时返回错误，而不是 `Ok(false)`
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError>;
}
