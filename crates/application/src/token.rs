//! 令牌签发与校验的抽象。
//!
//! 会话令牌与邀请令牌使用同一密钥签名，但各自携带 `kind`，
//! 一种令牌永远不会被当作另一种接受。

use domain::{InviteCode, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Invite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: Timestamp,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("unexpected token kind, expected {expected:?}")]
    WrongKind { expected: TokenKind },
    #[error("malformed or tampered token: {0}")]
    Invalid(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

pub trait TokenService: Send + Sync {
    fn issue_session(&self, user_id: UserId) -> Result<IssuedToken, TokenError>;
    fn verify_session(&self, token: &str) -> Result<UserId, TokenError>;
    fn issue_invite(&self, code: &InviteCode) -> Result<IssuedToken, TokenError>;
    fn verify_invite(&self, token: &str) -> Result<InviteCode, TokenError>;
}
