//! 服务层测试共用的替身实现

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use domain::{InviteCode, PasswordHash, Timestamp, UserId};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::clock::Clock;
use crate::password::{PasswordHasher, PasswordHasherError};
use crate::token::{IssuedToken, TokenError, TokenKind, TokenService};

const SESSION_PREFIX: &str = "session.";
const INVITE_PREFIX: &str = "invite.";

/// 明文可读的令牌，只区分种类，不做签名
#[derive(Default)]
pub struct FakeTokens;

impl FakeTokens {
    fn issued(token: String) -> IssuedToken {
        IssuedToken {
            token,
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn strip<'a>(token: &'a str, kind: TokenKind) -> Result<&'a str, TokenError> {
        let (wanted, other) = match kind {
            TokenKind::Session => (SESSION_PREFIX, INVITE_PREFIX),
            TokenKind::Invite => (INVITE_PREFIX, SESSION_PREFIX),
        };
        if let Some(rest) = token.strip_prefix(wanted) {
            return Ok(rest);
        }
        if token.starts_with(other) {
            return Err(TokenError::WrongKind { expected: kind });
        }
        Err(TokenError::Invalid(token.to_owned()))
    }
}

impl TokenService for FakeTokens {
    fn issue_session(&self, user_id: UserId) -> Result<IssuedToken, TokenError> {
        Ok(Self::issued(format!("{SESSION_PREFIX}{user_id}")))
    }

    fn verify_session(&self, token: &str) -> Result<UserId, TokenError> {
        let raw = Self::strip(token, TokenKind::Session)?;
        Uuid::parse_str(raw)
            .map(UserId::from)
            .map_err(|err| TokenError::Invalid(err.to_string()))
    }

    fn issue_invite(&self, code: &InviteCode) -> Result<IssuedToken, TokenError> {
        Ok(Self::issued(format!("{INVITE_PREFIX}{code}")))
    }

    fn verify_invite(&self, token: &str) -> Result<InviteCode, TokenError> {
        let raw = Self::strip(token, TokenKind::Invite)?;
        InviteCode::parse(raw).map_err(|err| TokenError::Invalid(err.to_string()))
    }
}

#[derive(Default)]
pub struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        PasswordHash::new(format!("plain:{plaintext}"))
            .map_err(|err| PasswordHasherError::Hash(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        Ok(hashed.as_str() == format!("plain:{plaintext}"))
    }
}

/// 对指定明文的哈希会挂起，直到 `release` 被调用
pub struct GatedHasher {
    held: &'static str,
    release: Notify,
}

impl GatedHasher {
    pub fn holding(held: &'static str) -> Self {
        Self {
            held,
            release: Notify::new(),
        }
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl PasswordHasher for GatedHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        if plaintext == self.held {
            self.release.notified().await;
        }
        PlainHasher.hash(plaintext).await
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        PlainHasher.verify(plaintext, hashed).await
    }
}

/// 可手动推进的时钟
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now -= by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }
}
