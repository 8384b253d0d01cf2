use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 注册时密码的最小长度（按字符计）。
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// 用户唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<UserId> for Uuid {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// 聊天室唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub Uuid);

impl RoomId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RoomId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<RoomId> for Uuid {
    fn from(value: RoomId) -> Self {
        value.0
    }
}

/// 消息唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<MessageId> for Uuid {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

/// 经过验证的用户句柄（登录名之外的公开昵称）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(String);

impl Handle {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::MissingField { field: "handle" });
        }
        if value.chars().count() > 50 {
            return Err(DomainError::invalid_argument("handle", "too long"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 名或姓，不允许出现数字。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName(String);

impl PersonName {
    /// 只检查数字规则，供调用方在其他校验之前先行执行。
    pub fn ensure_no_digits(field: &'static str, value: &str) -> Result<(), DomainError> {
        if value.chars().any(|c| c.is_numeric()) {
            return Err(DomainError::InvalidName { field });
        }
        Ok(())
    }

    pub fn parse(field: &'static str, value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        Self::ensure_no_digits(field, &value)?;
        let value = value.trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::MissingField { field });
        }
        if value.chars().count() > 80 {
            return Err(DomainError::invalid_argument(field, "too long"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 经过验证的邮箱，统一为小写。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserEmail(String);

impl UserEmail {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_lowercase();
        if value.is_empty() {
            return Err(DomainError::MissingField { field: "email" });
        }
        match value.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(Self(value)),
            _ => Err(DomainError::invalid_argument(
                "email",
                "must look like name@domain",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 校验明文密码是否满足注册要求，不保留明文。
pub fn validate_password(plaintext: &str) -> Result<(), DomainError> {
    if plaintext.is_empty() {
        return Err(DomainError::MissingField { field: "password" });
    }
    if plaintext.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DomainError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// 经过外部服务生成的密码哈希。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let hash = value.into();
        if hash.trim().is_empty() {
            return Err(DomainError::invalid_argument(
                "password_hash",
                "cannot be empty",
            ));
        }
        Ok(Self(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 消息正文内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody(String);

impl MessageBody {
    pub const MAX_CHARS: usize = 4000;

    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::MissingField { field: "message" });
        }
        if value.chars().count() > Self::MAX_CHARS {
            return Err(DomainError::invalid_argument("message", "too long"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 一次性邀请码，格式为四组三位数字，例如 `012-345-678-901`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InviteCode(String);

impl InviteCode {
    pub const GROUPS: usize = 4;

    /// 由四个 0..1000 的分组拼出邀请码。
    pub fn from_groups(groups: [u16; Self::GROUPS]) -> Self {
        let parts: Vec<String> = groups.iter().map(|g| format!("{:03}", g % 1000)).collect();
        Self(parts.join("-"))
    }

    pub fn parse(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let value = value.as_ref().trim();
        let groups: Vec<&str> = value.split('-').collect();
        let well_formed = groups.len() == Self::GROUPS
            && groups
                .iter()
                .all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()));
        if !well_formed {
            return Err(DomainError::InvalidCode);
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_code_groups_are_zero_padded() {
        let code = InviteCode::from_groups([12, 345, 7, 901]);
        assert_eq!(code.as_str(), "012-345-007-901");
        assert_eq!(InviteCode::parse(code.as_str()).unwrap(), code);
    }

    #[test]
    fn invite_code_rejects_malformed_input() {
        for raw in ["", "123-456-789", "123-456-789-01a", "1234-567-890-123", "../codes"] {
            assert_eq!(InviteCode::parse(raw), Err(DomainError::InvalidCode), "{raw}");
        }
    }

    #[test]
    fn person_name_digit_rule_runs_before_emptiness() {
        assert_eq!(
            PersonName::parse("first_name", "R2D2"),
            Err(DomainError::InvalidName { field: "first_name" })
        );
        assert_eq!(
            PersonName::parse("last_name", "   "),
            Err(DomainError::MissingField { field: "last_name" })
        );
        assert_eq!(PersonName::parse("last_name", " Curie ").unwrap().as_str(), "Curie");
    }

    #[test]
    fn password_length_boundary() {
        assert_eq!(
            validate_password("1234567"),
            Err(DomainError::WeakPassword { min: 8 })
        );
        assert!(validate_password("12345678").is_ok());
        // 按字符而不是字节计数
        assert!(validate_password("密码密码密码密码").is_ok());
    }

    #[test]
    fn email_is_normalized() {
        let email = UserEmail::parse("  Ada@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "ada@example.com");
        assert!(UserEmail::parse("no-at-sign").is_err());
        assert!(UserEmail::parse("@example.com").is_err());
    }
}
