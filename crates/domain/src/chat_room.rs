use chrono::Duration;

use crate::errors::DomainError;
use crate::message::Message;
use crate::value_objects::{RoomId, Timestamp, UserId};

/// 聊天室元数据，即 `rooms/{id}` 下保存的记录。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl ChatRoom {
    pub const DEFAULT_LIFETIME_HOURS: i64 = 24;
    pub const MAX_LIFETIME_HOURS: i64 = 24 * 30;

    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        description: Option<String>,
        created_by: UserId,
        created_at: Timestamp,
        lifetime_hours: Option<i64>,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name.into())?;
        let description = Self::validate_description(description.unwrap_or_default())?;
        let hours = lifetime_hours.unwrap_or(Self::DEFAULT_LIFETIME_HOURS);
        if !(1..=Self::MAX_LIFETIME_HOURS).contains(&hours) {
            return Err(DomainError::invalid_argument(
                "expiry",
                format!("must be between 1 and {} hours", Self::MAX_LIFETIME_HOURS),
            ));
        }

        Ok(Self {
            id,
            name,
            description,
            created_by,
            created_at,
            expires_at: created_at + Duration::hours(hours),
        })
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    fn validate_name(name: String) -> Result<String, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::MissingField { field: "name" });
        }
        if trimmed.chars().count() > 60 {
            return Err(DomainError::invalid_argument("name", "too long"));
        }
        Ok(trimmed.to_owned())
    }

    fn validate_description(description: String) -> Result<String, DomainError> {
        let trimmed = description.trim();
        if trimmed.chars().count() > 500 {
            return Err(DomainError::invalid_argument("description", "too long"));
        }
        Ok(trimmed.to_owned())
    }
}

/// 房间元数据加上完整的消息序列，用于房间列表。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    #[serde(flatten)]
    pub room: ChatRoom,
    pub messages: Vec<Message>,
}
