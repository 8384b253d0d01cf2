use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{InviteCode, MessageId, RoomId, UserId};

/// 持久化存储中的层级路径，例如 `rooms/{id}/messages`。
///
/// 每一段只允许字母、数字、`-` 和 `_`，因此路径本身不会被客户端输入注入。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorePath(String);

impl StorePath {
    pub const USERS: &'static str = "users";
    pub const CODES: &'static str = "codes";
    pub const ROOMS: &'static str = "rooms";
    pub const MESSAGES: &'static str = "messages";

    /// 从字符串解析路径
    pub fn parse(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if path.is_empty() || !path.split('/').all(Self::is_valid_segment) {
            return Err(DomainError::invalid_argument("store_path", "格式不正确"));
        }
        Ok(Self(path))
    }

    fn root(name: &'static str) -> Self {
        Self(name.to_owned())
    }

    fn is_valid_segment(segment: &str) -> bool {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// 追加子节点
    pub fn child(&self, segment: impl AsRef<str>) -> Result<Self, DomainError> {
        let segment = segment.as_ref();
        if !Self::is_valid_segment(segment) {
            return Err(DomainError::invalid_argument("store_path", "格式不正确"));
        }
        Ok(Self(format!("{}/{}", self.0, segment)))
    }

    // 以下构造函数的片段都来自已校验的值对象，拼接结果必然合法
    fn join(&self, segment: impl fmt::Display) -> Self {
        Self(format!("{}/{}", self.0, segment))
    }

    pub fn users() -> Self {
        Self::root(Self::USERS)
    }

    pub fn user(id: UserId) -> Self {
        Self::users().join(id)
    }

    pub fn codes() -> Self {
        Self::root(Self::CODES)
    }

    pub fn code(code: &InviteCode) -> Self {
        Self::codes().join(code)
    }

    pub fn rooms() -> Self {
        Self::root(Self::ROOMS)
    }

    pub fn room(id: RoomId) -> Self {
        Self::rooms().join(id)
    }

    pub fn messages(room_id: RoomId) -> Self {
        Self::room(room_id).join(Self::MESSAGES)
    }

    pub fn message(room_id: RoomId, id: MessageId) -> Self {
        Self::messages(room_id).join(id)
    }

    /// 获取父路径
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|pos| Self(self.0[..pos].to_owned()))
    }

    /// 最后一段，通常就是记录的键
    pub fn key(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// 检查是否是指定路径的后代
    pub fn is_descendant_of(&self, ancestor: &StorePath) -> bool {
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.0
    }
}
