use crate::value_objects::{Handle, PasswordHash, PersonName, Timestamp, UserEmail, UserId};

/// 注册用户。创建后不再修改。
///
/// 序列化形式即存储在 `users/{id}` 下的记录，包含密码哈希，
/// 因此不要直接返回给客户端。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub handle: Handle,
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub email: UserEmail,
    pub password_hash: PasswordHash,
    pub created_at: Timestamp,
}

impl User {
    pub fn register(
        id: UserId,
        handle: Handle,
        first_name: PersonName,
        last_name: PersonName,
        email: UserEmail,
        password_hash: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            handle,
            first_name,
            last_name,
            email,
            password_hash,
            created_at: now,
        }
    }
}
