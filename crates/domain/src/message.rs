use crate::value_objects::{MessageBody, MessageId, RoomId, Timestamp, UserId};

/// 聊天消息。创建后不可修改，只会随房间整体删除。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub body: MessageBody,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        sender_id: UserId,
        body: MessageBody,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            sender_id,
            body,
            timestamp,
        }
    }
}
