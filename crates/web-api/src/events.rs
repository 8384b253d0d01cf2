//! 客户端经 WebSocket 发送的事件
//!
//! 线上格式与服务端事件一致：`{"event": name, "data": payload}`。

use domain::RoomId;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: RoomId },
    CreateRoom {
        #[serde(default)]
        name: String,
        #[serde(default)]
        description: Option<String>,
        /// 存活时长（小时）
        #[serde(default)]
        expiry: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveRoom { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        room_id: RoomId,
        #[serde(default)]
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    GetMessages { room_id: RoomId },
    GetChatRooms {},
}

impl ClientEvent {
    /// 解析一帧文本；缺省或为 null 的 `data` 视为空对象
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let mut frame: Value = serde_json::from_str(text)?;
        if let Value::Object(fields) = &mut frame {
            let data = fields.entry("data").or_insert(Value::Null);
            if data.is_null() {
                *data = Value::Object(Map::new());
            }
        }
        serde_json::from_value(frame)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::CreateRoom { .. } => "createRoom",
            ClientEvent::RemoveRoom { .. } => "removeRoom",
            ClientEvent::SendMessage { .. } => "sendMessage",
            ClientEvent::GetMessages { .. } => "getMessages",
            ClientEvent::GetChatRooms {} => "getChatRooms",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_room_events() {
        let room_id = Uuid::new_v4();
        let event = ClientEvent::parse(&format!(
            r#"{{"event":"sendMessage","data":{{"roomId":"{room_id}","message":"hi"}}}}"#
        ))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                room_id: RoomId::from(room_id),
                message: "hi".to_string(),
            }
        );
        assert_eq!(event.name(), "sendMessage");
    }

    #[test]
    fn create_room_fields_are_optional() {
        let event = ClientEvent::parse(r#"{"event":"createRoom","data":{"name":"General"}}"#)
            .unwrap();
        assert_eq!(
            event,
            ClientEvent::CreateRoom {
                name: "General".to_string(),
                description: None,
                expiry: None,
            }
        );

        // 名称缺失交给服务层报告 MissingField
        let event = ClientEvent::parse(r#"{"event":"createRoom","data":{"expiry":48}}"#).unwrap();
        assert!(matches!(event, ClientEvent::CreateRoom { name, expiry: Some(48), .. } if name.is_empty()));
    }

    #[test]
    fn room_list_request_accepts_missing_or_empty_data() {
        for text in [
            r#"{"event":"getChatRooms"}"#,
            r#"{"event":"getChatRooms","data":null}"#,
            r#"{"event":"getChatRooms","data":{}}"#,
        ] {
            assert_eq!(ClientEvent::parse(text).unwrap(), ClientEvent::GetChatRooms {});
        }
    }

    #[test]
    fn malformed_frames_are_errors() {
        for text in [
            "not json",
            r#"["joinRoom"]"#,
            r#"{"event":"dance","data":{}}"#,
            r#"{"event":"joinRoom","data":{"roomId":"not-a-uuid"}}"#,
            r#"{"event":"joinRoom","data":{}}"#,
        ] {
            assert!(ClientEvent::parse(text).is_err(), "{text} should be rejected");
        }
    }
}
