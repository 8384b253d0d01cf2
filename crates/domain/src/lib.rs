//! BoredRoom 核心领域模型
//!
//! 包含用户、聊天室、消息、邀请码等值对象与实体，以及持久化路径的约定。

pub mod chat_room;
pub mod errors;
pub mod message;
pub mod store_path;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use chat_room::{ChatRoom, RoomSnapshot};
pub use errors::*;
pub use message::Message;
pub use store_path::StorePath;
pub use user::User;
pub use value_objects::*;
