//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：邀请码兑换、注册登录、
//! 房间与消息的编排，以及对外部适配器（持久化存储、密码哈希、令牌签发）的抽象。

pub mod clock;
pub mod directory;
pub mod error;
pub mod invites;
pub mod password;
pub mod services;
pub mod sessions;
pub mod store;
pub mod token;

pub use clock::{Clock, SystemClock};
pub use directory::{RoomDirectory, RoomEntry, RoomHandle};
pub use error::ApplicationError;
pub use invites::{InviteRecord, InviteRegistry};
pub use password::{PasswordHasher, PasswordHasherError};
pub use services::{
    AuthService, AuthServiceDependencies, AuthSession, ChatService, ChatServiceDependencies,
    CreateRoomRequest, LoginRequest, RegisterUserRequest,
};
pub use sessions::{
    outbound_channel, EventReceiver, EventSender, ServerEvent, SessionId, SessionRegistry,
    OUTBOUND_CAPACITY,
};
pub use store::{memory::MemoryCredentialStore, CredentialStore, StoreEntry};
pub use token::{IssuedToken, TokenError, TokenKind, TokenService};
