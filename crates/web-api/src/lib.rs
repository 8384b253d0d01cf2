//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP / WebSocket 请求委托给应用层的认证与聊天服务。

mod auth;
mod error;
mod events;
mod routes;
mod state;
mod ws_connection;

pub use auth::{bearer_token, Claims, Identity, JwtService};
pub use config::JwtConfig;
pub use error::{ApiError, ErrorBody};
pub use events::ClientEvent;
pub use routes::router;
pub use state::AppState;
