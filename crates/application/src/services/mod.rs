mod auth_service;
mod chat_service;

#[cfg(test)]
mod test_support;

pub use auth_service::{
    AuthService, AuthServiceDependencies, AuthSession, LoginRequest, RegisterUserRequest,
};
pub use chat_service::{ChatService, ChatServiceDependencies, CreateRoomRequest};
