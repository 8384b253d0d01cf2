use std::sync::Arc;

use application::{AuthService, ChatService};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, chat: Arc<ChatService>) -> Self {
        Self { auth, chat }
    }
}
