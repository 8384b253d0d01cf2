#![allow(dead_code)]

use std::sync::Arc;

use application::{
    AuthService, AuthServiceDependencies, ChatService, ChatServiceDependencies, CredentialStore,
    InviteRegistry, MemoryCredentialStore, SystemClock,
};
use axum::Router;
use domain::InviteCode;
use infrastructure::BcryptPasswordHasher;
use web_api::{router, AppState, JwtConfig, JwtService};

pub const SECRET: &str = "integration-test-secret-with-enough-length";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryCredentialStore>,
    pub auth: Arc<AuthService>,
    pub chat: Arc<ChatService>,
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: SECRET.to_string(),
        session_ttl_hours: 24,
        invite_ttl_minutes: 15,
    }
}

/// 内存存储 + 最低成本的 bcrypt，组装与生产一致的路由
pub fn build_app() -> TestApp {
    let store = Arc::new(MemoryCredentialStore::new());
    let shared: Arc<dyn CredentialStore> = store.clone();
    let clock = Arc::new(SystemClock);

    let auth = Arc::new(AuthService::new(AuthServiceDependencies {
        store: shared.clone(),
        password_hasher: Arc::new(BcryptPasswordHasher::new(4)),
        token_service: Arc::new(JwtService::new(jwt_config())),
        clock: clock.clone(),
    }));
    let chat = Arc::new(ChatService::new(ChatServiceDependencies {
        store: shared,
        clock,
    }));

    let state = AppState::new(auth.clone(), chat.clone());
    TestApp {
        router: router(state, &["*".to_string()]),
        store,
        auth,
        chat,
    }
}

pub async fn seed_code(app: &TestApp, raw: &str) -> InviteCode {
    let code = InviteCode::parse(raw).expect("valid code");
    InviteRegistry::new(app.store.clone())
        .persist(&[code.clone()])
        .await
        .expect("persist code");
    code
}
