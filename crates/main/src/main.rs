//! 主应用程序入口
//!
//! 加载配置、打开存储、生成邀请码批次，然后启动 Axum HTTP / WebSocket 服务。

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use application::{
    AuthService, AuthServiceDependencies, ChatService, ChatServiceDependencies, Clock,
    InviteRegistry, SystemClock,
};
use config::AppConfig;
use infrastructure::{Infrastructure, InfrastructureConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("加载配置失败")?;
    info!(
        listen = %config.listen_addr(),
        store = %config.store.url_scheme(),
        "配置已加载"
    );

    let infra = Infrastructure::connect(InfrastructureConfig::from(&config))
        .await
        .context("打开存储失败")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let auth = Arc::new(AuthService::new(AuthServiceDependencies {
        store: infra.store.clone(),
        password_hasher: infra.password_hasher_trait(),
        token_service: Arc::new(JwtService::new(config.jwt.clone())),
        clock: clock.clone(),
    }));
    let chat = Arc::new(ChatService::new(ChatServiceDependencies {
        store: infra.store.clone(),
        clock,
    }));

    let rooms = chat.hydrate().await.context("加载房间失败")?;
    info!(rooms, "房间索引已预热");

    // 邀请码冲突直接终止启动
    let codes = InviteRegistry::generate_batch(config.invites.batch_size);
    InviteRegistry::new(infra.store.clone())
        .persist(&codes)
        .await
        .context("写入邀请码失败")?;
    for code in &codes {
        info!(code = %code, "邀请码");
    }

    spawn_reaper(
        chat.clone(),
        Duration::from_secs(config.rooms.reaper_interval_secs),
    );

    let app = router(AppState::new(auth, chat), &config.server.cors_origins);
    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("无法监听 {}", config.listen_addr()))?;

    info!("BoredRoom 服务器启动在 http://{}", config.listen_addr());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("服务器已停止");
    Ok(())
}

/// 定期删除过期房间，在线会话会收到 `roomRemoved`
fn spawn_reaper(chat: Arc<ChatService>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match chat.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "已清理过期房间"),
                Err(err) => error!(error = %err, "清理过期房间失败"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "无法监听 Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("收到关闭信号");
}
