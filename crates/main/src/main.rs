//! 主应用程序入口
//!
//! 加载配置、连接数据库、初始化角色与默认管理员，然后启动 Axum Web API 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{Clock, SystemClock};
use axum::http::HeaderValue;
use config::AppConfig;
use infrastructure::Infrastructure;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志，默认 info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    config
        .validate_strict()
        .context("configuration rejected")?;
    tracing::info!(config = %config.sanitize(), "配置已加载");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let infra = Infrastructure::connect(&config, clock.clone())
        .await
        .context("failed to initialize storage")?;

    let state = AppState::build(&config, &infra, clock);
    state
        .accounts
        .seed_defaults(&config.seed)
        .await
        .context("failed to seed roles and administrator")?;

    let presence = state.presence.clone();
    let app = router(state)
        .layer(cors_layer(&config.server.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("聊天室服务器启动在 http://{address}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    presence.shutdown().await;
    if let Some(pool) = infra.pool {
        pool.close().await;
    }
    tracing::info!("服务已停止");
    Ok(())
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin {origin}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(layer.allow_origin(origins))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("收到关闭信号");
}
