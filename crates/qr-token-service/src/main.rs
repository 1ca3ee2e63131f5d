//! 促销 QR Token 服务入口
//!
//! 提供 QR Token 签发、撤销与核销的 REST API。

use std::sync::Arc;

use promo_shared::{config::AppConfig, database::Database, observability};
use qr_token_service::{
    repository::{PromoTokenRepository, PromotionRepository, RedemptionRepository},
    routes,
    service::{IssueService, RedeemService},
    state::AppState,
    token::{TokenSigner, TokenVerifier},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 统一加载配置：config/default.toml + 环境覆盖 + PROMO_ 环境变量
    let config = AppConfig::load("qr-token-service").unwrap_or_default();

    observability::init(&config.observability).await?;

    info!("Starting qr-token-service on {}", config.server_addr());

    // 默认密钥只允许在开发环境使用
    check_dev_secrets(&config)?;

    // 初始化基础设施
    let db = Database::connect(&config.database).await?;
    db.run_migrations(&sqlx::migrate!("./migrations")).await?;

    // 组装服务：仓储 -> 服务 -> AppState
    let promotion_repo = Arc::new(PromotionRepository::new(db.pool().clone()));
    let token_repo = Arc::new(PromoTokenRepository::new(db.pool().clone()));
    let redemption_repo = Arc::new(RedemptionRepository::new(db.pool().clone()));

    let signer = TokenSigner::new(&config.signing)?;
    let verifier = TokenVerifier::new(config.signing.clone());

    let issue_service = Arc::new(IssueService::new(
        promotion_repo.clone(),
        token_repo.clone(),
        signer,
        config.signing.ttl_seconds,
    ));
    let redeem_service = Arc::new(RedeemService::new(
        promotion_repo,
        token_repo,
        redemption_repo,
        verifier,
        db.pool().clone(),
    ));

    let state = AppState::new(
        db.pool().clone(),
        issue_service,
        redeem_service,
        Arc::new(config.clone()),
    );

    let app = routes::app_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM（K8s 停止 Pod）或 Ctrl+C 时，
    // 停止接收新连接并等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 生产环境禁止使用内置开发密钥
fn check_dev_secrets(config: &AppConfig) -> anyhow::Result<()> {
    let dev_secrets = [
        config
            .signing
            .active_key()
            .map(|k| k.secret.as_str())
            .unwrap_or(""),
        config.auth.jwt_secret.as_str(),
        config.pos.api_key.as_str(),
    ];
    let has_dev_secret = dev_secrets.iter().any(|s| s.contains("change-in-production"));

    if has_dev_secret {
        if config.is_production() {
            anyhow::bail!("生产环境必须通过配置注入签名密钥、JWT 密钥和 POS API Key");
        }
        warn!("Using built-in dev secrets - override signing/auth/pos config for production");
    }

    Ok(())
}

/// 监听关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
