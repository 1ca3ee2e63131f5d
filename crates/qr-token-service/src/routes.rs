//! 路由配置模块
//!
//! 用户侧路由挂 JWT 认证中间件，POS 侧路由挂 API Key 中间件，
//! 健康检查端点不做认证。

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware::{auth_middleware, pos_key_middleware};
use crate::state::AppState;

/// 用户侧路由（需要 Bearer JWT）
fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/promotions/{promo_id}/qr", post(handlers::qr::issue_qr))
        .route(
            "/promotions/{promo_id}/qr/revoke",
            post(handlers::qr::revoke_qr),
        )
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// POS 侧路由（需要 X-API-Key）
fn pos_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/redeem", post(handlers::redeem::redeem))
        .layer(middleware::from_fn_with_state(state, pos_key_middleware))
}

/// 构建完整应用路由
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .merge(user_routes(state.clone()))
        .merge(pos_routes(state.clone()))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .with_state(state)
}
