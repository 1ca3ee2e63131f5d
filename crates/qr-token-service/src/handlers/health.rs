//! 健康检查处理器

use axum::{Json, extract::State};

use crate::state::AppState;

/// 存活探针：服务进程正常即返回 ok
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "qr-token-service"
    }))
}

/// 就绪探针：检查数据库连接是否可用
///
/// K8s 就绪探针失败时会将 Pod 从 Service 端点移除，
/// 避免将流量路由到无法正常处理请求的实例。
pub async fn readiness_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "service": "qr-token-service",
        "checks": {
            "database": if db_ok { "ok" } else { "fail" }
        }
    }))
}
