//! POS API Key 认证中间件
//!
//! 核销端点由商户 POS 调用，通过 X-API-Key 头部认证。
//! 与用户侧 JWT 认证互斥使用，适用于服务端到服务端的调用场景。

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::state::AppState;

/// API Key Header 名称
const API_KEY_HEADER: &str = "X-API-Key";

/// 计算 API Key 的 SHA256 哈希
///
/// 比较哈希而非明文，等长摘要的比较耗时与输入无关。
fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// POS API Key 认证中间件
pub async fn pos_key_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let api_key = match headers.get(API_KEY_HEADER) {
        Some(value) => match value.to_str() {
            Ok(key) => key,
            Err(_) => {
                warn!("Invalid API Key header encoding");
                return Err(unauthorized_response("Invalid API Key header"));
            }
        },
        None => {
            return Err(unauthorized_response("Missing API Key"));
        }
    };

    if hash_api_key(api_key) != hash_api_key(&state.config.pos.api_key) {
        warn!(
            key_prefix = &api_key[..std::cmp::min(6, api_key.len())],
            "Invalid API Key"
        );
        return Err(unauthorized_response("Invalid API Key"));
    }

    Ok(next.run(request).await)
}

/// 生成 401 未授权响应
fn unauthorized_response(message: &str) -> Response {
    let body = json!({
        "success": false,
        "code": "UNAUTHORIZED",
        "message": message,
        "data": null
    });

    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}
