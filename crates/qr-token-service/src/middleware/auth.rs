//! JWT 认证中间件
//!
//! 验证请求中的 Bearer Token 并将用户身份注入请求扩展。
//! 会话 JWT 由外部身份层签发，本服务只验签并取 sub 作为用户 ID，
//! 不维护自己的用户表。

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::state::AppState;

/// 会话 JWT 声明（只取身份相关字段）
#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
}

/// 已认证的用户身份，注入请求扩展供处理器提取
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// 认证中间件
///
/// 从 Authorization header 提取 Bearer Token，验证后将 AuthUser 注入请求扩展。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return unauthorized_response("缺少认证 Token");
        }
    };

    let key = DecodingKey::from_secret(state.config.auth.jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    match decode::<SessionClaims>(token, &key, &validation) {
        Ok(data) => {
            if data.claims.sub.is_empty() {
                return unauthorized_response("Token 缺少用户标识");
            }
            debug!(user_id = %data.claims.sub, "会话认证通过");
            request.extensions_mut().insert(AuthUser {
                user_id: data.claims.sub,
            });
            next.run(request).await
        }
        Err(e) => unauthorized_response(&e.to_string()),
    }
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
