//! QR Token 签发/撤销 API 处理器
//!
//! 用户侧端点，经 JWT 认证中间件注入 AuthUser。
//! 设备标识通过 X-Device-Id 头部传递，同一用户在多台设备上
//! 各自持有独立的活跃 token，重新签发只影响当前设备。

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use uuid::Uuid;

use crate::error::{QrError, Result};
use crate::middleware::AuthUser;
use crate::service::IssueTokenResponse;
use crate::state::AppState;

/// 设备标识 Header 名称
const DEVICE_ID_HEADER: &str = "x-device-id";

/// 设备标识最大长度，与 promo_tokens.device_id 列宽一致
const DEVICE_ID_MAX_LEN: usize = 128;

/// 从请求头提取设备标识
///
/// 校验失败直接拒绝，不产生任何副作用（不撤销旧 token）。
fn extract_device_id(headers: &HeaderMap) -> Result<String> {
    let device_id = headers
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("");

    if device_id.is_empty() {
        return Err(QrError::Validation(
            "x-device-id header is required".to_string(),
        ));
    }
    if device_id.len() > DEVICE_ID_MAX_LEN {
        return Err(QrError::Validation(format!(
            "x-device-id must not exceed {} characters",
            DEVICE_ID_MAX_LEN
        )));
    }

    Ok(device_id.to_string())
}

/// 签发 QR Token
///
/// POST /promotions/{promo_id}/qr -> 201
///
/// 为当前用户在当前设备上签发一个短时效 token，
/// 同元组下的旧活跃 token 在签发前被撤销。
pub async fn issue_qr(
    State(state): State<AppState>,
    Path(promo_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<IssueTokenResponse>)> {
    let device_id = extract_device_id(&headers)?;

    let response = state
        .issue_service
        .issue(&user.user_id, promo_id, &device_id)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// 显式撤销当前设备上的活跃 token
///
/// POST /promotions/{promo_id}/qr/revoke
///
/// 幂等操作，无论是否存在活跃 token 都返回 204。
pub async fn revoke_qr(
    State(state): State<AppState>,
    Path(promo_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let device_id = extract_device_id(&headers)?;

    state
        .issue_service
        .revoke(&user.user_id, promo_id, &device_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
