//! 核销 API 处理器
//!
//! POS 侧端点，经 X-API-Key 中间件认证。
//! 核销结果永远以 200 返回，业务拒绝通过 status 字段表达，
//! POS 端只需按 status 分支，无需解析错误码。

use axum::{Json, extract::State};
use validator::Validate;

use crate::error::Result;
use crate::service::{RedeemRequest, RedeemResponse};
use crate::state::AppState;

/// 核销 QR Token
///
/// POST /redeem
pub async fn redeem(
    State(state): State<AppState>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>> {
    req.validate()?;

    let response = state
        .redeem_service
        .redeem(&req.token, req.pos_id.as_deref())
        .await;

    Ok(Json(response))
}
