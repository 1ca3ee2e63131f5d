//! 服务层 DTO 定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 签发结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenResponse {
    /// 签名后的紧凑 token 字符串
    pub token: String,
    /// token 过期时间
    pub expires_at: DateTime<Utc>,
    /// 服务端当前时间，供客户端做时钟偏移校正
    pub server_now: DateTime<Utc>,
    /// token ID（jti）
    pub token_id: Uuid,
}

/// 核销请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    /// 待核销的 token 字符串
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    /// POS 端标识（可选）
    #[serde(default)]
    pub pos_id: Option<String>,
}

/// 核销结果状态
///
/// 每次核销调用恰好产生其中一个结果；业务拒绝不作为错误抛出，
/// 调用方按 status 分支处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemStatus {
    /// 核销成功
    Approved,
    /// token 已核销过（幂等重放）
    Duplicate,
    /// token 已过期
    Expired,
    /// 促销不在有效窗口内
    Inactive,
    /// 用户已达该促销的核销上限
    OutOfCap,
    /// token 无效/已撤销/未知（兜底拒绝）
    Revoked,
}

impl RedeemStatus {
    /// 稳定的字符串表示，用于指标标签
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Duplicate => "duplicate",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
            Self::OutOfCap => "out_of_cap",
            Self::Revoked => "revoked",
        }
    }
}

/// 核销响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub status: RedeemStatus,
    /// 核销记录 ID（approved / duplicate 时存在）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redemption_id: Option<Uuid>,
    /// 人类可读的拒绝原因
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RedeemResponse {
    pub fn approved(redemption_id: Uuid) -> Self {
        Self {
            status: RedeemStatus::Approved,
            redemption_id: Some(redemption_id),
            reason: None,
        }
    }

    pub fn duplicate(redemption_id: Uuid) -> Self {
        Self {
            status: RedeemStatus::Duplicate,
            redemption_id: Some(redemption_id),
            reason: Some("token already redeemed".to_string()),
        }
    }

    pub fn rejected(status: RedeemStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            redemption_id: None,
            reason: Some(reason.into()),
        }
    }
}
