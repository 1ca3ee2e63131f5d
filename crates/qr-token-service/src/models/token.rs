//! Token 实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TokenStatus;

/// 促销 QR Token
///
/// 一条记录对应一次签发。同一 (user_id, promo_id, device_id) 组合
/// 任意时刻最多只有一条 Issued 且未过期的记录——签发时撤销旧 token 保证。
/// 注意同一用户同一促销在不同设备上可以同时持有各自的有效 token。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PromoToken {
    /// 全局唯一 token ID（JWT 的 jti 声明），同时是核销幂等键
    pub id: Uuid,
    /// 用户 ID
    pub user_id: String,
    /// 促销 ID
    pub promo_id: Uuid,
    /// 设备标识
    pub device_id: String,
    /// 生命周期状态
    pub status: TokenStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// 核销时间（仅 Redeemed 状态有值）
    #[sqlx(default)]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl PromoToken {
    /// 是否已超过存储层的过期时间
    ///
    /// 核销引擎据此触发惰性过期落库；expires_at 当刻仍视为有效。
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
