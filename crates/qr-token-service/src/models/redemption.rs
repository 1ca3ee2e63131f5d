//! 核销记录实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RedemptionOutcome;

/// 核销记录
///
/// token_id 上的唯一约束保证同一 token 永远只会产生一条核销记录，
/// 并发写入冲突由数据库兜底，应用层将冲突映射为 duplicate 结果。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub id: Uuid,
    pub user_id: String,
    pub promo_id: Uuid,
    /// 核销操作方（POS 标识，未提供时为 "system"）
    pub presenter_id: String,
    /// 被核销的 token ID（唯一）
    pub token_id: Uuid,
    pub outcome: RedemptionOutcome,
    pub created_at: DateTime<Utc>,
}
