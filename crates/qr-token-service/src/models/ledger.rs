//! 积分账本实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 积分账本流水
///
/// 只追加不修改，用户余额始终为其全部 delta 之和，可随时重建和审计。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointsLedgerEntry {
    pub id: Uuid,
    pub user_id: String,
    /// 积分变动量（核销入账为正）
    pub delta: i32,
    /// 变动原因描述
    pub reason: String,
    #[sqlx(default)]
    pub promo_id: Option<Uuid>,
    #[sqlx(default)]
    pub redemption_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
