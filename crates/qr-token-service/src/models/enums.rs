//! 枚举类型定义

use serde::{Deserialize, Serialize};

/// Token 生命周期状态
///
/// 状态只会单向迁移：Issued -> {Redeemed, Expired, Revoked}，
/// 终态之间不会互相转换，token 行永不删除。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum TokenStatus {
    /// 已签发 - 唯一可核销的状态
    #[default]
    Issued,
    /// 已核销
    Redeemed,
    /// 已过期（惰性标记，首次核销尝试时落库）
    Expired,
    /// 已撤销（重新签发或显式撤销）
    Revoked,
}

impl TokenStatus {
    /// 状态描述，用于核销拒绝时的 reason 字段
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Redeemed => "already redeemed",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

/// 核销结果（持久化）
///
/// 目前只有 Approved 会落库：被拒绝的核销不产生 Redemption 行。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum RedemptionOutcome {
    #[default]
    Approved,
}
