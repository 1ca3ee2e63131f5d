//! 积分账本仓储
//!
//! 只追加不修改。余额不落库，永远由 delta 求和得出，保证可审计。

use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::PointsLedgerEntry;

/// 积分账本仓储
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中追加账本流水
    ///
    /// 账本写入只发生在核销事务内，与核销记录、token 状态变更同生共死。
    pub async fn create_in_tx(tx: &mut PgConnection, entry: &PointsLedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO points_ledger (id, user_id, delta, reason, promo_id, redemption_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(entry.delta)
        .bind(&entry.reason)
        .bind(entry.promo_id)
        .bind(entry.redemption_id)
        .bind(entry.created_at)
        .execute(tx)
        .await?;

        Ok(())
    }

    /// 用户当前积分余额（全部 delta 之和）
    pub async fn get_balance(&self, user_id: &str) -> Result<i64> {
        let balance: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(delta), 0)::BIGINT
            FROM points_ledger
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }

    /// 列出用户的账本流水，按时间倒序
    pub async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<PointsLedgerEntry>> {
        let entries = sqlx::query_as::<_, PointsLedgerEntry>(
            r#"
            SELECT id, user_id, delta, reason, promo_id, redemption_id, created_at
            FROM points_ledger
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
