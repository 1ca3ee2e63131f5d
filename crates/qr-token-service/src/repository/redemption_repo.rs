//! 核销记录仓储
//!
//! redemptions.token_id 上的唯一约束是幂等性的最终防线，
//! 写入冲突由核销引擎捕获并映射为 duplicate。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::traits::RedemptionRepositoryTrait;
use crate::error::Result;
use crate::models::{Redemption, RedemptionOutcome};

/// 核销记录仓储
pub struct RedemptionRepository {
    pool: PgPool,
}

impl RedemptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按 token ID 查询核销记录
    pub async fn get_by_token_id(&self, token_id: Uuid) -> Result<Option<Redemption>> {
        let redemption = sqlx::query_as::<_, Redemption>(
            r#"
            SELECT id, user_id, promo_id, presenter_id, token_id, outcome, created_at
            FROM redemptions
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(redemption)
    }

    /// 统计用户在某促销下已批准的核销次数
    pub async fn count_approved(&self, user_id: &str, promo_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM redemptions
            WHERE user_id = $1 AND promo_id = $2 AND outcome = $3
            "#,
        )
        .bind(user_id)
        .bind(promo_id)
        .bind(RedemptionOutcome::Approved)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// 在事务中统计已批准的核销次数
    ///
    /// 封顶检查必须与写入同处一个可串行化事务，否则并发下会双双通过。
    pub async fn count_approved_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        promo_id: Uuid,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM redemptions
            WHERE user_id = $1 AND promo_id = $2 AND outcome = $3
            "#,
        )
        .bind(user_id)
        .bind(promo_id)
        .bind(RedemptionOutcome::Approved)
        .fetch_one(tx)
        .await?;

        Ok(count)
    }

    /// 在事务中创建核销记录
    ///
    /// token_id 冲突时返回的数据库错误（23505）由调用方处理。
    pub async fn create_in_tx(tx: &mut PgConnection, redemption: &Redemption) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO redemptions (id, user_id, promo_id, presenter_id, token_id, outcome, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(redemption.id)
        .bind(&redemption.user_id)
        .bind(redemption.promo_id)
        .bind(&redemption.presenter_id)
        .bind(redemption.token_id)
        .bind(redemption.outcome)
        .bind(redemption.created_at)
        .execute(tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RedemptionRepositoryTrait for RedemptionRepository {
    async fn get_by_token_id(&self, token_id: Uuid) -> Result<Option<Redemption>> {
        self.get_by_token_id(token_id).await
    }

    async fn count_approved(&self, user_id: &str, promo_id: Uuid) -> Result<i64> {
        self.count_approved(user_id, promo_id).await
    }
}
