//! Token 仓储
//!
//! 提供 promo_tokens 表的数据访问。token 行永不删除，
//! 生命周期变化全部通过 status 字段表达。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::traits::PromoTokenRepositoryTrait;
use crate::error::Result;
use crate::models::{PromoToken, TokenStatus};

/// Token 仓储
pub struct PromoTokenRepository {
    pool: PgPool,
}

impl PromoTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按 token ID（jti）查询
    pub async fn get_token(&self, id: Uuid) -> Result<Option<PromoToken>> {
        let token = sqlx::query_as::<_, PromoToken>(
            r#"
            SELECT id, user_id, promo_id, device_id, status, issued_at, expires_at, redeemed_at
            FROM promo_tokens
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// 创建 token 行
    pub async fn create_token(&self, token: &PromoToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO promo_tokens (id, user_id, promo_id, device_id, status, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id)
        .bind(&token.user_id)
        .bind(token.promo_id)
        .bind(&token.device_id)
        .bind(token.status)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 撤销元组下所有 Issued 且未过期的 token
    ///
    /// 幂等：没有活跃 token 时返回 0，不报错。
    pub async fn revoke_active_tokens(
        &self,
        user_id: &str,
        promo_id: Uuid,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE promo_tokens
            SET status = $1
            WHERE user_id = $2 AND promo_id = $3 AND device_id = $4
              AND status = $5 AND expires_at > $6
            "#,
        )
        .bind(TokenStatus::Revoked)
        .bind(user_id)
        .bind(promo_id)
        .bind(device_id)
        .bind(TokenStatus::Issued)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// 惰性过期标记
    ///
    /// 只迁移仍处于 Issued 的行，避免覆盖并发写入的终态。
    pub async fn mark_expired(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE promo_tokens
            SET status = $1
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(TokenStatus::Expired)
        .bind(id)
        .bind(TokenStatus::Issued)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 在事务中将 token 标记为已核销
    pub async fn mark_redeemed_in_tx(
        tx: &mut PgConnection,
        id: Uuid,
        redeemed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE promo_tokens
            SET status = $1, redeemed_at = $2
            WHERE id = $3
            "#,
        )
        .bind(TokenStatus::Redeemed)
        .bind(redeemed_at)
        .bind(id)
        .execute(tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PromoTokenRepositoryTrait for PromoTokenRepository {
    async fn get_token(&self, id: Uuid) -> Result<Option<PromoToken>> {
        self.get_token(id).await
    }

    async fn create_token(&self, token: &PromoToken) -> Result<()> {
        self.create_token(token).await
    }

    async fn revoke_active_tokens(
        &self,
        user_id: &str,
        promo_id: Uuid,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        self.revoke_active_tokens(user_id, promo_id, device_id, now)
            .await
    }

    async fn mark_expired(&self, id: Uuid) -> Result<()> {
        self.mark_expired(id).await
    }
}
