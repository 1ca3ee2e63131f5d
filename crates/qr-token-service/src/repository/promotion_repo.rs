//! 促销仓储
//!
//! 促销记录的维护（CRUD、上下架）属于外部的促销管理服务，
//! 本服务只做只读查询。

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::traits::PromotionRepositoryTrait;
use crate::error::Result;
use crate::models::Promotion;

/// 促销仓储（只读）
pub struct PromotionRepository {
    pool: PgPool,
}

impl PromotionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 获取单个促销
    pub async fn get_promotion(&self, id: Uuid) -> Result<Option<Promotion>> {
        let promotion = sqlx::query_as::<_, Promotion>(
            r#"
            SELECT id, title, description, points, school_id,
                   starts_at, ends_at, per_user_cap, created_at, updated_at
            FROM promotions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promotion)
    }
}

#[async_trait]
impl PromotionRepositoryTrait for PromotionRepository {
    async fn get_promotion(&self, id: Uuid) -> Result<Option<Promotion>> {
        self.get_promotion(id).await
    }
}
