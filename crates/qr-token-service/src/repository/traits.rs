//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{PromoToken, Promotion, Redemption};

/// 促销仓储接口（对本服务只读）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromotionRepositoryTrait: Send + Sync {
    async fn get_promotion(&self, id: Uuid) -> Result<Option<Promotion>>;
}

/// Token 仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromoTokenRepositoryTrait: Send + Sync {
    async fn get_token(&self, id: Uuid) -> Result<Option<PromoToken>>;

    async fn create_token(&self, token: &PromoToken) -> Result<()>;

    /// 撤销元组下所有 Issued 且未过期的 token，返回受影响行数
    async fn revoke_active_tokens(
        &self,
        user_id: &str,
        promo_id: Uuid,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    /// 惰性过期：将超过 expires_at 的 Issued token 标记为 Expired
    async fn mark_expired(&self, id: Uuid) -> Result<()>;
}

/// 核销记录仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionRepositoryTrait: Send + Sync {
    async fn get_by_token_id(&self, token_id: Uuid) -> Result<Option<Redemption>>;

    /// 统计用户在某促销下已批准的核销次数（封顶检查）
    async fn count_approved(&self, user_id: &str, promo_id: Uuid) -> Result<i64>;
}
