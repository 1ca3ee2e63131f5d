//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use sqlx::PgPool;

use promo_shared::config::AppConfig;

use crate::repository::{PromoTokenRepository, PromotionRepository, RedemptionRepository};
use crate::service::{IssueService, RedeemService};

/// 生产环境使用的具体服务类型（仓储为真实 Postgres 实现）
pub type AppIssueService = IssueService<PromotionRepository, PromoTokenRepository>;
pub type AppRedeemService =
    RedeemService<PromotionRepository, PromoTokenRepository, RedemptionRepository>;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL 连接池
    pub pool: PgPool,
    pub issue_service: Arc<AppIssueService>,
    pub redeem_service: Arc<AppRedeemService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        issue_service: Arc<AppIssueService>,
        redeem_service: Arc<AppRedeemService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            pool,
            issue_service,
            redeem_service,
            config,
        }
    }
}
