//! 仓储层
//!
//! Token、促销、核销记录、积分账本的数据访问。

pub mod ledger_repo;
pub mod promotion_repo;
pub mod redemption_repo;
pub mod token_repo;
pub mod traits;

pub use ledger_repo::LedgerRepository;
pub use promotion_repo::PromotionRepository;
pub use redemption_repo::RedemptionRepository;
pub use token_repo::PromoTokenRepository;
pub use traits::{PromoTokenRepositoryTrait, PromotionRepositoryTrait, RedemptionRepositoryTrait};
