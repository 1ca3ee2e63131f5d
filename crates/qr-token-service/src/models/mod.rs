//! 数据模型定义

pub mod enums;
pub mod ledger;
pub mod promotion;
pub mod redemption;
pub mod token;

pub use enums::{RedemptionOutcome, TokenStatus};
pub use ledger::PointsLedgerEntry;
pub use promotion::Promotion;
pub use redemption::Redemption;
pub use token::PromoToken;
