//! 业务服务层
//!
//! 服务通过泛型仓储 trait 与存储解耦，便于单元测试注入 mock。

pub mod dto;
pub mod issue_service;
pub mod redeem_service;

pub use dto::{IssueTokenResponse, RedeemRequest, RedeemResponse, RedeemStatus};
pub use issue_service::IssueService;
pub use redeem_service::RedeemService;
