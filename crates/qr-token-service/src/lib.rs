//! 促销 QR Token 服务
//!
//! 为校园促销活动提供短时效 QR Token 的签发与核销：
//! - 用户侧：签发/撤销绑定 (用户, 促销, 设备) 元组的签名 token
//! - POS 侧：核销 token，写入核销记录与积分账本
//!
//! 核销的并发正确性依赖两道防线：redemptions.token_id 唯一约束
//! 保证同一 token 只核销一次，SERIALIZABLE 事务保证封顶计数准确。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod token;
