//! QR Token 签名与验证
//!
//! 签发器和验证器只依赖注入的 SigningConfig，不读取任何全局状态。
//! 验证是纯函数：只校验签名与 exp 声明，不访问存储层——
//! token 的最终有效性是「签名有效 AND 存储行仍为 Issued」的合取，
//! 后者由核销引擎负责。

mod signer;
mod verifier;

pub use signer::TokenSigner;
pub use verifier::{TokenVerification, TokenVerifier, VerifiedToken};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// QR Token 的 JWT 载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrClaims {
    /// 用户 ID
    pub sub: String,
    /// 促销 ID
    pub pid: Uuid,
    /// Token ID（全局唯一，兼作核销幂等键）
    pub jti: Uuid,
    /// 设备标识
    pub dev: String,
    /// 签发时间（Unix 秒）
    pub iat: i64,
    /// 过期时间（Unix 秒）
    pub exp: i64,
}
