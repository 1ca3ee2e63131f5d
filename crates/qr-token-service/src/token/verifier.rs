//! QR Token 验证器

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind};
use uuid::Uuid;

use promo_shared::config::SigningConfig;

use super::QrClaims;

/// 验签成功后提取的业务字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: String,
    pub promo_id: Uuid,
    pub token_id: Uuid,
    pub device_id: String,
}

/// 验证结果
///
/// 用带标签的结果代替异常控制流，核销引擎按分支处理，
/// 不需要捕获和甄别解码错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerification {
    /// 签名有效且未过期
    Valid(VerifiedToken),
    /// 签名有效但 exp 声明已过期
    Expired,
    /// 签名无效（含格式错误、密钥不匹配、声明缺失）
    InvalidSignature,
}

/// QR Token 验证器
///
/// 无状态：只校验签名和 exp，不访问 Token 存储。
/// 按 header 中的 kid 选择密钥；没有 kid 的旧 token 回退到当前密钥。
#[derive(Clone)]
pub struct TokenVerifier {
    config: SigningConfig,
}

impl TokenVerifier {
    pub fn new(config: SigningConfig) -> Self {
        Self { config }
    }

    /// 验证 token 字符串
    pub fn verify(&self, token: &str) -> TokenVerification {
        let header = match decode_header(token) {
            Ok(h) => h,
            Err(_) => return TokenVerification::InvalidSignature,
        };

        let kid = header.kid.as_deref().unwrap_or(&self.config.active_kid);
        let Some(key) = self.config.key_for(kid) else {
            return TokenVerification::InvalidSignature;
        };
        let decoding_key = DecodingKey::from_secret(key.secret.as_bytes());

        // TTL 只有 120 秒，默认 60 秒的时钟宽容度会显著拉长实际有效期
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<QrClaims>(token, &decoding_key, &validation) {
            Ok(data) => TokenVerification::Valid(VerifiedToken {
                user_id: data.claims.sub,
                promo_id: data.claims.pid,
                token_id: data.claims.jti,
                device_id: data.claims.dev,
            }),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => TokenVerification::Expired,
                _ => TokenVerification::InvalidSignature,
            },
        }
    }
}
