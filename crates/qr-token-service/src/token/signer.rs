//! QR Token 签发器

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use uuid::Uuid;

use promo_shared::config::SigningConfig;

use super::QrClaims;
use crate::error::{QrError, Result};

/// QR Token 签发器
///
/// 用 SigningConfig 中的当前密钥做 HS256 对称签名，
/// header 中携带 kid 以支持密钥轮换。
#[derive(Clone)]
pub struct TokenSigner {
    kid: String,
    encoding_key: EncodingKey,
}

impl TokenSigner {
    /// 创建签发器
    ///
    /// active_kid 在 keys 中不存在属于配置错误，启动期即报错。
    pub fn new(config: &SigningConfig) -> Result<Self> {
        let key = config.active_key().ok_or_else(|| {
            QrError::Signing(format!(
                "active signing key not found: kid={}",
                config.active_kid
            ))
        })?;

        Ok(Self {
            kid: key.kid.clone(),
            encoding_key: EncodingKey::from_secret(key.secret.as_bytes()),
        })
    }

    /// 签发紧凑格式的 QR Token
    pub fn sign(
        &self,
        user_id: &str,
        promo_id: Uuid,
        token_id: Uuid,
        device_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = QrClaims {
            sub: user_id.to_string(),
            pid: promo_id,
            jti: token_id,
            dev: device_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.kid.clone());

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| QrError::Signing(format!("token encoding failed: {}", e)))
    }
}
