//! Token 签发服务
//!
//! 处理 QR Token 的签发与显式撤销：
//! - 签发前校验促销存在性与有效窗口
//! - 撤销同元组下的旧 token（重新签发是提前作废未过期 token 的唯一途径）
//! - 创建 token 行并签名
//!
//! ## 签发流程
//!
//! 1. 促销校验 -> 2. 撤销旧 token -> 3. 创建 token 行 -> 4. 签名返回

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{QrError, Result};
use crate::models::{PromoToken, TokenStatus};
use crate::repository::{PromoTokenRepositoryTrait, PromotionRepositoryTrait};
use crate::service::dto::IssueTokenResponse;
use crate::token::TokenSigner;

/// Token 签发服务
pub struct IssueService<PR, TR>
where
    PR: PromotionRepositoryTrait,
    TR: PromoTokenRepositoryTrait,
{
    promotion_repo: Arc<PR>,
    token_repo: Arc<TR>,
    signer: TokenSigner,
    /// token 有效期（秒）
    ttl_seconds: i64,
}

impl<PR, TR> IssueService<PR, TR>
where
    PR: PromotionRepositoryTrait,
    TR: PromoTokenRepositoryTrait,
{
    pub fn new(
        promotion_repo: Arc<PR>,
        token_repo: Arc<TR>,
        signer: TokenSigner,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            promotion_repo,
            token_repo,
            signer,
            ttl_seconds,
        }
    }

    /// 签发 QR Token
    ///
    /// 前置校验失败（促销不存在/窗口外）直接返回错误，不产生任何副作用。
    /// 校验通过后先撤销元组下所有活跃 token，再创建并签名新 token——
    /// 旧 token 即使签名仍然有效也无法再核销，有效性是
    /// 「签名有效 AND 存储行仍为 Issued」的合取。
    #[instrument(skip(self), fields(user_id = %user_id, promo_id = %promo_id))]
    pub async fn issue(
        &self,
        user_id: &str,
        promo_id: Uuid,
        device_id: &str,
    ) -> Result<IssueTokenResponse> {
        // 1. 促销校验
        let promotion = self
            .promotion_repo
            .get_promotion(promo_id)
            .await?
            .ok_or(QrError::PromotionNotFound(promo_id))?;

        let now = Utc::now();
        if let Some(reason) = promotion.inactive_reason(now) {
            return Err(QrError::PromotionNotActive {
                promo_id,
                reason: reason.to_string(),
            });
        }

        // 2. 撤销同元组下的旧 token
        let revoked = self
            .token_repo
            .revoke_active_tokens(user_id, promo_id, device_id, now)
            .await?;
        if revoked > 0 {
            info!(revoked = revoked, "签发前撤销了旧 token");
        }

        // 3. 创建 token 行
        let expires_at = now + Duration::seconds(self.ttl_seconds);
        let token_row = PromoToken {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            promo_id,
            device_id: device_id.to_string(),
            status: TokenStatus::Issued,
            issued_at: now,
            expires_at,
            redeemed_at: None,
        };
        self.token_repo.create_token(&token_row).await?;

        // 4. 签名
        let token = self
            .signer
            .sign(user_id, promo_id, token_row.id, device_id, now, expires_at)?;

        metrics::counter!("qr_tokens_issued_total").increment(1);
        info!(token_id = %token_row.id, expires_at = %expires_at, "QR token 签发成功");

        Ok(IssueTokenResponse {
            token,
            expires_at,
            server_now: now,
            token_id: token_row.id,
        })
    }

    /// 显式撤销元组下所有活跃 token
    ///
    /// 幂等：没有活跃 token 时也视为成功。
    #[instrument(skip(self), fields(user_id = %user_id, promo_id = %promo_id))]
    pub async fn revoke(&self, user_id: &str, promo_id: Uuid, device_id: &str) -> Result<()> {
        let revoked = self
            .token_repo
            .revoke_active_tokens(user_id, promo_id, device_id, Utc::now())
            .await?;

        metrics::counter!("qr_tokens_revoked_total").increment(revoked);
        info!(revoked = revoked, "显式撤销完成");

        Ok(())
    }
}
