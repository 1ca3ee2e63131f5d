//! 核销引擎
//!
//! 核销的核心状态机，严格按序评估：
//! 1. 验签 -> 2. 查 token 行 -> 3. 状态检查 -> 4. 惰性过期 ->
//! 5. 促销窗口复查 -> 6. 封顶检查 -> 7. 幂等检查 -> 8. 原子落账
//!
//! 业务拒绝一律表达为类型化结果而非错误；只有真正的系统故障
//! （存储不可达、签名子系统异常）走错误通道，并在出口处统一映射为
//! revoked，不向外泄露内部诊断信息。
//!
//! ## 并发正确性
//!
//! - 同一 token 并发核销：redemptions.token_id 唯一约束保证恰好一个
//!   approved，冲突方被映射为 duplicate。
//! - 封顶竞争：计数与落账同处一个 SERIALIZABLE 事务，冲突（40001）
//!   按指数退避重试，重试后重新计数自然得到 out_of_cap。

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use promo_shared::retry::{RetryPolicy, retry_with_policy};

use crate::error::{QrError, Result};
use crate::models::{
    PointsLedgerEntry, Promotion, Redemption, RedemptionOutcome, TokenStatus,
};
use crate::repository::{
    LedgerRepository, PromoTokenRepositoryTrait, PromotionRepositoryTrait, RedemptionRepository,
    RedemptionRepositoryTrait,
};
use crate::service::dto::{RedeemResponse, RedeemStatus};
use crate::token::{TokenVerification, TokenVerifier, VerifiedToken};

/// 未提供 POS 标识时的默认操作方
const DEFAULT_PRESENTER: &str = "system";

/// 封顶事务的提交结果
enum CommitOutcome {
    Approved(Uuid),
    CapExhausted(i32),
    AlreadyRedeemed(Uuid),
}

/// 核销引擎
pub struct RedeemService<PR, TR, RR>
where
    PR: PromotionRepositoryTrait,
    TR: PromoTokenRepositoryTrait,
    RR: RedemptionRepositoryTrait,
{
    promotion_repo: Arc<PR>,
    token_repo: Arc<TR>,
    redemption_repo: Arc<RR>,
    verifier: TokenVerifier,
    pool: PgPool,
    retry_policy: RetryPolicy,
}

impl<PR, TR, RR> RedeemService<PR, TR, RR>
where
    PR: PromotionRepositoryTrait,
    TR: PromoTokenRepositoryTrait,
    RR: RedemptionRepositoryTrait,
{
    pub fn new(
        promotion_repo: Arc<PR>,
        token_repo: Arc<TR>,
        redemption_repo: Arc<RR>,
        verifier: TokenVerifier,
        pool: PgPool,
    ) -> Self {
        Self {
            promotion_repo,
            token_repo,
            redemption_repo,
            verifier,
            pool,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// 核销一个 token
    ///
    /// 每次调用恰好产生一个结果；本方法不返回业务错误，
    /// 系统故障记录日志后对外统一表现为 revoked。
    #[instrument(skip(self, token_str))]
    pub async fn redeem(&self, token_str: &str, presenter_id: Option<&str>) -> RedeemResponse {
        let started = Instant::now();

        let response = match self.try_redeem(token_str, presenter_id).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, code = err.error_code(), "核销过程发生系统错误");
                RedeemResponse::rejected(RedeemStatus::Revoked, "internal error")
            }
        };

        metrics::counter!("qr_redemptions_total", "outcome" => response.status.as_str())
            .increment(1);
        metrics::histogram!("qr_redemption_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        response
    }

    async fn try_redeem(
        &self,
        token_str: &str,
        presenter_id: Option<&str>,
    ) -> Result<RedeemResponse> {
        // 1. 验签（纯函数，不访问存储）
        let verified = match self.verifier.verify(token_str) {
            TokenVerification::Valid(verified) => verified,
            TokenVerification::Expired => {
                return Ok(RedeemResponse::rejected(
                    RedeemStatus::Expired,
                    "token expired",
                ));
            }
            TokenVerification::InvalidSignature => {
                return Ok(RedeemResponse::rejected(
                    RedeemStatus::Revoked,
                    "invalid token",
                ));
            }
        };

        // 2. 查 token 行；未知/伪造的 jti 一律按 revoked 吸收
        let Some(token_row) = self.token_repo.get_token(verified.token_id).await? else {
            return Ok(RedeemResponse::rejected(
                RedeemStatus::Revoked,
                "token not found",
            ));
        };

        // 3. 状态检查：终态直接按已持久化的状态回答，不重算
        match token_row.status {
            TokenStatus::Issued => {}
            TokenStatus::Redeemed => {
                // 幂等重放：返回已存在的核销记录 ID
                if let Some(existing) = self
                    .redemption_repo
                    .get_by_token_id(verified.token_id)
                    .await?
                {
                    return Ok(RedeemResponse::duplicate(existing.id));
                }
                warn!(token_id = %verified.token_id, "token 为 Redeemed 但无核销记录");
                return Ok(RedeemResponse::rejected(
                    RedeemStatus::Revoked,
                    format!("token no longer active ({})", token_row.status.describe()),
                ));
            }
            TokenStatus::Expired => {
                return Ok(RedeemResponse::rejected(
                    RedeemStatus::Expired,
                    "token expired",
                ));
            }
            TokenStatus::Revoked => {
                return Ok(RedeemResponse::rejected(
                    RedeemStatus::Revoked,
                    format!("token no longer active ({})", token_row.status.describe()),
                ));
            }
        }

        // 4. 惰性过期：首次核销尝试时落库，而不是后台扫描
        let now = Utc::now();
        if token_row.is_past_expiry(now) {
            self.token_repo.mark_expired(verified.token_id).await?;
            return Ok(RedeemResponse::rejected(
                RedeemStatus::Expired,
                "token expired",
            ));
        }

        // 5. 促销窗口在核销时刻复查（签发时检查过不代表现在仍有效）
        let promotion = self
            .promotion_repo
            .get_promotion(verified.promo_id)
            .await?
            .ok_or(QrError::PromotionNotFound(verified.promo_id))?;

        if let Some(reason) = promotion.inactive_reason(now) {
            return Ok(RedeemResponse::rejected(RedeemStatus::Inactive, reason));
        }

        // 6. 封顶快速路径；权威检查在事务内还会再做一次
        if let Some(cap) = promotion.per_user_cap {
            let count = self
                .redemption_repo
                .count_approved(&verified.user_id, verified.promo_id)
                .await?;
            if count >= cap as i64 {
                return Ok(RedeemResponse::rejected(
                    RedeemStatus::OutOfCap,
                    format!("per-user cap reached ({})", cap),
                ));
            }
        }

        // 7. 幂等检查快速路径；最终防线是 token_id 唯一约束
        if let Some(existing) = self
            .redemption_repo
            .get_by_token_id(verified.token_id)
            .await?
        {
            return Ok(RedeemResponse::duplicate(existing.id));
        }

        // 8. 原子落账：核销记录 + token 状态 + 账本流水，全部成功或全部回滚
        let presenter = presenter_id.unwrap_or(DEFAULT_PRESENTER);
        let outcome = retry_with_policy(
            &self.retry_policy,
            "redeem_commit",
            QrError::is_serialization_conflict,
            || self.commit_approval(&verified, &promotion, presenter, now),
        )
        .await?;

        match outcome {
            CommitOutcome::Approved(redemption_id) => {
                info!(
                    token_id = %verified.token_id,
                    redemption_id = %redemption_id,
                    points = promotion.points,
                    "核销成功"
                );
                Ok(RedeemResponse::approved(redemption_id))
            }
            CommitOutcome::AlreadyRedeemed(redemption_id) => {
                Ok(RedeemResponse::duplicate(redemption_id))
            }
            CommitOutcome::CapExhausted(cap) => Ok(RedeemResponse::rejected(
                RedeemStatus::OutOfCap,
                format!("per-user cap reached ({})", cap),
            )),
        }
    }

    /// 在单个 SERIALIZABLE 事务内完成封顶复查与三笔写入
    async fn commit_approval(
        &self,
        verified: &VerifiedToken,
        promotion: &Promotion,
        presenter: &str,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // 8.1 封顶权威检查：与写入同一事务，并发下不会双双通过
        if let Some(cap) = promotion.per_user_cap {
            let count = RedemptionRepository::count_approved_in_tx(
                &mut tx,
                &verified.user_id,
                verified.promo_id,
            )
            .await?;
            if count >= cap as i64 {
                tx.rollback().await?;
                return Ok(CommitOutcome::CapExhausted(cap));
            }
        }

        // 8.2 创建核销记录；token_id 冲突说明并发方已赢得该 token
        let redemption = Redemption {
            id: Uuid::new_v4(),
            user_id: verified.user_id.clone(),
            promo_id: verified.promo_id,
            presenter_id: presenter.to_string(),
            token_id: verified.token_id,
            outcome: RedemptionOutcome::Approved,
            created_at: now,
        };
        if let Err(err) = RedemptionRepository::create_in_tx(&mut tx, &redemption).await {
            if is_unique_violation(&err) {
                tx.rollback().await.ok();
                return match self
                    .redemption_repo
                    .get_by_token_id(verified.token_id)
                    .await?
                {
                    Some(existing) => Ok(CommitOutcome::AlreadyRedeemed(existing.id)),
                    // 赢家事务尚未提交，可重试后再读
                    None => Err(QrError::ConcurrencyConflict),
                };
            }
            return Err(err);
        }

        // 8.3 token 置为已核销
        crate::repository::PromoTokenRepository::mark_redeemed_in_tx(
            &mut tx,
            verified.token_id,
            now,
        )
        .await?;

        // 8.4 账本入账
        let entry = PointsLedgerEntry {
            id: Uuid::new_v4(),
            user_id: verified.user_id.clone(),
            delta: promotion.points,
            reason: format!("promotion redeemed: {}", promotion.title),
            promo_id: Some(verified.promo_id),
            redemption_id: Some(redemption.id),
            created_at: now,
        };
        LedgerRepository::create_in_tx(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(CommitOutcome::Approved(redemption.id))
    }
}

/// 是否为唯一约束冲突（Postgres 23505）
fn is_unique_violation(err: &QrError) -> bool {
    match err {
        QrError::Database(sqlx::Error::Database(db)) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PromoToken;
    use crate::repository::traits::{
        MockPromoTokenRepositoryTrait, MockPromotionRepositoryTrait, MockRedemptionRepositoryTrait,
    };
    use crate::token::TokenSigner;
    use chrono::Duration;
    use promo_shared::config::SigningConfig;

    type TestService = RedeemService<
        MockPromotionRepositoryTrait,
        MockPromoTokenRepositoryTrait,
        MockRedemptionRepositoryTrait,
    >;

    /// 构造不触发真实连接的延迟连接池；单元测试路径不会触碰它
    fn lazy_pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost/unused").unwrap()
    }

    fn service_with(
        promotion_repo: MockPromotionRepositoryTrait,
        token_repo: MockPromoTokenRepositoryTrait,
        redemption_repo: MockRedemptionRepositoryTrait,
    ) -> TestService {
        RedeemService::new(
            Arc::new(promotion_repo),
            Arc::new(token_repo),
            Arc::new(redemption_repo),
            TokenVerifier::new(SigningConfig::default()),
            lazy_pool(),
        )
    }

    fn sign_token(token_id: Uuid, promo_id: Uuid, ttl: Duration) -> String {
        let signer = TokenSigner::new(&SigningConfig::default()).unwrap();
        let now = Utc::now();
        signer
            .sign("user-123", promo_id, token_id, "device-abc", now, now + ttl)
            .unwrap()
    }

    fn create_test_token_row(token_id: Uuid, promo_id: Uuid) -> PromoToken {
        let now = Utc::now();
        PromoToken {
            id: token_id,
            user_id: "user-123".to_string(),
            promo_id,
            device_id: "device-abc".to_string(),
            status: TokenStatus::Issued,
            issued_at: now,
            expires_at: now + Duration::seconds(120),
            redeemed_at: None,
        }
    }

    fn create_test_promotion(promo_id: Uuid) -> Promotion {
        Promotion {
            id: promo_id,
            title: "2x1 en Cafetería".to_string(),
            description: None,
            points: 50,
            school_id: None,
            starts_at: None,
            ends_at: None,
            per_user_cap: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_invalid_signature_is_revoked() {
        let service = service_with(
            MockPromotionRepositoryTrait::new(),
            MockPromoTokenRepositoryTrait::new(),
            MockRedemptionRepositoryTrait::new(),
        );

        let response = service.redeem("garbage.token.value", None).await;
        assert_eq!(response.status, RedeemStatus::Revoked);
        assert_eq!(response.reason.as_deref(), Some("invalid token"));
    }

    #[tokio::test]
    async fn test_signature_expired_is_expired_without_store_access() {
        // 存储层 mock 不设置任何期望：验签失败必须在访问存储前短路
        let service = service_with(
            MockPromotionRepositoryTrait::new(),
            MockPromoTokenRepositoryTrait::new(),
            MockRedemptionRepositoryTrait::new(),
        );

        let token = sign_token(Uuid::new_v4(), Uuid::new_v4(), Duration::seconds(-10));
        let response = service.redeem(&token, None).await;

        assert_eq!(response.status, RedeemStatus::Expired);
    }

    #[tokio::test]
    async fn test_unknown_token_id_is_revoked() {
        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo.expect_get_token().returning(|_| Ok(None));

        let service = service_with(
            MockPromotionRepositoryTrait::new(),
            token_repo,
            MockRedemptionRepositoryTrait::new(),
        );

        let token = sign_token(Uuid::new_v4(), Uuid::new_v4(), Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        assert_eq!(response.status, RedeemStatus::Revoked);
        assert_eq!(response.reason.as_deref(), Some("token not found"));
    }

    #[tokio::test]
    async fn test_revoked_status_is_reported_as_revoked() {
        let token_id = Uuid::new_v4();
        let promo_id = Uuid::new_v4();

        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo.expect_get_token().returning(move |_| {
            let mut row = create_test_token_row(token_id, promo_id);
            row.status = TokenStatus::Revoked;
            Ok(Some(row))
        });

        let service = service_with(
            MockPromotionRepositoryTrait::new(),
            token_repo,
            MockRedemptionRepositoryTrait::new(),
        );

        let token = sign_token(token_id, promo_id, Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        assert_eq!(response.status, RedeemStatus::Revoked);
        assert!(response.reason.unwrap().contains("revoked"));
    }

    #[tokio::test]
    async fn test_persisted_expired_status_stays_expired() {
        let token_id = Uuid::new_v4();
        let promo_id = Uuid::new_v4();

        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo.expect_get_token().returning(move |_| {
            let mut row = create_test_token_row(token_id, promo_id);
            row.status = TokenStatus::Expired;
            Ok(Some(row))
        });

        let service = service_with(
            MockPromotionRepositoryTrait::new(),
            token_repo,
            MockRedemptionRepositoryTrait::new(),
        );

        // 已落库的 Expired 状态直接回答 expired，不重算
        let token = sign_token(token_id, promo_id, Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        assert_eq!(response.status, RedeemStatus::Expired);
    }

    #[tokio::test]
    async fn test_redeemed_status_returns_duplicate_with_original_id() {
        let token_id = Uuid::new_v4();
        let promo_id = Uuid::new_v4();
        let redemption_id = Uuid::new_v4();

        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo.expect_get_token().returning(move |_| {
            let mut row = create_test_token_row(token_id, promo_id);
            row.status = TokenStatus::Redeemed;
            row.redeemed_at = Some(Utc::now());
            Ok(Some(row))
        });

        let mut redemption_repo = MockRedemptionRepositoryTrait::new();
        redemption_repo
            .expect_get_by_token_id()
            .returning(move |tid| {
                Ok(Some(Redemption {
                    id: redemption_id,
                    user_id: "user-123".to_string(),
                    promo_id,
                    presenter_id: "system".to_string(),
                    token_id: tid,
                    outcome: RedemptionOutcome::Approved,
                    created_at: Utc::now(),
                }))
            });

        let service = service_with(
            MockPromotionRepositoryTrait::new(),
            token_repo,
            redemption_repo,
        );

        let token = sign_token(token_id, promo_id, Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        // 网络重试安全：重复核销返回原核销记录 ID，无二次副作用
        assert_eq!(response.status, RedeemStatus::Duplicate);
        assert_eq!(response.redemption_id, Some(redemption_id));
    }

    #[tokio::test]
    async fn test_store_expiry_triggers_lazy_transition() {
        let token_id = Uuid::new_v4();
        let promo_id = Uuid::new_v4();

        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo.expect_get_token().returning(move |_| {
            let mut row = create_test_token_row(token_id, promo_id);
            // 签名仍有效，但存储层 expires_at 已过（如 TTL 配置被调短）
            row.expires_at = Utc::now() - Duration::seconds(5);
            Ok(Some(row))
        });
        token_repo
            .expect_mark_expired()
            .times(1)
            .returning(|_| Ok(()));

        let service = service_with(
            MockPromotionRepositoryTrait::new(),
            token_repo,
            MockRedemptionRepositoryTrait::new(),
        );

        let token = sign_token(token_id, promo_id, Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        assert_eq!(response.status, RedeemStatus::Expired);
    }

    #[tokio::test]
    async fn test_window_rechecked_at_redemption_time() {
        let token_id = Uuid::new_v4();
        let promo_id = Uuid::new_v4();

        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo
            .expect_get_token()
            .returning(move |_| Ok(Some(create_test_token_row(token_id, promo_id))));

        // 促销在签发后结束了
        let mut promotion_repo = MockPromotionRepositoryTrait::new();
        promotion_repo.expect_get_promotion().returning(move |_| {
            let mut promotion = create_test_promotion(promo_id);
            promotion.ends_at = Some(Utc::now() - Duration::seconds(1));
            Ok(Some(promotion))
        });

        let service = service_with(
            promotion_repo,
            token_repo,
            MockRedemptionRepositoryTrait::new(),
        );

        let token = sign_token(token_id, promo_id, Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        assert_eq!(response.status, RedeemStatus::Inactive);
        assert!(response.reason.unwrap().contains("ended"));
    }

    #[tokio::test]
    async fn test_cap_reached_is_out_of_cap() {
        let token_id = Uuid::new_v4();
        let promo_id = Uuid::new_v4();

        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo
            .expect_get_token()
            .returning(move |_| Ok(Some(create_test_token_row(token_id, promo_id))));

        let mut promotion_repo = MockPromotionRepositoryTrait::new();
        promotion_repo.expect_get_promotion().returning(move |_| {
            let mut promotion = create_test_promotion(promo_id);
            promotion.per_user_cap = Some(2);
            Ok(Some(promotion))
        });

        let mut redemption_repo = MockRedemptionRepositoryTrait::new();
        redemption_repo.expect_count_approved().returning(|_, _| Ok(2));

        let service = service_with(promotion_repo, token_repo, redemption_repo);

        let token = sign_token(token_id, promo_id, Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        assert_eq!(response.status, RedeemStatus::OutOfCap);
        assert!(response.reason.unwrap().contains('2'));
    }

    #[tokio::test]
    async fn test_existing_redemption_short_circuits_to_duplicate() {
        let token_id = Uuid::new_v4();
        let promo_id = Uuid::new_v4();
        let redemption_id = Uuid::new_v4();

        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo
            .expect_get_token()
            .returning(move |_| Ok(Some(create_test_token_row(token_id, promo_id))));

        let mut promotion_repo = MockPromotionRepositoryTrait::new();
        promotion_repo
            .expect_get_promotion()
            .returning(move |_| Ok(Some(create_test_promotion(promo_id))));

        let mut redemption_repo = MockRedemptionRepositoryTrait::new();
        redemption_repo
            .expect_get_by_token_id()
            .returning(move |tid| {
                Ok(Some(Redemption {
                    id: redemption_id,
                    user_id: "user-123".to_string(),
                    promo_id,
                    presenter_id: "pos-01".to_string(),
                    token_id: tid,
                    outcome: RedemptionOutcome::Approved,
                    created_at: Utc::now(),
                }))
            });

        let service = service_with(promotion_repo, token_repo, redemption_repo);

        let token = sign_token(token_id, promo_id, Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        assert_eq!(response.status, RedeemStatus::Duplicate);
        assert_eq!(response.redemption_id, Some(redemption_id));
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_revoked_without_leaking() {
        let mut token_repo = MockPromoTokenRepositoryTrait::new();
        token_repo
            .expect_get_token()
            .returning(|_| Err(QrError::Database(sqlx::Error::PoolClosed)));

        let service = service_with(
            MockPromotionRepositoryTrait::new(),
            token_repo,
            MockRedemptionRepositoryTrait::new(),
        );

        let token = sign_token(Uuid::new_v4(), Uuid::new_v4(), Duration::seconds(120));
        let response = service.redeem(&token, None).await;

        // 系统故障对外统一为 revoked，且不带内部诊断信息
        assert_eq!(response.status, RedeemStatus::Revoked);
        assert_eq!(response.reason.as_deref(), Some("internal error"));
    }
}
