//! QR Token 服务错误类型
//!
//! 定义服务层的业务错误和系统错误。核销流程的业务拒绝不走错误通道——
//! 它们是 RedeemResponse 中的类型化结果，这里只覆盖签发/撤销的业务错误
//! 和真正的系统故障。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// QR Token 服务错误类型
#[derive(Debug, Error)]
pub enum QrError {
    // === 认证与参数错误 ===
    #[error("未授权: {0}")]
    Unauthorized(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 签发相关业务错误 ===
    #[error("促销不存在: {0}")]
    PromotionNotFound(Uuid),

    #[error("促销不在有效期内: promo_id={promo_id}, {reason}")]
    PromotionNotActive { promo_id: Uuid, reason: String },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Token 签名子系统错误: {0}")]
    Signing(String),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, QrError>;

impl QrError {
    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Signing(_)
                | Self::Serialization(_)
                | Self::Internal(_)
                | Self::ConcurrencyConflict
        )
    }

    /// 检查错误是否源于可串行化事务冲突（Postgres 40001）
    ///
    /// 封顶核销在 SERIALIZABLE 事务内执行，冲突时由调用方重试。
    pub fn is_serialization_conflict(&self) -> bool {
        match self {
            Self::ConcurrencyConflict => true,
            Self::Database(sqlx::Error::Database(db)) => db.code().as_deref() == Some("40001"),
            _ => false,
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PromotionNotFound(_) => StatusCode::NOT_FOUND,
            // 窗口外签发是同步拒绝，与原始请求格式无关但属客户端可预期错误
            Self::PromotionNotActive { .. } => StatusCode::BAD_REQUEST,
            Self::Database(_)
            | Self::Signing(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::ConcurrencyConflict => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PromotionNotFound(_) => "PROMOTION_NOT_FOUND",
            Self::PromotionNotActive { .. } => "PROMOTION_NOT_ACTIVE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Signing(_) => "SIGNING_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
        }
    }
}

impl IntoResponse for QrError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露
        let message = if self.is_business_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, code = self.error_code(), "系统错误");
            "服务内部错误，请稍后重试".to_string()
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for QrError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(QrError, StatusCode, &'static str)> {
        vec![
            (
                QrError::Unauthorized("missing bearer token".into()),
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
            ),
            (
                QrError::Validation("x-device-id header is required".into()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                QrError::PromotionNotFound(Uuid::nil()),
                StatusCode::NOT_FOUND,
                "PROMOTION_NOT_FOUND",
            ),
            (
                QrError::PromotionNotActive {
                    promo_id: Uuid::nil(),
                    reason: "promotion has ended".into(),
                },
                StatusCode::BAD_REQUEST,
                "PROMOTION_NOT_ACTIVE",
            ),
            (
                QrError::Signing("bad key".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "SIGNING_ERROR",
            ),
            (
                QrError::Internal("unexpected state".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
            (
                QrError::ConcurrencyConflict,
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONCURRENCY_CONFLICT",
            ),
        ]
    }

    #[test]
    fn test_all_variants_status_and_error_code() {
        for (error, expected_status, expected_code) in all_error_variants() {
            assert_eq!(
                error.status_code(),
                expected_status,
                "状态码不匹配: {expected_code}"
            );
            assert_eq!(error.error_code(), expected_code);
        }
    }

    #[test]
    fn test_is_business_error() {
        assert!(QrError::PromotionNotFound(Uuid::nil()).is_business_error());
        assert!(QrError::Validation("bad".into()).is_business_error());
        assert!(!QrError::Internal("crash".into()).is_business_error());
        assert!(!QrError::ConcurrencyConflict.is_business_error());
        assert!(!QrError::Database(sqlx::Error::RowNotFound).is_business_error());
    }

    #[test]
    fn test_serialization_conflict_detection() {
        assert!(QrError::ConcurrencyConflict.is_serialization_conflict());
        assert!(!QrError::Database(sqlx::Error::RowNotFound).is_serialization_conflict());
        assert!(!QrError::Internal("x".into()).is_serialization_conflict());
    }

    #[tokio::test]
    async fn test_into_response_body_structure() {
        for (error, expected_status, expected_code) in all_error_variants() {
            let label = format!("{:?}", error);
            let response = error.into_response();

            assert_eq!(response.status(), expected_status, "状态码不匹配: {label}");

            let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("读取响应体失败");
            let body: serde_json::Value =
                serde_json::from_slice(&body_bytes).expect("响应体不是合法 JSON");

            assert_eq!(body["success"], json!(false), "{label}");
            assert_eq!(body["code"], json!(expected_code), "{label}");
            assert!(
                !body["message"].as_str().unwrap_or("").is_empty(),
                "message 不应为空: {label}"
            );
            assert!(body["data"].is_null(), "{label}");
        }
    }

    /// 系统级错误的响应消息不应泄露内部细节
    #[tokio::test]
    async fn test_system_errors_hide_internal_details() {
        let error = QrError::Signing("HMAC key file /etc/secrets/qr.key unreadable".into());
        let response = error.into_response();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        let message = body["message"].as_str().unwrap();

        assert!(!message.contains("/etc/secrets"));
        assert!(message.contains("服务内部错误"));
    }

    /// 业务错误的响应消息应保留上下文
    #[tokio::test]
    async fn test_business_errors_preserve_display_message() {
        let promo_id = Uuid::new_v4();
        let error = QrError::PromotionNotFound(promo_id);
        let response = error.into_response();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains(&promo_id.to_string())
        );
    }

    #[test]
    fn test_from_validation_errors() {
        use validator::{ValidationError, ValidationErrors};

        let mut errors = ValidationErrors::new();
        let mut field_error = ValidationError::new("length");
        field_error.message = Some("token is required".into());
        errors.add("token", field_error);

        let err: QrError = errors.into();
        match &err {
            QrError::Validation(msg) => assert!(msg.contains("token")),
            other => panic!("期望 Validation 变体，实际: {:?}", other),
        }
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
