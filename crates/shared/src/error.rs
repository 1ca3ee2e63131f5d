//! 基础设施层错误类型
//!
//! 只覆盖共享组件（配置、数据库、可观测性）的失败场景，
//! 业务错误由各服务自行定义。

use thiserror::Error;

/// 基础设施错误
#[derive(Debug, Error)]
pub enum SharedError {
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("可观测性初始化失败: {0}")]
    Observability(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 基础设施层 Result 类型别名
pub type Result<T> = std::result::Result<T, SharedError>;
