//! 数据库连接管理模块
//!
//! 封装 PostgreSQL 连接池的创建与迁移执行。
//! 服务启动时 connect + run_migrations 一次完成，之后各组件只持有 PgPool。

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// 数据库连接池包装
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 创建数据库连接池
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(Self { pool })
    }

    /// 获取连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 执行迁移
    ///
    /// Migrator 由服务侧的 `sqlx::migrate!` 提供，迁移文件跟服务走，
    /// 共享层只负责执行。
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<()> {
        migrator.run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}
