//! 积分与兑换数据所在的 PostgreSQL 连接池
//!
//! 服务启动时建立连接池，按配置执行 migrations/ 下的建表脚本，
//! 就绪探针通过 `health_check` 确认数据库可达。

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::Postgres;
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// 共享的 PostgreSQL 连接池，克隆成本低
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// 由配置生成连接池参数
fn pool_options(config: &DatabaseConfig) -> PoolOptions<Postgres> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
}

impl Database {
    /// 按配置建立连接池
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = pool_options(config).connect(&config.url).await?;
        info!("PostgreSQL 连接池已建立");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 执行一次轻量查询确认数据库可达
    pub async fn health_check(&self) -> Result<()> {
        if let Err(e) = sqlx::query("SELECT 1").execute(&self.pool).await {
            warn!(error = %e, "数据库健康检查失败");
            return Err(e.into());
        }
        Ok(())
    }

    /// 等待借出的连接归还后关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL 连接池已关闭");
    }

    /// 应用 migrations/ 下尚未执行的建表脚本
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("数据库迁移完成");
        Ok(())
    }
}
