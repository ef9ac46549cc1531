//! 应用状态定义
//!
//! 包含 Axum 路由共享的服务实例

use std::sync::Arc;

use voucher_redemption::{
    CustomerRepository, InMemoryBackend, PgTransactionBoundary, QueryService,
    RedemptionRepository, RedemptionService, VoucherRepository,
};
use voucher_shared::config::RedemptionConfig;
use voucher_shared::database::Database;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub redemptions: Arc<RedemptionService>,
    pub queries: Arc<QueryService>,
    /// 数据库连接（内存后端时为 None），用于就绪检查
    pub database: Option<Database>,
}

impl AppState {
    /// 基于 PostgreSQL 构建
    pub fn from_database(database: Database, config: &RedemptionConfig) -> Self {
        let pool = database.pool().clone();
        let vouchers = Arc::new(VoucherRepository::new(pool.clone()));
        let customers = Arc::new(CustomerRepository::new(pool.clone()));
        let redemptions = Arc::new(RedemptionRepository::new(pool.clone()));
        let boundary = Arc::new(PgTransactionBoundary::new(
            pool,
            config.lock_strategy,
            config.lock_timeout(),
        ));

        let redemption_service =
            RedemptionService::new(vouchers.clone(), customers.clone(), boundary)
                .with_retry_policy(config.retry_policy());
        let query_service = QueryService::new(vouchers, customers, redemptions);

        Self {
            redemptions: Arc::new(redemption_service),
            queries: Arc::new(query_service),
            database: Some(database),
        }
    }

    /// 基于内存后端构建
    pub fn in_memory(backend: InMemoryBackend, config: &RedemptionConfig) -> Self {
        let shared = Arc::new(backend);

        let redemption_service =
            RedemptionService::new(shared.clone(), shared.clone(), shared.clone())
                .with_retry_policy(config.retry_policy());
        let query_service = QueryService::new(shared.clone(), shared.clone(), shared);

        Self {
            redemptions: Arc::new(redemption_service),
            queries: Arc::new(query_service),
            database: None,
        }
    }
}
