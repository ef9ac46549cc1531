//! PostgreSQL 兑换集成测试
//!
//! 验证行级锁与条件更新在真实数据库上的行为。
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... \
//!   cargo test -p voucher-redemption --test postgres_redemption_test -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use voucher_redemption::{
    CustomerRepository, LockStrategy, PgTransactionBoundary, QueryService, RedemptionError,
    RedemptionRepository, RedemptionService, VoucherRepository,
};
use voucher_shared::config::DatabaseConfig;
use voucher_shared::database::Database;
use voucher_shared::retry::RetryPolicy;

// ==================== 辅助函数 ====================

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests")
}

async fn setup_pool() -> PgPool {
    let config = DatabaseConfig {
        url: database_url(),
        ..Default::default()
    };
    let db = Database::connect(&config).await.expect("数据库连接失败");
    db.run_migrations().await.expect("数据库迁移失败");
    db.pool().clone()
}

fn services(pool: &PgPool, strategy: LockStrategy) -> (Arc<RedemptionService>, QueryService) {
    let vouchers = Arc::new(VoucherRepository::new(pool.clone()));
    let customers = Arc::new(CustomerRepository::new(pool.clone()));
    let redemptions = Arc::new(RedemptionRepository::new(pool.clone()));
    let boundary = Arc::new(PgTransactionBoundary::new(
        pool.clone(),
        strategy,
        Duration::from_millis(500),
    ));

    let redemption_service =
        RedemptionService::new(vouchers.clone(), customers.clone(), boundary).with_retry_policy(
            RetryPolicy::new(5, Duration::from_millis(5), Duration::from_millis(50)),
        );
    let query_service = QueryService::new(vouchers, customers, redemptions);

    (Arc::new(redemption_service), query_service)
}

async fn seed_customer(pool: &PgPool, points_balance: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO customers (name, email, points_balance)
        VALUES ('Integration', 'integration-' || gen_random_uuid() || '@example.com', $1)
        RETURNING id
        "#,
    )
    .bind(points_balance)
    .fetch_one(pool)
    .await
    .expect("插入测试客户失败")
}

async fn seed_voucher(pool: &PgPool, points_cost: i64) -> i64 {
    let brand_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO brands (name) VALUES ('Integration Brand') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("插入测试品牌失败");

    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO vouchers (brand_id, code, name, points_cost, is_active)
        VALUES ($1, 'IT-' || gen_random_uuid(), 'Integration Voucher', $2, true)
        RETURNING id
        "#,
    )
    .bind(brand_id)
    .bind(points_cost)
    .fetch_one(pool)
    .await
    .expect("插入测试代金券失败")
}

async fn balance(pool: &PgPool, customer_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT points_balance FROM customers WHERE id = $1")
        .bind(customer_id)
        .fetch_one(pool)
        .await
        .expect("查询余额失败")
}

async fn redemption_count(pool: &PgPool, customer_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM redemptions WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_one(pool)
        .await
        .expect("查询兑换记录失败")
}

// ==================== 测试 ====================

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_redeem_persists_record_and_debit() {
    let pool = setup_pool().await;
    let (redemptions, queries) = services(&pool, LockStrategy::Pessimistic);
    let customer = seed_customer(&pool, 1_000).await;
    let a = seed_voucher(&pool, 100).await;
    let b = seed_voucher(&pool, 200).await;

    let id = redemptions.redeem(customer, &[a, b]).await.unwrap();

    assert_eq!(balance(&pool, customer).await, 700);
    let redemption = queries.get_redemption(id).await.unwrap();
    assert_eq!(redemption.total_points_cost, 300);
    assert_eq!(redemption.items.len(), 2);
    assert!(redemption.validate().is_ok());
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_insufficient_points_writes_nothing() {
    let pool = setup_pool().await;
    let (redemptions, _) = services(&pool, LockStrategy::Pessimistic);
    let customer = seed_customer(&pool, 50).await;
    let voucher = seed_voucher(&pool, 100).await;

    let err = redemptions.redeem(customer, &[voucher]).await.unwrap_err();

    assert!(matches!(err, RedemptionError::InsufficientPoints { .. }));
    assert_eq!(balance(&pool, customer).await, 50);
    assert_eq!(redemption_count(&pool, customer).await, 0);
}

async fn concurrent_race(strategy: LockStrategy) {
    let pool = setup_pool().await;
    let (redemptions, _) = services(&pool, strategy);
    let customer = seed_customer(&pool, 150).await;
    let voucher = seed_voucher(&pool, 100).await;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let svc = Arc::clone(&redemptions);
            tokio::spawn(async move { svc.redeem(customer, &[voucher]).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(balance(&pool, customer).await, 50);
    assert_eq!(redemption_count(&pool, customer).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // 需要数据库连接
async fn test_concurrent_race_pessimistic() {
    concurrent_race(LockStrategy::Pessimistic).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // 需要数据库连接
async fn test_concurrent_race_optimistic() {
    concurrent_race(LockStrategy::Optimistic).await;
}
