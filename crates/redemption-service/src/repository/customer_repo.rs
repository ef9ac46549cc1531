//! 客户仓储
//!
//! 提供客户查询，以及事务内的余额读取与条件扣减

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::traits::CustomerLedger;
use crate::error::{RedemptionError, Result};
use crate::models::Customer;

/// 客户仓储
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 获取客户
    pub async fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, email, points_balance, created_at, updated_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    // ==================== 事务操作 ====================

    /// 在事务中读取余额并锁定客户行
    ///
    /// 锁等待受事务的 lock_timeout 约束，超时归为 `Conflict`
    pub async fn get_balance_for_update(
        tx: &mut PgConnection,
        customer_id: i64,
    ) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT points_balance
            FROM customers
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(customer_id)
        .fetch_optional(tx)
        .await
        .map_err(RedemptionError::from_tx_error)?;

        Ok(balance)
    }

    /// 在事务中读取余额（不加锁）
    pub async fn get_balance_in_tx(
        tx: &mut PgConnection,
        customer_id: i64,
    ) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT points_balance
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(tx)
        .await
        .map_err(RedemptionError::from_tx_error)?;

        Ok(balance)
    }

    /// 在事务中条件扣减余额
    ///
    /// 余额不足时不更新任何行，返回 None；成功时返回扣减后的余额
    pub async fn debit_in_tx(
        tx: &mut PgConnection,
        customer_id: i64,
        amount: i64,
    ) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE customers
            SET points_balance = points_balance - $2, updated_at = NOW()
            WHERE id = $1 AND points_balance >= $2
            RETURNING points_balance
            "#,
        )
        .bind(customer_id)
        .bind(amount)
        .fetch_optional(tx)
        .await
        .map_err(RedemptionError::from_tx_error)?;

        Ok(balance)
    }

    /// 在事务中以比较交换方式扣减余额
    ///
    /// 只有当前余额仍等于 `expected` 时才更新；返回 None 表示被并发修改
    pub async fn compare_and_debit_in_tx(
        tx: &mut PgConnection,
        customer_id: i64,
        expected: i64,
        amount: i64,
    ) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE customers
            SET points_balance = points_balance - $3, updated_at = NOW()
            WHERE id = $1 AND points_balance = $2 AND points_balance >= $3
            RETURNING points_balance
            "#,
        )
        .bind(customer_id)
        .bind(expected)
        .bind(amount)
        .fetch_optional(tx)
        .await
        .map_err(RedemptionError::from_tx_error)?;

        Ok(balance)
    }
}

#[async_trait]
impl CustomerLedger for CustomerRepository {
    async fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        self.get_customer(id).await
    }
}
