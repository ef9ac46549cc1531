//! 兑换记录仓储
//!
//! 提供兑换记录与明细的查询，以及事务内的写入

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::traits::RedemptionStore;
use crate::error::{RedemptionError, Result};
use crate::models::{NewRedemption, Redemption, RedemptionItem, RedemptionStatus};

/// 兑换记录仓储
pub struct RedemptionRepository {
    pool: PgPool,
}

impl RedemptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 获取兑换记录及其明细
    pub async fn get_redemption(&self, id: i64) -> Result<Option<Redemption>> {
        let redemption = sqlx::query_as::<_, Redemption>(
            r#"
            SELECT id, customer_id, total_points_cost, status, created_at, updated_at
            FROM redemptions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut redemption) = redemption else {
            return Ok(None);
        };

        redemption.items = self.list_items(id).await?;
        Ok(Some(redemption))
    }

    /// 列出兑换记录的明细
    pub async fn list_items(&self, redemption_id: i64) -> Result<Vec<RedemptionItem>> {
        let items = sqlx::query_as::<_, RedemptionItem>(
            r#"
            SELECT id, redemption_id, voucher_id, points_cost, created_at
            FROM redemption_items
            WHERE redemption_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(redemption_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// 列出客户最近的兑换记录
    pub async fn list_redemptions_by_customer(
        &self,
        customer_id: i64,
        limit: i64,
    ) -> Result<Vec<Redemption>> {
        let redemptions = sqlx::query_as::<_, Redemption>(
            r#"
            SELECT id, customer_id, total_points_cost, status, created_at, updated_at
            FROM redemptions
            WHERE customer_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(redemptions)
    }

    // ==================== 事务操作 ====================

    /// 在事务中创建兑换记录及明细
    ///
    /// 记录以 pending 状态写入，明细价格取定价阶段冻结的值。返回新记录的 ID
    pub async fn create_in_tx(tx: &mut PgConnection, redemption: &NewRedemption) -> Result<i64> {
        let redemption_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO redemptions (customer_id, total_points_cost, status, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(redemption.customer_id)
        .bind(redemption.total_points_cost)
        .bind(RedemptionStatus::Pending)
        .fetch_one(&mut *tx)
        .await
        .map_err(RedemptionError::from_tx_error)?;

        for item in &redemption.items {
            sqlx::query(
                r#"
                INSERT INTO redemption_items (redemption_id, voucher_id, points_cost, created_at)
                VALUES ($1, $2, $3, NOW())
                "#,
            )
            .bind(redemption_id)
            .bind(item.voucher_id)
            .bind(item.points_cost)
            .execute(&mut *tx)
            .await
            .map_err(RedemptionError::from_tx_error)?;
        }

        Ok(redemption_id)
    }
}

#[async_trait]
impl RedemptionStore for RedemptionRepository {
    async fn get_redemption(&self, id: i64) -> Result<Option<Redemption>> {
        self.get_redemption(id).await
    }

    async fn list_redemptions_by_customer(
        &self,
        customer_id: i64,
        limit: i64,
    ) -> Result<Vec<Redemption>> {
        self.list_redemptions_by_customer(customer_id, limit).await
    }
}
