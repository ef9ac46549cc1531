//! 代金券仓储
//!
//! 代金券对兑换服务只读，目录维护由外部服务负责

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::VoucherCatalog;
use crate::error::Result;
use crate::models::{Brand, Voucher};

/// 代金券仓储
pub struct VoucherRepository {
    pool: PgPool,
}

impl VoucherRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 获取单个代金券
    pub async fn get_voucher(&self, id: i64) -> Result<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>(
            r#"
            SELECT id, brand_id, code, name, description, points_cost,
                   is_active, valid_until, created_at, updated_at
            FROM vouchers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    /// 列出所有代金券
    pub async fn list_vouchers(&self) -> Result<Vec<Voucher>> {
        let vouchers = sqlx::query_as::<_, Voucher>(
            r#"
            SELECT id, brand_id, code, name, description, points_cost,
                   is_active, valid_until, created_at, updated_at
            FROM vouchers
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(vouchers)
    }

    /// 列出某品牌下的代金券
    pub async fn list_vouchers_by_brand(&self, brand_id: i64) -> Result<Vec<Voucher>> {
        let vouchers = sqlx::query_as::<_, Voucher>(
            r#"
            SELECT id, brand_id, code, name, description, points_cost,
                   is_active, valid_until, created_at, updated_at
            FROM vouchers
            WHERE brand_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(brand_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(vouchers)
    }

    /// 获取品牌
    pub async fn get_brand(&self, id: i64) -> Result<Option<Brand>> {
        let brand = sqlx::query_as::<_, Brand>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM brands
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(brand)
    }

    /// 列出全部品牌
    pub async fn list_brands(&self) -> Result<Vec<Brand>> {
        let brands = sqlx::query_as::<_, Brand>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM brands
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(brands)
    }
}

#[async_trait]
impl VoucherCatalog for VoucherRepository {
    async fn get_voucher(&self, id: i64) -> Result<Option<Voucher>> {
        self.get_voucher(id).await
    }

    async fn list_vouchers(&self) -> Result<Vec<Voucher>> {
        self.list_vouchers().await
    }

    async fn list_vouchers_by_brand(&self, brand_id: i64) -> Result<Vec<Voucher>> {
        self.list_vouchers_by_brand(brand_id).await
    }

    async fn get_brand(&self, id: i64) -> Result<Option<Brand>> {
        self.get_brand(id).await
    }

    async fn list_brands(&self) -> Result<Vec<Brand>> {
        self.list_brands().await
    }
}
