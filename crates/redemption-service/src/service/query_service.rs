//! 只读查询服务
//!
//! 兑换记录、代金券、品牌与客户的查询。查询结果允许略有滞后，
//! 任何写入都必须经过 `RedemptionService`。

use std::sync::Arc;

use tracing::instrument;

use crate::error::{RedemptionError, Result};
use crate::models::{Brand, Customer, Redemption, Voucher};
use crate::repository::{CustomerLedger, RedemptionStore, VoucherCatalog};

/// 客户兑换历史默认条数
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
/// 客户兑换历史最大条数
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// 查询服务
pub struct QueryService {
    catalog: Arc<dyn VoucherCatalog>,
    ledger: Arc<dyn CustomerLedger>,
    store: Arc<dyn RedemptionStore>,
}

impl QueryService {
    pub fn new(
        catalog: Arc<dyn VoucherCatalog>,
        ledger: Arc<dyn CustomerLedger>,
        store: Arc<dyn RedemptionStore>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            store,
        }
    }

    /// 获取兑换记录（包含明细）
    #[instrument(skip(self))]
    pub async fn get_redemption(&self, id: i64) -> Result<Redemption> {
        self.store
            .get_redemption(id)
            .await?
            .ok_or(RedemptionError::RedemptionNotFound(id))
    }

    /// 列出客户最近的兑换记录
    ///
    /// limit 缺省为 20，并限制在 1..=100
    #[instrument(skip(self))]
    pub async fn list_customer_redemptions(
        &self,
        customer_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Redemption>> {
        self.ledger
            .get_customer(customer_id)
            .await?
            .ok_or(RedemptionError::CustomerNotFound(customer_id))?;

        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        self.store
            .list_redemptions_by_customer(customer_id, limit)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_voucher(&self, id: i64) -> Result<Voucher> {
        self.catalog
            .get_voucher(id)
            .await?
            .ok_or(RedemptionError::VoucherNotFound(id))
    }

    pub async fn list_vouchers(&self) -> Result<Vec<Voucher>> {
        self.catalog.list_vouchers().await
    }

    /// 列出品牌下的代金券；品牌不存在时返回空列表
    pub async fn list_vouchers_by_brand(&self, brand_id: i64) -> Result<Vec<Voucher>> {
        self.catalog.list_vouchers_by_brand(brand_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_brand(&self, id: i64) -> Result<Brand> {
        self.catalog
            .get_brand(id)
            .await?
            .ok_or(RedemptionError::BrandNotFound(id))
    }

    /// 列出全部品牌
    pub async fn list_brands(&self) -> Result<Vec<Brand>> {
        self.catalog.list_brands().await
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: i64) -> Result<Customer> {
        self.ledger
            .get_customer(id)
            .await?
            .ok_or(RedemptionError::CustomerNotFound(id))
    }
}
