//! 仓储 Trait 定义
//!
//! 每个职责一个接口，服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Brand, Customer, Redemption, Voucher};

/// 代金券目录（只读）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoucherCatalog: Send + Sync {
    async fn get_voucher(&self, id: i64) -> Result<Option<Voucher>>;
    async fn list_vouchers(&self) -> Result<Vec<Voucher>>;
    async fn list_vouchers_by_brand(&self, brand_id: i64) -> Result<Vec<Voucher>>;
    async fn get_brand(&self, id: i64) -> Result<Option<Brand>>;
    async fn list_brands(&self) -> Result<Vec<Brand>>;
}

/// 客户账户
///
/// 余额扣减只能在事务边界内通过 `LedgerTx` 完成
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerLedger: Send + Sync {
    async fn get_customer(&self, id: i64) -> Result<Option<Customer>>;
}

/// 兑换记录存储（读侧）
///
/// 新记录只能在事务边界内通过 `StoreTx` 写入
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionStore: Send + Sync {
    /// 获取兑换记录（包含按 ID 排序的明细）
    async fn get_redemption(&self, id: i64) -> Result<Option<Redemption>>;
    /// 列出客户最近的兑换记录（按创建时间倒序，不含明细）
    async fn list_redemptions_by_customer(
        &self,
        customer_id: i64,
        limit: i64,
    ) -> Result<Vec<Redemption>>;
}
