//! 事务边界
//!
//! 将“读余额、比较、扣减、写兑换记录”包装为针对单个客户的原子单元。
//!
//! ## 并发控制策略
//!
//! - `Pessimistic`：事务内 `SELECT ... FOR UPDATE` 锁定客户行，锁等待超时归为 `Conflict`
//! - `Optimistic`：不加锁读取余额，扣减时比较交换，被并发修改归为 `Conflict`
//!
//! 两种策略下 `Conflict` 都由编排层重试整个兑换流程。原子单元未提交即被丢弃时，
//! 其中的写入全部作废。

mod postgres;

use async_trait::async_trait;

pub use voucher_shared::config::LockStrategy;

use crate::error::Result;
use crate::models::NewRedemption;

pub use postgres::PgTransactionBoundary;

/// 事务内的客户账户能力
#[async_trait]
pub trait LedgerTx: Send {
    /// 读取事务视角下的当前余额；悲观策略下同时锁定客户
    async fn current_balance(&mut self, customer_id: i64) -> Result<Option<i64>>;

    /// 余额充足时扣减，返回扣减后的余额
    ///
    /// 余额不足返回 `InsufficientPoints`，并发修改返回 `Conflict`
    async fn debit_if_sufficient(&mut self, customer_id: i64, amount: i64) -> Result<i64>;
}

/// 事务内的兑换记录写入能力
#[async_trait]
pub trait StoreTx: Send {
    /// 写入 pending 状态的兑换记录及明细，返回记录 ID
    async fn create_redemption(&mut self, redemption: &NewRedemption) -> Result<i64>;
}

/// 原子单元
///
/// `commit` 之前的写入对其他读者不可见；`rollback` 或直接丢弃会放弃所有写入
#[async_trait]
pub trait AtomicUnit: LedgerTx + StoreTx {
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;
}

/// 事务边界
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionBoundary: Send + Sync {
    /// 开启作用于指定客户的原子单元
    async fn begin(&self, customer_id: i64) -> Result<Box<dyn AtomicUnit>>;

    /// 当前使用的并发控制策略
    fn strategy(&self) -> LockStrategy;
}
