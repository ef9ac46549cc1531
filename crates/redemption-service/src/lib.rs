//! 积分兑换代金券服务
//!
//! 将客户积分兑换为一张或多张代金券，并保证积分扣减与兑换记录同时生效或同时不生效，
//! 同一客户的并发兑换不会使余额变为负数。
//!
//! ## 模块结构
//!
//! - `models`: 领域模型与代金券校验
//! - `error`: 错误类型定义
//! - `repository`: 代金券目录、客户账户、兑换记录存储（PostgreSQL 与内存实现）
//! - `transaction`: 事务边界（悲观锁 / 乐观锁）
//! - `service`: 兑换编排与只读查询

pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod transaction;

pub use error::{RedemptionError, Result};
pub use models::*;
pub use repository::{
    CustomerLedger, CustomerRepository, InMemoryBackend, RedemptionRepository, RedemptionStore,
    VoucherCatalog, VoucherRepository,
};
pub use service::{QueryService, RedemptionService};
pub use transaction::{
    AtomicUnit, LedgerTx, LockStrategy, PgTransactionBoundary, StoreTx, TransactionBoundary,
};
