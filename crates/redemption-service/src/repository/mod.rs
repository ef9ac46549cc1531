//! 数据访问层
//!
//! 兑换流程依赖三个窄接口：代金券目录、客户账户、兑换记录存储。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 池上的方法只读；事务内写入以 `*_in_tx` 关联函数提供，由事务边界调用
//! - 内存实现与 PostgreSQL 实现共享同一组 trait，便于并发测试

mod customer_repo;
mod memory;
mod redemption_repo;
mod traits;
mod voucher_repo;

pub use customer_repo::CustomerRepository;
pub use memory::InMemoryBackend;
pub use redemption_repo::RedemptionRepository;
pub use traits::*;
pub use voucher_repo::VoucherRepository;
