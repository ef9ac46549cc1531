//! 服务层
//!
//! ## 模块结构
//!
//! - `redemption_service`: 兑换编排（唯一的写入路径）
//! - `query_service`: 只读查询

pub mod query_service;
pub mod redemption_service;

pub use query_service::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT, QueryService};
pub use redemption_service::RedemptionService;
