//! 代金券兑换 HTTP 服务
//!
//! 对外提供兑换与只读查询的 REST API。
//!
//! ## 模块结构
//!
//! - `dto`: 请求与响应结构
//! - `error`: API 错误与 HTTP 状态映射
//! - `handlers`: 请求处理器
//! - `routes`: 路由与中间件装配
//! - `state`: 共享应用状态

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
