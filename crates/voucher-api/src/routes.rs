//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射与中间件栈

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use voucher_shared::observability::middleware as obs_middleware;

use crate::{handlers, state::AppState};

/// 兑换相关路由
pub fn redemption_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transaction/redemption",
            post(handlers::redemption::create_redemption)
                .get(handlers::redemption::get_redemption),
        )
        .route(
            "/transaction/redemption/customer",
            get(handlers::redemption::list_customer_redemptions),
        )
}

/// 代金券与品牌只读路由
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/voucher", get(handlers::voucher::get_or_list_vouchers))
        .route(
            "/voucher/brand",
            get(handlers::voucher::list_vouchers_by_brand),
        )
        .route("/brand", get(handlers::voucher::get_or_list_brands))
}

/// 构建完整应用
///
/// 中间件由外到内：request_id → http_tracing → TraceLayer → TimeoutLayer
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(redemption_routes())
        .merge(catalog_routes())
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
