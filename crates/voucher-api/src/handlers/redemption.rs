//! 兑换 API 处理器
//!
//! 创建兑换、查询兑换记录和客户兑换历史

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::instrument;
use validator::Validate;
use voucher_redemption::Redemption;

use crate::{
    dto::{CreateRedemptionRequest, CreatedResponse, HistoryQuery, IdQuery, parse_id, parse_limit},
    error::Result,
    state::AppState,
};

/// 创建兑换
///
/// POST /transaction/redemption
///
/// 成功返回 201 与新兑换记录 ID；余额不足、代金券失效等业务错误返回 400，
/// 并发冲突在重试耗尽后返回 409
#[instrument(skip(state, payload))]
pub async fn create_redemption(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateRedemptionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let Json(req) = payload?;
    req.validate()?;

    let id = state
        .redemptions
        .redeem(req.customer_id, &req.voucher_ids)
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// 查询兑换记录（含明细）
///
/// GET /transaction/redemption?id=
#[instrument(skip(state))]
pub async fn get_redemption(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Redemption>> {
    let id = parse_id(query.id.as_deref(), "兑换记录")?;
    let redemption = state.queries.get_redemption(id).await?;
    Ok(Json(redemption))
}

/// 查询客户兑换历史（按创建时间倒序，不含明细）
///
/// GET /transaction/redemption/customer?id=&limit=
#[instrument(skip(state))]
pub async fn list_customer_redemptions(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Redemption>>> {
    let customer_id = parse_id(query.id.as_deref(), "客户")?;
    let limit = parse_limit(query.limit.as_deref())?;

    let redemptions = state
        .queries
        .list_customer_redemptions(customer_id, limit)
        .await?;
    Ok(Json(redemptions))
}
