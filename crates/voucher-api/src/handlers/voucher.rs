//! 代金券与品牌只读查询处理器

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use tracing::instrument;
use voucher_redemption::Voucher;

use crate::{
    dto::{IdQuery, parse_id},
    error::Result,
    state::AppState,
};

/// 查询单张代金券，未带 id 时返回全部代金券
///
/// GET /voucher?id=
#[instrument(skip(state))]
pub async fn get_or_list_vouchers(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Response> {
    match query.id.as_deref() {
        None => {
            let vouchers = state.queries.list_vouchers().await?;
            Ok(Json(vouchers).into_response())
        }
        raw => {
            let id = parse_id(raw, "代金券")?;
            let voucher = state.queries.get_voucher(id).await?;
            Ok(Json(voucher).into_response())
        }
    }
}

/// 查询品牌下的代金券
///
/// GET /voucher/brand?id=
///
/// 品牌不存在时返回空列表
#[instrument(skip(state))]
pub async fn list_vouchers_by_brand(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<Voucher>>> {
    let brand_id = parse_id(query.id.as_deref(), "品牌")?;
    let vouchers = state.queries.list_vouchers_by_brand(brand_id).await?;
    Ok(Json(vouchers))
}

/// 查询单个品牌，未带 id 时返回全部品牌
///
/// GET /brand?id=
#[instrument(skip(state))]
pub async fn get_or_list_brands(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Response> {
    match query.id.as_deref() {
        None => {
            let brands = state.queries.list_brands().await?;
            Ok(Json(brands).into_response())
        }
        raw => {
            let id = parse_id(raw, "品牌")?;
            let brand = state.queries.get_brand(id).await?;
            Ok(Json(brand).into_response())
        }
    }
}
