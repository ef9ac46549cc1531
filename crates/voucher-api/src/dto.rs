//! 请求与响应 DTO
//!
//! 字段使用 snake_case，与既有客户端保持一致

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::ApiError;

/// 创建兑换请求
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRedemptionRequest {
    #[validate(range(min = 1, message = "客户ID必须为正数"))]
    pub customer_id: i64,
    #[validate(
        length(min = 1, message = "至少需要一张代金券"),
        custom(function = "validate_positive_ids")
    )]
    pub voucher_ids: Vec<i64>,
}

#[allow(clippy::ptr_arg)]
fn validate_positive_ids(ids: &Vec<i64>) -> Result<(), ValidationError> {
    if ids.iter().all(|id| *id > 0) {
        Ok(())
    } else {
        let mut err = ValidationError::new("positive_ids");
        err.message = Some("代金券ID必须为正数".into());
        Err(err)
    }
}

/// 创建成功响应
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

/// 按 ID 查询参数
///
/// 以字符串接收，解析失败时返回统一的 400 错误体
#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

/// 客户兑换历史查询参数
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub id: Option<String>,
    pub limit: Option<String>,
}

/// 解析正整数 ID
pub fn parse_id(raw: Option<&str>, entity: &'static str) -> Result<i64, ApiError> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or(ApiError::InvalidId(entity))
}

/// 解析可选的 limit 参数
pub fn parse_limit(raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("无效的 limit: {}", s))),
    }
}
