//! API 错误类型定义
//!
//! 将服务层错误映射为 HTTP 状态码与统一的 JSON 错误体

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use voucher_redemption::RedemptionError;

/// API 错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Redemption(#[from] RedemptionError),

    #[error("参数验证失败: {0}")]
    Validation(String),

    /// 查询参数中的 ID 缺失或无法解析
    #[error("无效的{0} ID")]
    InvalidId(&'static str),

    #[error("请求体格式错误: {0}")]
    MalformedBody(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Redemption(err) => match err {
                RedemptionError::CustomerNotFound(_)
                | RedemptionError::VoucherNotFound(_)
                | RedemptionError::RedemptionNotFound(_)
                | RedemptionError::BrandNotFound(_) => StatusCode::NOT_FOUND,

                RedemptionError::VoucherInactive(_)
                | RedemptionError::VoucherExpired(_)
                | RedemptionError::InsufficientPoints { .. }
                | RedemptionError::Validation(_) => StatusCode::BAD_REQUEST,

                // 调用方可以重试整个兑换请求
                RedemptionError::Conflict => StatusCode::CONFLICT,

                RedemptionError::Database(_) | RedemptionError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation(_) | Self::InvalidId(_) | Self::MalformedBody(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Redemption(err) => err.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidId(_) => "INVALID_ID",
            Self::MalformedBody(_) => "MALFORMED_BODY",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Redemption(RedemptionError::Database(e)) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Redemption(RedemptionError::Internal(e)) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 从 JSON 请求体解析失败转换
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

/// API 层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;
