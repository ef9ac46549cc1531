//! 兑换服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use thiserror::Error;

/// 兑换服务错误类型
#[derive(Debug, Error)]
pub enum RedemptionError {
    // === 资源不存在 ===
    #[error("客户不存在: {0}")]
    CustomerNotFound(i64),

    #[error("代金券不存在: {0}")]
    VoucherNotFound(i64),

    #[error("兑换记录不存在: {0}")]
    RedemptionNotFound(i64),

    #[error("品牌不存在: {0}")]
    BrandNotFound(i64),

    // === 代金券校验 ===
    #[error("代金券未启用: {0}")]
    VoucherInactive(i64),

    #[error("代金券已过期: {0}")]
    VoucherExpired(i64),

    // === 积分 ===
    #[error("积分不足: 需要 {required}, 可用 {available}")]
    InsufficientPoints { required: i64, available: i64 },

    // === 系统错误 ===
    #[error("并发冲突，请重试")]
    Conflict,

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 兑换服务 Result 类型别名
pub type Result<T> = std::result::Result<T, RedemptionError>;

/// PostgreSQL 中表示锁竞争的 SQLSTATE
///
/// - 55P03 lock_not_available（lock_timeout / NOWAIT）
/// - 40001 serialization_failure
/// - 40P01 deadlock_detected
const CONTENTION_SQLSTATES: [&str; 3] = ["55P03", "40001", "40P01"];

impl RedemptionError {
    /// 检查是否为可重试的错误
    ///
    /// 只有锁竞争类错误可以通过重试整个兑换流程恢复；
    /// 校验失败重试不会改变结果，持久化失败需要暴露给调用方。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict)
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Conflict
        )
    }

    /// 是否为资源不存在类错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CustomerNotFound(_)
                | Self::VoucherNotFound(_)
                | Self::RedemptionNotFound(_)
                | Self::BrandNotFound(_)
        )
    }

    /// 获取错误码（用于 API 响应与指标标签）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::VoucherNotFound(_) => "VOUCHER_NOT_FOUND",
            Self::RedemptionNotFound(_) => "REDEMPTION_NOT_FOUND",
            Self::BrandNotFound(_) => "BRAND_NOT_FOUND",
            Self::VoucherInactive(_) => "VOUCHER_INACTIVE",
            Self::VoucherExpired(_) => "VOUCHER_EXPIRED",
            Self::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            Self::Conflict => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "PERSISTENCE_FAILURE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 将事务内的 sqlx 错误归类
    ///
    /// 锁等待超时、死锁、序列化失败归为 `Conflict`，其余保持为持久化错误。
    pub fn from_tx_error(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let is_contention = db_err
                .code()
                .is_some_and(|code| CONTENTION_SQLSTATES.iter().any(|c| *c == code));
            if is_contention {
                return Self::Conflict;
            }
        }
        Self::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(RedemptionError::Conflict.is_retryable());
        assert!(!RedemptionError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!RedemptionError::VoucherExpired(1).is_retryable());
        assert!(
            !RedemptionError::InsufficientPoints {
                required: 100,
                available: 50
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_is_business_error() {
        assert!(RedemptionError::CustomerNotFound(1).is_business_error());
        assert!(RedemptionError::VoucherInactive(1).is_business_error());
        assert!(!RedemptionError::Internal("panic".to_string()).is_business_error());
        assert!(!RedemptionError::Conflict.is_business_error());
    }

    #[test]
    fn test_error_code() {
        assert_eq!(
            RedemptionError::VoucherNotFound(1).error_code(),
            "VOUCHER_NOT_FOUND"
        );
        assert_eq!(
            RedemptionError::InsufficientPoints {
                required: 100,
                available: 50
            }
            .error_code(),
            "INSUFFICIENT_POINTS"
        );
        assert_eq!(
            RedemptionError::Database(sqlx::Error::RowNotFound).error_code(),
            "PERSISTENCE_FAILURE"
        );
    }

    #[test]
    fn test_non_database_tx_error_stays_persistence_failure() {
        let err = RedemptionError::from_tx_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, RedemptionError::Database(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RedemptionError::InsufficientPoints {
            required: 150,
            available: 40,
        };
        assert!(err.to_string().contains("150"));
        assert!(err.to_string().contains("40"));
        assert!(RedemptionError::is_not_found(&RedemptionError::RedemptionNotFound(9)));
    }
}
