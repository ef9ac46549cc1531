//! 品牌与代金券实体
//!
//! 代金券对兑换流程只读；可兑换性校验是纯函数，评估时刻由调用方传入。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 品牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Brand {
    pub id: i64,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 代金券
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Voucher {
    pub id: i64,
    pub brand_id: i64,
    pub code: String,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 兑换所需积分，恒大于 0
    pub points_cost: i64,
    pub is_active: bool,
    /// 有效期截止时间（None 表示长期有效）
    #[sqlx(default)]
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 代金券可兑换性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoucherEligibility {
    Ok,
    Inactive,
    Expired,
}

impl VoucherEligibility {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// 校验代金券在 `now` 时刻是否可兑换
///
/// 未启用优先于过期判断；valid_until 恰好等于 now 视为仍有效。
pub fn validate_voucher(voucher: &Voucher, now: DateTime<Utc>) -> VoucherEligibility {
    if !voucher.is_active {
        return VoucherEligibility::Inactive;
    }

    match voucher.valid_until {
        Some(valid_until) if valid_until < now => VoucherEligibility::Expired,
        _ => VoucherEligibility::Ok,
    }
}

impl Voucher {
    pub fn eligibility(&self, now: DateTime<Utc>) -> VoucherEligibility {
        validate_voucher(self, now)
    }
}
