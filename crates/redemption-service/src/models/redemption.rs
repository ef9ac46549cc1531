//! 兑换记录实体定义
//!
//! 包含兑换记录、兑换明细，以及兑换流程写入前的定价结果

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::RedemptionStatus;
use super::voucher::Voucher;
use crate::error::{RedemptionError, Result};

/// 兑换记录
///
/// 创建后只允许状态流转，total_points_cost 恒等于明细积分之和
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Redemption {
    pub id: i64,
    pub customer_id: i64,
    pub total_points_cost: i64,
    pub status: RedemptionStatus,
    /// 兑换明细（按明细 ID 排序，单独查询填充）
    #[sqlx(skip)]
    #[serde(default)]
    pub items: Vec<RedemptionItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Redemption {
    /// 校验记录的结构不变量
    ///
    /// 明细非空，且总积分等于各明细积分之和
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(RedemptionError::Validation(format!(
                "兑换记录 {} 缺少明细",
                self.id
            )));
        }

        let sum: i64 = self.items.iter().map(|item| item.points_cost).sum();
        if sum != self.total_points_cost {
            return Err(RedemptionError::Validation(format!(
                "兑换记录 {} 总积分 {} 与明细合计 {} 不一致",
                self.id, self.total_points_cost, sum
            )));
        }

        Ok(())
    }

    /// 记录是否已进入终态
    pub fn is_final(&self) -> bool {
        self.status.is_terminal()
    }
}

/// 兑换明细
///
/// points_cost 为兑换时冻结的代金券价格，之后不随目录价格变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RedemptionItem {
    pub id: i64,
    pub redemption_id: i64,
    pub voucher_id: i64,
    pub points_cost: i64,
    pub created_at: DateTime<Utc>,
}

/// 待写入的兑换明细
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRedemptionItem {
    pub voucher_id: i64,
    pub points_cost: i64,
}

/// 待写入的兑换记录
///
/// 由定价阶段产出，在事务内与积分扣减一起落库
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRedemption {
    pub customer_id: i64,
    pub total_points_cost: i64,
    pub items: Vec<NewRedemptionItem>,
}

impl NewRedemption {
    /// 按请求顺序为已校验的代金券定价
    ///
    /// 重复的代金券各自计价；总积分溢出视为参数错误
    pub fn price<'a>(
        customer_id: i64,
        vouchers: impl IntoIterator<Item = &'a Voucher>,
    ) -> Result<Self> {
        let items: Vec<NewRedemptionItem> = vouchers
            .into_iter()
            .map(|voucher| NewRedemptionItem {
                voucher_id: voucher.id,
                points_cost: voucher.points_cost,
            })
            .collect();

        if items.is_empty() {
            return Err(RedemptionError::Validation(
                "至少需要一张代金券".to_string(),
            ));
        }

        let total_points_cost = items
            .iter()
            .try_fold(0i64, |acc, item| acc.checked_add(item.points_cost))
            .ok_or_else(|| RedemptionError::Validation("兑换总积分溢出".to_string()))?;

        Ok(Self {
            customer_id,
            total_points_cost,
            items,
        })
    }

    /// 新记录的初始状态
    pub fn status(&self) -> RedemptionStatus {
        RedemptionStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voucher(id: i64, points_cost: i64) -> Voucher {
        let now = Utc::now();
        Voucher {
            id,
            brand_id: 1,
            code: format!("V-{}", id),
            name: format!("Voucher {}", id),
            description: None,
            points_cost,
            is_active: true,
            valid_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(id: i64, voucher_id: i64, points_cost: i64) -> RedemptionItem {
        RedemptionItem {
            id,
            redemption_id: 1,
            voucher_id,
            points_cost,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_sums_items_in_request_order() {
        let a = voucher(1, 100);
        let b = voucher(2, 200);

        let priced = NewRedemption::price(42, [&a, &b]).unwrap();

        assert_eq!(priced.customer_id, 42);
        assert_eq!(priced.total_points_cost, 300);
        assert_eq!(
            priced.items,
            vec![
                NewRedemptionItem {
                    voucher_id: 1,
                    points_cost: 100
                },
                NewRedemptionItem {
                    voucher_id: 2,
                    points_cost: 200
                },
            ]
        );
        assert_eq!(priced.status(), RedemptionStatus::Pending);
    }

    #[test]
    fn test_price_counts_duplicates_separately() {
        let a = voucher(1, 100);

        let priced = NewRedemption::price(1, [&a, &a]).unwrap();

        assert_eq!(priced.total_points_cost, 200);
        assert_eq!(priced.items.len(), 2);
    }

    #[test]
    fn test_price_rejects_empty_and_overflow() {
        let empty: [&Voucher; 0] = [];
        assert!(matches!(
            NewRedemption::price(1, empty),
            Err(RedemptionError::Validation(_))
        ));

        let huge = voucher(1, i64::MAX);
        assert!(matches!(
            NewRedemption::price(1, [&huge, &huge]),
            Err(RedemptionError::Validation(_))
        ));
    }

    #[test]
    fn test_redemption_validate() {
        let now = Utc::now();
        let mut redemption = Redemption {
            id: 1,
            customer_id: 1,
            total_points_cost: 300,
            status: RedemptionStatus::Pending,
            items: vec![item(1, 1, 100), item(2, 2, 200)],
            created_at: now,
            updated_at: now,
        };
        assert!(redemption.validate().is_ok());
        assert!(!redemption.is_final());

        redemption.total_points_cost = 250;
        assert!(redemption.validate().is_err());

        redemption.items.clear();
        assert!(redemption.validate().is_err());
    }
}
