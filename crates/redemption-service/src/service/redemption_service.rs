//! 代金券兑换服务
//!
//! 将 `(customer_id, [voucher_id...])` 转换为一条已定价、已校验、已持久化的兑换记录，
//! 或一个明确的拒绝原因。
//!
//! ## 兑换流程
//!
//! 1. 事务外：加载客户与代金券，逐张校验可兑换性并定价
//! 2. 事务内：重新读取余额，不足则中止；扣减积分并写入 pending 兑换记录
//! 3. 提交；任何一步失败都不留下余额变化或兑换记录
//!
//! 并发冲突（锁等待超时、乐观锁竞争失败）会重试整个 1-3 流程，其余错误直接返回。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::{info, instrument, warn};

use voucher_shared::observability::metrics;
use voucher_shared::retry::{RetryPolicy, retry_with_policy};

use crate::error::{RedemptionError, Result};
use crate::models::{NewRedemption, Voucher, VoucherEligibility, validate_voucher};
use crate::repository::{CustomerLedger, VoucherCatalog};
use crate::transaction::{AtomicUnit, LedgerTx, StoreTx, TransactionBoundary};

/// 兑换服务
pub struct RedemptionService {
    catalog: Arc<dyn VoucherCatalog>,
    ledger: Arc<dyn CustomerLedger>,
    boundary: Arc<dyn TransactionBoundary>,
    retry_policy: RetryPolicy,
}

impl RedemptionService {
    pub fn new(
        catalog: Arc<dyn VoucherCatalog>,
        ledger: Arc<dyn CustomerLedger>,
        boundary: Arc<dyn TransactionBoundary>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            boundary,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// 兑换代金券
    ///
    /// 成功时返回新兑换记录的 ID。重复的代金券 ID 各自计价。
    #[instrument(skip(self, voucher_ids), fields(voucher_count = voucher_ids.len()))]
    pub async fn redeem(&self, customer_id: i64, voucher_ids: &[i64]) -> Result<i64> {
        let started = Instant::now();

        let result = retry_with_policy(
            &self.retry_policy,
            "redeem_vouchers",
            RedemptionError::is_retryable,
            || self.attempt(customer_id, voucher_ids),
        )
        .await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(redemption_id) => {
                metrics::record_redemption("success", elapsed);
                info!(customer_id, redemption_id, "代金券兑换成功");
            }
            Err(err) => {
                metrics::record_redemption(err.error_code(), elapsed);
                if err.is_business_error() {
                    info!(customer_id, code = err.error_code(), error = %err, "兑换被拒绝");
                } else {
                    warn!(customer_id, code = err.error_code(), error = %err, "兑换失败");
                }
            }
        }

        result
    }

    /// 执行一次完整的兑换尝试
    async fn attempt(&self, customer_id: i64, voucher_ids: &[i64]) -> Result<i64> {
        let pending = self.price(customer_id, voucher_ids, Utc::now()).await?;

        let result = self.apply(pending).await;
        if matches!(result, Err(RedemptionError::Conflict)) {
            metrics::record_redemption_conflict(self.boundary.strategy().as_str());
        }
        result
    }

    /// 加载并校验客户与代金券，按请求顺序定价
    ///
    /// 代金券按去重后的 ID 并发加载；校验按请求顺序进行，报告第一个失败的代金券
    async fn price(
        &self,
        customer_id: i64,
        voucher_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<NewRedemption> {
        if voucher_ids.is_empty() {
            return Err(RedemptionError::Validation(
                "至少需要一张代金券".to_string(),
            ));
        }

        self.ledger
            .get_customer(customer_id)
            .await?
            .ok_or(RedemptionError::CustomerNotFound(customer_id))?;

        let mut seen = HashSet::with_capacity(voucher_ids.len());
        let unique_ids: Vec<i64> = voucher_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let fetched = try_join_all(unique_ids.iter().map(|id| self.catalog.get_voucher(*id))).await?;
        let vouchers: HashMap<i64, Voucher> = unique_ids
            .into_iter()
            .zip(fetched)
            .filter_map(|(id, voucher)| voucher.map(|v| (id, v)))
            .collect();

        let mut selected = Vec::with_capacity(voucher_ids.len());
        for id in voucher_ids {
            let voucher = vouchers
                .get(id)
                .ok_or(RedemptionError::VoucherNotFound(*id))?;
            match validate_voucher(voucher, now) {
                VoucherEligibility::Ok => selected.push(voucher),
                VoucherEligibility::Inactive => return Err(RedemptionError::VoucherInactive(*id)),
                VoucherEligibility::Expired => return Err(RedemptionError::VoucherExpired(*id)),
            }
        }

        NewRedemption::price(customer_id, selected)
    }

    /// 在事务边界内应用兑换
    ///
    /// 原子阶段在独立任务中执行，调用方放弃请求后仍会走到提交或回滚
    async fn apply(&self, pending: NewRedemption) -> Result<i64> {
        let boundary = Arc::clone(&self.boundary);
        tokio::spawn(async move { run_atomic(boundary.as_ref(), &pending).await })
            .await
            .map_err(|e| RedemptionError::Internal(format!("兑换事务任务异常终止: {}", e)))?
    }
}

async fn run_atomic(boundary: &dyn TransactionBoundary, pending: &NewRedemption) -> Result<i64> {
    let mut unit = boundary.begin(pending.customer_id).await?;

    match apply_in_unit(unit.as_mut(), pending).await {
        Ok(redemption_id) => {
            unit.commit().await?;
            metrics::record_points_debited(pending.total_points_cost);
            Ok(redemption_id)
        }
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                warn!(
                    customer_id = pending.customer_id,
                    error = %rollback_err,
                    "兑换事务回滚失败"
                );
            }
            Err(err)
        }
    }
}

async fn apply_in_unit(unit: &mut dyn AtomicUnit, pending: &NewRedemption) -> Result<i64> {
    let balance = unit
        .current_balance(pending.customer_id)
        .await?
        .ok_or(RedemptionError::CustomerNotFound(pending.customer_id))?;

    if balance < pending.total_points_cost {
        return Err(RedemptionError::InsufficientPoints {
            required: pending.total_points_cost,
            available: balance,
        });
    }

    unit.debit_if_sufficient(pending.customer_id, pending.total_points_cost)
        .await?;
    unit.create_redemption(pending).await
}
