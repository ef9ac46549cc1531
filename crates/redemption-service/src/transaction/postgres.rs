//! PostgreSQL 事务边界
//!
//! 每个原子单元持有一个数据库事务；未提交即被丢弃时由 sqlx 自动回滚

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use super::{AtomicUnit, LedgerTx, LockStrategy, StoreTx, TransactionBoundary};
use crate::error::{RedemptionError, Result};
use crate::models::NewRedemption;
use crate::repository::{CustomerRepository, RedemptionRepository};

/// 基于 PostgreSQL 事务的事务边界
pub struct PgTransactionBoundary {
    pool: PgPool,
    strategy: LockStrategy,
    lock_timeout: Duration,
}

/// PostgreSQL 中 lock_timeout = 0 表示不限时等待，最小取 1ms
const MIN_LOCK_TIMEOUT: Duration = Duration::from_millis(1);

impl PgTransactionBoundary {
    pub fn new(pool: PgPool, strategy: LockStrategy, lock_timeout: Duration) -> Self {
        Self {
            pool,
            strategy,
            lock_timeout: lock_timeout.max(MIN_LOCK_TIMEOUT),
        }
    }
}

/// 构造事务级锁等待上限语句
///
/// SET 不支持参数绑定，毫秒值来自配置；向上取整避免亚毫秒值变为 0
fn lock_timeout_statement(lock_timeout: Duration) -> String {
    let millis = lock_timeout
        .as_micros()
        .div_ceil(1_000)
        .max(MIN_LOCK_TIMEOUT.as_millis());
    format!("SET LOCAL lock_timeout = '{}ms'", millis)
}

#[async_trait]
impl TransactionBoundary for PgTransactionBoundary {
    #[instrument(skip(self), fields(customer_id, strategy = self.strategy.as_str()))]
    async fn begin(&self, customer_id: i64) -> Result<Box<dyn AtomicUnit>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(RedemptionError::from_tx_error)?;

        // 两种策略都会等待行锁：悲观策略的 FOR UPDATE 与乐观策略的条件 UPDATE
        sqlx::query(&lock_timeout_statement(self.lock_timeout))
            .execute(&mut *tx)
            .await
            .map_err(RedemptionError::from_tx_error)?;

        debug!(customer_id, "数据库事务已开启");

        Ok(Box::new(PgAtomicUnit {
            tx: Some(tx),
            strategy: self.strategy,
            observed_balance: None,
        }))
    }

    fn strategy(&self) -> LockStrategy {
        self.strategy
    }
}

/// PostgreSQL 原子单元
struct PgAtomicUnit {
    tx: Option<Transaction<'static, Postgres>>,
    strategy: LockStrategy,
    /// 本单元内最近一次读到的余额，乐观策略以此作为版本
    observed_balance: Option<i64>,
}

impl PgAtomicUnit {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| RedemptionError::Internal("事务已结束".to_string()))
    }

    fn take_tx(&mut self) -> Result<Transaction<'static, Postgres>> {
        self.tx
            .take()
            .ok_or_else(|| RedemptionError::Internal("事务已结束".to_string()))
    }
}

#[async_trait]
impl LedgerTx for PgAtomicUnit {
    async fn current_balance(&mut self, customer_id: i64) -> Result<Option<i64>> {
        let strategy = self.strategy;
        let conn = self.conn()?;
        let balance = match strategy {
            LockStrategy::Pessimistic => {
                CustomerRepository::get_balance_for_update(conn, customer_id).await?
            }
            LockStrategy::Optimistic => {
                CustomerRepository::get_balance_in_tx(conn, customer_id).await?
            }
        };

        self.observed_balance = balance;
        Ok(balance)
    }

    async fn debit_if_sufficient(&mut self, customer_id: i64, amount: i64) -> Result<i64> {
        let observed = match self.observed_balance {
            Some(balance) => balance,
            None => self
                .current_balance(customer_id)
                .await?
                .ok_or(RedemptionError::CustomerNotFound(customer_id))?,
        };

        let strategy = self.strategy;
        let conn = self.conn()?;
        let updated = match strategy {
            LockStrategy::Pessimistic => {
                CustomerRepository::debit_in_tx(conn, customer_id, amount).await?
            }
            LockStrategy::Optimistic => {
                if observed < amount {
                    return Err(RedemptionError::InsufficientPoints {
                        required: amount,
                        available: observed,
                    });
                }
                let updated =
                    CustomerRepository::compare_and_debit_in_tx(conn, customer_id, observed, amount)
                        .await?;
                if updated.is_none() {
                    return Err(RedemptionError::Conflict);
                }
                updated
            }
        };

        match updated {
            Some(balance) => {
                self.observed_balance = Some(balance);
                Ok(balance)
            }
            None => Err(RedemptionError::InsufficientPoints {
                required: amount,
                available: observed,
            }),
        }
    }
}

#[async_trait]
impl StoreTx for PgAtomicUnit {
    async fn create_redemption(&mut self, redemption: &NewRedemption) -> Result<i64> {
        let conn = self.conn()?;
        RedemptionRepository::create_in_tx(conn, redemption).await
    }
}

#[async_trait]
impl AtomicUnit for PgAtomicUnit {
    async fn commit(&mut self) -> Result<()> {
        self.take_tx()?
            .commit()
            .await
            .map_err(RedemptionError::from_tx_error)
    }

    async fn rollback(&mut self) -> Result<()> {
        self.take_tx()?
            .rollback()
            .await
            .map_err(RedemptionError::from_tx_error)
    }
}
