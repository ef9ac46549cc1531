//! 内存后端
//!
//! 同时实现代金券目录、客户账户、兑换记录存储与事务边界，
//! 每个实例是一份独立的数据，适合并发场景测试与本地演示。
//!
//! 原子单元内的写入先暂存，提交时在写锁内一次性生效；
//! 悲观策略按客户持有异步互斥锁，乐观策略在提交时比较余额。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::traits::{CustomerLedger, RedemptionStore, VoucherCatalog};
use crate::error::{RedemptionError, Result};
use crate::models::{
    Brand, Customer, NewRedemption, Redemption, RedemptionItem, RedemptionStatus, Voucher,
};
use crate::transaction::{AtomicUnit, LedgerTx, LockStrategy, StoreTx, TransactionBoundary};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct MemoryState {
    brands: BTreeMap<i64, Brand>,
    vouchers: BTreeMap<i64, Voucher>,
    customers: HashMap<i64, Customer>,
    redemptions: BTreeMap<i64, Redemption>,
}

struct Inner {
    state: RwLock<MemoryState>,
    customer_locks: DashMap<i64, Arc<Mutex<()>>>,
    next_entity_id: AtomicI64,
    next_redemption_id: AtomicI64,
    next_item_id: AtomicI64,
    strategy: LockStrategy,
    lock_timeout: Duration,
    fail_next_insert: AtomicBool,
}

/// 内存后端
///
/// 克隆后共享同一份数据
#[derive(Clone)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(LockStrategy::Pessimistic, DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryBackend {
    pub fn new(strategy: LockStrategy, lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(MemoryState::default()),
                customer_locks: DashMap::new(),
                next_entity_id: AtomicI64::new(1),
                next_redemption_id: AtomicI64::new(1),
                next_item_id: AtomicI64::new(1),
                strategy,
                lock_timeout,
                fail_next_insert: AtomicBool::new(false),
            }),
        }
    }

    fn next_entity_id(&self) -> i64 {
        self.inner.next_entity_id.fetch_add(1, Ordering::SeqCst)
    }

    // ==================== 数据准备 ====================

    pub fn insert_brand(&self, name: &str) -> i64 {
        let id = self.next_entity_id();
        let now = Utc::now();
        self.inner.state.write().brands.insert(
            id,
            Brand {
                id,
                name: name.to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn insert_customer(&self, name: &str, email: &str, points_balance: i64) -> i64 {
        let id = self.next_entity_id();
        let now = Utc::now();
        self.inner.state.write().customers.insert(
            id,
            Customer {
                id,
                name: name.to_string(),
                email: email.to_string(),
                points_balance,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// 添加一张启用状态的代金券
    pub fn insert_voucher(
        &self,
        brand_id: i64,
        code: &str,
        points_cost: i64,
        valid_until: Option<DateTime<Utc>>,
    ) -> i64 {
        let id = self.next_entity_id();
        let now = Utc::now();
        self.inner.state.write().vouchers.insert(
            id,
            Voucher {
                id,
                brand_id,
                code: code.to_string(),
                name: code.to_string(),
                description: None,
                points_cost,
                is_active: true,
                valid_until,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn set_voucher_active(&self, voucher_id: i64, is_active: bool) {
        if let Some(voucher) = self.inner.state.write().vouchers.get_mut(&voucher_id) {
            voucher.is_active = is_active;
            voucher.updated_at = Utc::now();
        }
    }

    pub fn set_voucher_cost(&self, voucher_id: i64, points_cost: i64) {
        if let Some(voucher) = self.inner.state.write().vouchers.get_mut(&voucher_id) {
            voucher.points_cost = points_cost;
            voucher.updated_at = Utc::now();
        }
    }

    // ==================== 状态检查 ====================

    pub fn customer_balance(&self, customer_id: i64) -> Option<i64> {
        self.inner
            .state
            .read()
            .customers
            .get(&customer_id)
            .map(|c| c.points_balance)
    }

    pub fn redemption_count(&self) -> usize {
        self.inner.state.read().redemptions.len()
    }

    /// 让下一次兑换记录写入失败，用于验证原子性
    pub fn fail_next_redemption_insert(&self) {
        self.inner.fail_next_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoucherCatalog for InMemoryBackend {
    async fn get_voucher(&self, id: i64) -> Result<Option<Voucher>> {
        Ok(self.inner.state.read().vouchers.get(&id).cloned())
    }

    async fn list_vouchers(&self) -> Result<Vec<Voucher>> {
        Ok(self.inner.state.read().vouchers.values().cloned().collect())
    }

    async fn list_vouchers_by_brand(&self, brand_id: i64) -> Result<Vec<Voucher>> {
        Ok(self
            .inner
            .state
            .read()
            .vouchers
            .values()
            .filter(|v| v.brand_id == brand_id)
            .cloned()
            .collect())
    }

    async fn get_brand(&self, id: i64) -> Result<Option<Brand>> {
        Ok(self.inner.state.read().brands.get(&id).cloned())
    }

    async fn list_brands(&self) -> Result<Vec<Brand>> {
        Ok(self.inner.state.read().brands.values().cloned().collect())
    }
}

#[async_trait]
impl CustomerLedger for InMemoryBackend {
    async fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        Ok(self.inner.state.read().customers.get(&id).cloned())
    }
}

#[async_trait]
impl RedemptionStore for InMemoryBackend {
    async fn get_redemption(&self, id: i64) -> Result<Option<Redemption>> {
        Ok(self.inner.state.read().redemptions.get(&id).cloned())
    }

    async fn list_redemptions_by_customer(
        &self,
        customer_id: i64,
        limit: i64,
    ) -> Result<Vec<Redemption>> {
        let mut redemptions: Vec<Redemption> = self
            .inner
            .state
            .read()
            .redemptions
            .values()
            .filter(|r| r.customer_id == customer_id)
            .map(|r| Redemption {
                items: Vec::new(),
                ..r.clone()
            })
            .collect();

        redemptions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        redemptions.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(redemptions)
    }
}

#[async_trait]
impl TransactionBoundary for InMemoryBackend {
    async fn begin(&self, customer_id: i64) -> Result<Box<dyn AtomicUnit>> {
        let guard = match self.inner.strategy {
            LockStrategy::Pessimistic => {
                let lock = Arc::clone(
                    self.inner
                        .customer_locks
                        .entry(customer_id)
                        .or_default()
                        .value(),
                );
                let guard = tokio::time::timeout(self.inner.lock_timeout, lock.lock_owned())
                    .await
                    .map_err(|_| RedemptionError::Conflict)?;
                Some(guard)
            }
            LockStrategy::Optimistic => None,
        };

        Ok(Box::new(MemoryUnit {
            inner: Arc::clone(&self.inner),
            customer_id,
            guard,
            observed_balance: None,
            staged_debit: None,
            staged_redemptions: Vec::new(),
        }))
    }

    fn strategy(&self) -> LockStrategy {
        self.inner.strategy
    }
}

/// 暂存的扣减：提交时要求余额仍为 expected
struct StagedDebit {
    customer_id: i64,
    expected: i64,
    new_balance: i64,
}

struct MemoryUnit {
    inner: Arc<Inner>,
    customer_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
    observed_balance: Option<i64>,
    staged_debit: Option<StagedDebit>,
    staged_redemptions: Vec<Redemption>,
}

impl MemoryUnit {
    fn read_balance(&self, customer_id: i64) -> Option<i64> {
        self.inner
            .state
            .read()
            .customers
            .get(&customer_id)
            .map(|c| c.points_balance)
    }

    fn release(&mut self) {
        self.staged_debit = None;
        self.staged_redemptions.clear();
        self.release_lock();
    }

    /// 释放客户锁；没有其他等待者时移除锁条目
    fn release_lock(&mut self) {
        if let Some(guard) = self.guard.take() {
            drop(guard);
            self.inner
                .customer_locks
                .remove_if(&self.customer_id, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

impl Drop for MemoryUnit {
    fn drop(&mut self) {
        self.release_lock();
    }
}

#[async_trait]
impl LedgerTx for MemoryUnit {
    async fn current_balance(&mut self, customer_id: i64) -> Result<Option<i64>> {
        if let Some(staged) = self
            .staged_debit
            .as_ref()
            .filter(|d| d.customer_id == customer_id)
        {
            return Ok(Some(staged.new_balance));
        }

        let balance = self.read_balance(customer_id);
        self.observed_balance = balance;
        Ok(balance)
    }

    async fn debit_if_sufficient(&mut self, customer_id: i64, amount: i64) -> Result<i64> {
        let (expected, current) = match self
            .staged_debit
            .as_ref()
            .filter(|d| d.customer_id == customer_id)
        {
            Some(staged) => (staged.expected, staged.new_balance),
            None => {
                let observed = match self.observed_balance {
                    Some(balance) => balance,
                    None => self
                        .read_balance(customer_id)
                        .ok_or(RedemptionError::CustomerNotFound(customer_id))?,
                };
                (observed, observed)
            }
        };

        if current < amount {
            return Err(RedemptionError::InsufficientPoints {
                required: amount,
                available: current,
            });
        }

        let new_balance = current - amount;
        self.staged_debit = Some(StagedDebit {
            customer_id,
            expected,
            new_balance,
        });
        Ok(new_balance)
    }
}

#[async_trait]
impl StoreTx for MemoryUnit {
    async fn create_redemption(&mut self, redemption: &NewRedemption) -> Result<i64> {
        if self.inner.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(RedemptionError::Database(sqlx::Error::Protocol(
                "注入的兑换记录写入失败".to_string(),
            )));
        }

        let id = self.inner.next_redemption_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let items = redemption
            .items
            .iter()
            .map(|item| RedemptionItem {
                id: self.inner.next_item_id.fetch_add(1, Ordering::SeqCst),
                redemption_id: id,
                voucher_id: item.voucher_id,
                points_cost: item.points_cost,
                created_at: now,
            })
            .collect();

        self.staged_redemptions.push(Redemption {
            id,
            customer_id: redemption.customer_id,
            total_points_cost: redemption.total_points_cost,
            status: RedemptionStatus::Pending,
            items,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }
}

#[async_trait]
impl AtomicUnit for MemoryUnit {
    async fn commit(&mut self) -> Result<()> {
        let outcome = {
            let mut state = self.inner.state.write();
            apply_staged(
                &mut state,
                self.staged_debit.as_ref(),
                &mut self.staged_redemptions,
            )
        };

        self.release();
        if outcome.is_ok() {
            debug!("内存原子单元已提交");
        }
        outcome
    }

    async fn rollback(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

/// 在写锁内应用暂存写入；余额已被并发修改时不做任何变更
fn apply_staged(
    state: &mut MemoryState,
    debit: Option<&StagedDebit>,
    redemptions: &mut Vec<Redemption>,
) -> Result<()> {
    if let Some(debit) = debit {
        let customer = state
            .customers
            .get_mut(&debit.customer_id)
            .ok_or(RedemptionError::CustomerNotFound(debit.customer_id))?;
        if customer.points_balance != debit.expected {
            return Err(RedemptionError::Conflict);
        }
        customer.points_balance = debit.new_balance;
        customer.updated_at = Utc::now();
    }

    for redemption in redemptions.drain(..) {
        state.redemptions.insert(redemption.id, redemption);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(customer_id: i64, points: i64) -> NewRedemption {
        NewRedemption {
            customer_id,
            total_points_cost: points,
            items: vec![crate::models::NewRedemptionItem {
                voucher_id: 1,
                points_cost: points,
            }],
        }
    }

    #[tokio::test]
    async fn test_dropped_unit_leaves_no_trace() {
        let backend = InMemoryBackend::default();
        let customer = backend.insert_customer("Alice", "alice@example.com", 500);

        {
            let mut unit = backend.begin(customer).await.unwrap();
            unit.current_balance(customer).await.unwrap();
            unit.debit_if_sufficient(customer, 200).await.unwrap();
            unit.create_redemption(&priced(customer, 200)).await.unwrap();
        }

        assert_eq!(backend.customer_balance(customer), Some(500));
        assert_eq!(backend.redemption_count(), 0);

        // 锁已随单元释放
        let mut unit = backend.begin(customer).await.unwrap();
        unit.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_applies_debit_and_record_together() {
        let backend = InMemoryBackend::default();
        let customer = backend.insert_customer("Bob", "bob@example.com", 300);

        let mut unit = backend.begin(customer).await.unwrap();
        assert_eq!(unit.current_balance(customer).await.unwrap(), Some(300));
        assert_eq!(unit.debit_if_sufficient(customer, 120).await.unwrap(), 180);
        // 单元内读到自己的暂存扣减，外部仍是旧值
        assert_eq!(unit.current_balance(customer).await.unwrap(), Some(180));
        assert_eq!(backend.customer_balance(customer), Some(300));

        let id = unit.create_redemption(&priced(customer, 120)).await.unwrap();
        unit.commit().await.unwrap();

        assert_eq!(backend.customer_balance(customer), Some(180));
        let stored = backend.get_redemption(id).await.unwrap().unwrap();
        assert_eq!(stored.status, RedemptionStatus::Pending);
        assert!(stored.validate().is_ok());
    }

    #[tokio::test]
    async fn test_pessimistic_lock_times_out_as_conflict() {
        let backend = InMemoryBackend::new(LockStrategy::Pessimistic, Duration::from_millis(20));
        let customer = backend.insert_customer("Carol", "carol@example.com", 100);

        let _held = backend.begin(customer).await.unwrap();
        let second = backend.begin(customer).await;

        assert!(matches!(second, Err(RedemptionError::Conflict)));
    }

    #[tokio::test]
    async fn test_customer_lock_entry_removed_after_release() {
        let backend = InMemoryBackend::default();
        let customer = backend.insert_customer("Dora", "dora@example.com", 100);

        let mut unit = backend.begin(customer).await.unwrap();
        assert_eq!(backend.inner.customer_locks.len(), 1);
        unit.commit().await.unwrap();
        assert!(backend.inner.customer_locks.is_empty());

        {
            let _dropped = backend.begin(customer).await.unwrap();
        }
        assert!(backend.inner.customer_locks.is_empty());
    }

    #[tokio::test]
    async fn test_customer_lock_entry_kept_while_waiter_pending() {
        let backend = InMemoryBackend::default();
        let customer = backend.insert_customer("Eve", "eve@example.com", 100);

        let mut held = backend.begin(customer).await.unwrap();
        let waiter = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.begin(customer).await.map(|_| ()) })
        };
        while Arc::strong_count(backend.inner.customer_locks.get(&customer).unwrap().value()) < 3 {
            tokio::task::yield_now().await;
        }

        held.rollback().await.unwrap();
        assert!(waiter.await.unwrap().is_ok());
        assert!(backend.inner.customer_locks.is_empty());
    }

    #[tokio::test]
    async fn test_optimistic_lost_race_is_conflict() {
        let backend = InMemoryBackend::new(LockStrategy::Optimistic, DEFAULT_LOCK_TIMEOUT);
        let customer = backend.insert_customer("Dave", "dave@example.com", 150);

        let mut first = backend.begin(customer).await.unwrap();
        let mut second = backend.begin(customer).await.unwrap();

        assert_eq!(first.current_balance(customer).await.unwrap(), Some(150));
        assert_eq!(second.current_balance(customer).await.unwrap(), Some(150));
        first.debit_if_sufficient(customer, 100).await.unwrap();
        second.debit_if_sufficient(customer, 100).await.unwrap();
        first.create_redemption(&priced(customer, 100)).await.unwrap();
        second.create_redemption(&priced(customer, 100)).await.unwrap();

        first.commit().await.unwrap();
        let lost = second.commit().await;

        assert!(matches!(lost, Err(RedemptionError::Conflict)));
        assert_eq!(backend.customer_balance(customer), Some(50));
        assert_eq!(backend.redemption_count(), 1);
    }

    #[tokio::test]
    async fn test_debit_rejects_insufficient_balance() {
        let backend = InMemoryBackend::default();
        let customer = backend.insert_customer("Erin", "erin@example.com", 50);

        let mut unit = backend.begin(customer).await.unwrap();
        let err = unit.debit_if_sufficient(customer, 100).await.unwrap_err();

        assert!(matches!(
            err,
            RedemptionError::InsufficientPoints {
                required: 100,
                available: 50
            }
        ));
    }

    #[tokio::test]
    async fn test_list_brands_in_id_order() {
        let backend = InMemoryBackend::default();
        let first = backend.insert_brand("Coffee House");
        let second = backend.insert_brand("Book Nook");

        let brands = backend.list_brands().await.unwrap();
        assert_eq!(
            brands.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![first, second]
        );
    }

    #[tokio::test]
    async fn test_list_redemptions_by_customer_respects_limit() {
        let backend = InMemoryBackend::default();
        let customer = backend.insert_customer("Frank", "frank@example.com", 1_000);

        for _ in 0..3 {
            let mut unit = backend.begin(customer).await.unwrap();
            unit.current_balance(customer).await.unwrap();
            unit.debit_if_sufficient(customer, 100).await.unwrap();
            unit.create_redemption(&priced(customer, 100)).await.unwrap();
            unit.commit().await.unwrap();
        }

        let listed = backend
            .list_redemptions_by_customer(customer, 2)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].id > listed[1].id);
        assert!(listed.iter().all(|r| r.items.is_empty()));
        assert!(
            backend
                .list_redemptions_by_customer(customer + 100, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
