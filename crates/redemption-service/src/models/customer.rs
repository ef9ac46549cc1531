//! 客户实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 客户
///
/// points_balance 只能通过事务边界内的扣减修改，且永不为负
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub points_balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn can_afford(&self, points: i64) -> bool {
        self.points_balance >= points
    }
}
