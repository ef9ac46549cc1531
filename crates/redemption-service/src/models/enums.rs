//! 兑换服务枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 兑换记录状态
///
/// 兑换流程只会以 Pending 创建记录，后续状态流转由外部流程驱动
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum RedemptionStatus {
    /// 待处理 - 积分已扣减，等待履约
    #[default]
    Pending,
    /// 已完成 - 记录不可再变更
    Completed,
    /// 已取消
    Cancelled,
    /// 失败
    Failed,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// 检查状态流转是否合法
    ///
    /// 只允许 pending -> completed | cancelled | failed
    pub fn can_transition_to(&self, next: RedemptionStatus) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Completed | Self::Cancelled | Self::Failed
            )
        )
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedemptionStatus {
    type Err = String;

    /// 大小写不敏感
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(format!("无效的兑换状态: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&RedemptionStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");

        let status: RedemptionStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, RedemptionStatus::Cancelled);
    }

    #[test]
    fn test_status_from_str_case_insensitive() {
        assert_eq!(
            "COMPLETED".parse::<RedemptionStatus>().unwrap(),
            RedemptionStatus::Completed
        );
        assert_eq!(
            " Failed ".parse::<RedemptionStatus>().unwrap(),
            RedemptionStatus::Failed
        );
        assert!("shipped".parse::<RedemptionStatus>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        use RedemptionStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Failed.can_transition_to(Completed));

        assert!(!Pending.is_terminal());
        assert!(Completed.is_terminal());
    }
}
