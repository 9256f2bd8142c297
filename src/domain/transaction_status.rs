//! 分发状态定义
//! 单步状态 [`StepStatus`] 与整体状态 [`TransactionStatus`]

use std::fmt;

use serde::{Deserialize, Serialize};

/// 单个转账步骤的状态机
/// ✅ Pending → Submitted → Confirmed | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// 尚未提交
    Pending,

    /// 已提交给钱包，等待用户确认
    Submitted,

    /// 钱包已返回交易哈希
    Confirmed,

    /// 被拒绝或提交失败
    Failed,
}

impl StepStatus {
    /// 获取状态描述
    pub fn description(&self) -> &'static str {
        match self {
            Self::Pending => "等待提交",
            Self::Submitted => "等待钱包确认",
            Self::Confirmed => "已提交上链",
            Self::Failed => "提交失败",
        }
    }

    /// 本轮尝试内是否已终结
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use StepStatus::*;

        match (self, target) {
            (Pending, Submitted) => true,
            (Submitted, Confirmed) | (Submitted, Failed) => true,

            // 续传时失败步骤重新排队；已确认步骤永不重发
            (Failed, Pending) => true,

            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次分发尝试的整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Idle,
    Pending,
    Success,
    Error,
}

impl TransactionStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    pub fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;

        match (self, target) {
            // 任何非处理中状态都可以开始新一轮尝试
            (Idle, Pending) | (Success, Pending) | (Error, Pending) => true,
            (Pending, Success) | (Pending, Error) => true,
            (Success, Idle) | (Error, Idle) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
