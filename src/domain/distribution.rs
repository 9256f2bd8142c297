//! 分发领域模型
//!
//! 一次分发 = 按顺序执行的若干转账步骤。步骤顺序即执行顺序，
//! 失败后剩余步骤保持 Pending，已确认的步骤不会回滚。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{
        asset::{self, Asset},
        transaction_status::{StepStatus, TransactionStatus},
        wallet_family::WalletFamily,
    },
    utils::address_validator::AddressValidator,
};

/// 收款方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub amount: Decimal,
}

impl Recipient {
    pub fn new(address: impl Into<String>, amount: Decimal) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionStep {
    pub recipient: String,
    pub amount: Decimal,
    pub status: StepStatus,
    pub step_hash: Option<String>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DistributionStep {
    pub fn pending(recipient: &Recipient) -> Self {
        Self {
            recipient: recipient.address.clone(),
            amount: recipient.amount,
            status: StepStatus::Pending,
            step_hash: None,
            error: None,
            updated_at: None,
        }
    }

    pub fn mark_submitted(&mut self) {
        self.status = StepStatus::Submitted;
        self.updated_at = Some(Utc::now());
    }

    pub fn mark_confirmed(&mut self, hash: impl Into<String>) {
        self.status = StepStatus::Confirmed;
        self.step_hash = Some(hash.into());
        self.error = None;
        self.updated_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Some(Utc::now());
    }

    /// 续传前重新排队
    pub fn requeue(&mut self) {
        self.status = StepStatus::Pending;
        self.error = None;
        self.updated_at = Some(Utc::now());
    }
}

/// 一次分发尝试的可观察状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    pub attempt_id: Option<Uuid>,
    pub is_processing: bool,
    /// 最后一个已确认步骤的哈希
    pub hash: Option<String>,
    pub status: TransactionStatus,
    /// 首个失败步骤的错误类别
    pub error: Option<String>,
    pub steps: Vec<DistributionStep>,
}

impl TransactionState {
    pub fn idle() -> Self {
        Self {
            attempt_id: None,
            is_processing: false,
            hash: None,
            status: TransactionStatus::Idle,
            error: None,
            steps: Vec::new(),
        }
    }

    /// 开始新一轮尝试：所有步骤 Pending
    pub fn begin(recipients: &[Recipient]) -> Self {
        Self {
            attempt_id: Some(Uuid::new_v4()),
            is_processing: true,
            hash: None,
            status: TransactionStatus::Pending,
            error: None,
            steps: recipients.iter().map(DistributionStep::pending).collect(),
        }
    }

    /// 第一个未确认的步骤
    pub fn first_unconfirmed(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.status != StepStatus::Confirmed)
    }

    /// 续传：失败步骤重新排队，沿用同一 attempt_id
    ///
    /// 返回续传起点；没有可续传的步骤时返回 `None`。
    pub fn reopen(&mut self) -> Option<usize> {
        if self.status != TransactionStatus::Error {
            return None;
        }
        let start = self.first_unconfirmed()?;

        for step in self.steps.iter_mut().skip(start) {
            if step.status == StepStatus::Failed {
                step.requeue();
            }
        }
        self.is_processing = true;
        self.status = TransactionStatus::Pending;
        self.error = None;
        Some(start)
    }

    pub fn last_confirmed_hash(&self) -> Option<String> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.status == StepStatus::Confirmed)
            .and_then(|s| s.step_hash.clone())
    }

    pub fn all_confirmed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Confirmed)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

impl Default for TransactionState {
    fn default() -> Self {
        Self::idle()
    }
}

/// 分发成功的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionResult {
    pub attempt_id: Uuid,
    pub hash: String,
    pub steps: Vec<DistributionStep>,
}

/// 分发策略：资产、收款方列表与可选的总额校验
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPolicy {
    pub family: WalletFamily,
    pub asset: Asset,
    #[serde(default)]
    pub total: Option<Decimal>,
    pub recipients: Vec<Recipient>,
}

impl DistributionPolicy {
    pub fn validate(&self) -> Result<(), String> {
        validate_recipients(self.family, &self.asset, &self.recipients)?;

        if let Some(total) = self.total {
            let sum = self.total_amount();
            if sum != total {
                return Err(format!(
                    "recipient amounts sum to {} but total is {}",
                    sum, total
                ));
            }
        }

        Ok(())
    }

    pub fn total_amount(&self) -> Decimal {
        self.recipients.iter().map(|r| r.amount).sum()
    }
}

/// 校验收款方列表：非空、地址格式与家族一致、金额可换算为最小单位
pub fn validate_recipients(
    family: WalletFamily,
    asset: &Asset,
    recipients: &[Recipient],
) -> Result<(), String> {
    if recipients.is_empty() {
        return Err("recipient list is empty".to_string());
    }

    for (index, recipient) in recipients.iter().enumerate() {
        if !AddressValidator::validate(family, &recipient.address) {
            return Err(format!(
                "recipient #{} has invalid {} address: {}",
                index, family, recipient.address
            ));
        }
        asset::to_base_units(recipient.amount, asset.decimals())
            .map_err(|e| format!("recipient #{}: {}", index, e))?;
    }

    Ok(())
}
