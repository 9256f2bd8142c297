//! 分发编排器
//!
//! 把有序的多笔转账作为一个逻辑操作执行：严格顺序、失败即停、不回滚。
//! 第 k 步失败时 0..k 已确认，k 失败，其余保持 Pending。
//! 整体哈希取最后一个已确认步骤的哈希。

use std::sync::{Arc, Weak};

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    domain::{
        asset::Asset,
        distribution::{validate_recipients, Recipient, TransactionResult, TransactionState},
        transaction_status::{StepStatus, TransactionStatus},
    },
    error::{DistributionError, ProviderError},
    metrics,
    service::{
        adapters::TransferRequest,
        balance_reconciler::BalanceReconciler,
        connection_manager::{ActiveSession, ConnectionManager},
    },
};

struct Attempt {
    state: TransactionState,
    /// 发起本轮尝试时的连接纪元
    epoch: Option<u64>,
    /// 执行中的 future 持有对应的强引用
    runner: Weak<()>,
}

impl Attempt {
    /// 执行中的 future 被调用方丢弃时，`is_processing` 会遗留为 true。
    /// 这里把第一个未确认的步骤记为失败并结束该轮尝试。
    fn recover_abandoned(&mut self) {
        if !self.state.is_processing || self.runner.strong_count() > 0 {
            return;
        }

        self.state.is_processing = false;
        self.state.hash = self.state.last_confirmed_hash();

        let Some(index) = self.state.first_unconfirmed() else {
            self.state.status = TransactionStatus::Success;
            self.state.error = None;
            return;
        };

        let reason = ProviderError::ProviderUnavailable(
            "distribution was cancelled before the wallet answered".to_string(),
        );
        self.state.steps[index].mark_failed(reason.to_string());
        self.state.status = TransactionStatus::Error;
        self.state.error = Some(reason.kind().to_string());

        metrics::inc_step_failed(reason.kind());
        metrics::inc_distribution(false);
        tracing::warn!(
            attempt_id = ?self.state.attempt_id,
            step = index,
            "Abandoned distribution recovered"
        );
    }
}

pub struct DistributionOrchestrator {
    connection: Arc<ConnectionManager>,
    reconciler: Arc<BalanceReconciler>,
    asset: Asset,
    attempt: RwLock<Attempt>,
}

impl DistributionOrchestrator {
    pub fn new(connection: Arc<ConnectionManager>, reconciler: Arc<BalanceReconciler>, asset: Asset) -> Self {
        Self {
            connection,
            reconciler,
            asset,
            attempt: RwLock::new(Attempt {
                state: TransactionState::idle(),
                epoch: None,
                runner: Weak::new(),
            }),
        }
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// 执行一次新的分发；上一轮尝试的状态被丢弃
    pub async fn execute_distribution(
        &self,
        recipients: &[Recipient],
    ) -> Result<TransactionResult, DistributionError> {
        let session = self
            .connection
            .session()
            .await
            .ok_or(DistributionError::NotConnected)?;

        validate_recipients(session.family, &self.asset, recipients)
            .map_err(DistributionError::InvalidRecipients)?;

        let runner = Arc::new(());
        {
            let mut attempt = self.attempt.write().await;
            attempt.recover_abandoned();
            if attempt.state.is_processing {
                return Err(DistributionError::AlreadyProcessing);
            }
            attempt.state = TransactionState::begin(recipients);
            attempt.epoch = Some(session.epoch);
            attempt.runner = Arc::downgrade(&runner);

            tracing::info!(
                attempt_id = ?attempt.state.attempt_id,
                wallet = %session.wallet_name,
                steps = recipients.len(),
                asset = %self.asset.symbol(),
                "Starting distribution"
            );
        }

        self.run_from(&session, 0, runner).await
    }

    /// 续传上一轮失败的分发：只重新提交失败步骤及其后的 Pending 步骤
    ///
    /// 必须仍是发起该轮尝试的同一连接；已确认的步骤永不重发。
    pub async fn resume_distribution(&self) -> Result<TransactionResult, DistributionError> {
        let session = self
            .connection
            .session()
            .await
            .ok_or(DistributionError::NotConnected)?;

        let runner = Arc::new(());
        let start = {
            let mut attempt = self.attempt.write().await;
            attempt.recover_abandoned();
            if attempt.state.is_processing {
                return Err(DistributionError::AlreadyProcessing);
            }
            if attempt.epoch != Some(session.epoch) {
                return Err(DistributionError::NothingToResume);
            }
            let start = attempt
                .state
                .reopen()
                .ok_or(DistributionError::NothingToResume)?;
            attempt.runner = Arc::downgrade(&runner);

            tracing::info!(
                attempt_id = ?attempt.state.attempt_id,
                from_step = start,
                "Resuming distribution"
            );
            start
        };

        self.run_from(&session, start, runner).await
    }

    /// `_runner` 随 future 一起存活；future 被丢弃后该轮尝试由 `recover_abandoned` 收回
    async fn run_from(
        &self,
        session: &ActiveSession,
        start: usize,
        _runner: Arc<()>,
    ) -> Result<TransactionResult, DistributionError> {
        let pending: Vec<(usize, String, Decimal)> = {
            let attempt = self.attempt.read().await;
            attempt
                .state
                .steps
                .iter()
                .enumerate()
                .skip(start)
                .map(|(i, s)| (i, s.recipient.clone(), s.amount))
                .collect()
        };

        for (index, recipient, amount) in pending {
            if !self.connection.is_current(session.epoch).await {
                let reason = ProviderError::ProviderUnavailable(
                    "wallet disconnected before the step was submitted".to_string(),
                );
                return Err(self.fail(index, reason).await);
            }

            self.attempt.write().await.state.steps[index].mark_submitted();
            tracing::debug!(step = index, recipient = %recipient, amount = %amount, "Submitting transfer");

            let request = TransferRequest {
                from: &session.address,
                recipient: &recipient,
                amount,
                asset: &self.asset,
            };

            match session.adapter.request_transfer(&request).await {
                Ok(hash) => {
                    let mut attempt = self.attempt.write().await;
                    attempt.state.steps[index].mark_confirmed(hash.clone());
                    attempt.state.hash = Some(hash.clone());
                    metrics::inc_step_confirmed();
                    tracing::info!(step = index, recipient = %recipient, tx_hash = %hash, "Transfer confirmed");
                }
                Err(reason) => return Err(self.fail(index, reason).await),
            }
        }

        Ok(self.complete(session).await)
    }

    async fn fail(&self, index: usize, reason: ProviderError) -> DistributionError {
        let snapshot = {
            let mut attempt = self.attempt.write().await;
            attempt.state.steps[index].mark_failed(reason.to_string());
            attempt.state.status = TransactionStatus::Error;
            attempt.state.is_processing = false;
            attempt.state.error = Some(reason.kind().to_string());
            attempt.state.hash = attempt.state.last_confirmed_hash();
            attempt.state.clone()
        };

        metrics::inc_step_failed(reason.kind());
        metrics::inc_distribution(false);
        tracing::warn!(
            attempt_id = ?snapshot.attempt_id,
            step = index,
            kind = reason.kind(),
            error = %reason,
            "Distribution step failed"
        );

        DistributionError::step(index, reason, snapshot)
    }

    async fn complete(&self, session: &ActiveSession) -> TransactionResult {
        let result = {
            let mut attempt = self.attempt.write().await;
            attempt.state.status = TransactionStatus::Success;
            attempt.state.is_processing = false;
            attempt.state.error = None;
            attempt.state.hash = attempt.state.last_confirmed_hash();

            TransactionResult {
                attempt_id: attempt.state.attempt_id.unwrap_or_else(Uuid::nil),
                hash: attempt.state.hash.clone().unwrap_or_default(),
                steps: attempt.state.steps.clone(),
            }
        };

        metrics::inc_distribution(true);
        tracing::info!(
            attempt_id = %result.attempt_id,
            tx_hash = %result.hash,
            steps = result.steps.len(),
            "Distribution completed"
        );

        self.reconciler.schedule(session.clone());
        result
    }

    /// 当前（或最近一轮）尝试的快照
    pub async fn snapshot(&self) -> TransactionState {
        let mut attempt = self.attempt.write().await;
        attempt.recover_abandoned();
        attempt.state.clone()
    }

    /// 回到 Idle；分发进行中时不重置并返回 false
    pub async fn reset(&self) -> bool {
        let mut attempt = self.attempt.write().await;
        attempt.recover_abandoned();
        if attempt.state.is_processing {
            return false;
        }
        attempt.state = TransactionState::idle();
        attempt.epoch = None;
        attempt.runner = Weak::new();
        true
    }
}
