//! 钱包服务（展示层入口）
//!
//! 由组合根显式构造并放入 `AppState`，不使用全局单例。

use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    domain::{
        asset::format_amount,
        connection_state::ConnectionState,
        distribution::{DistributionPolicy, Recipient, TransactionResult, TransactionState},
        wallet_descriptor::WalletDescriptor,
        wallet_family::WalletFamily,
    },
    error::{ConnectError, DistributionError, ProviderError},
    service::{
        adapters::AdapterRegistry,
        balance_reconciler::BalanceReconciler,
        connection_manager::{ActiveSession, ConnectionManager},
        distribution_orchestrator::DistributionOrchestrator,
        wallet_detector::WalletRegistry,
    },
};

pub struct WalletService {
    registry: Arc<WalletRegistry>,
    connection: Arc<ConnectionManager>,
    orchestrator: DistributionOrchestrator,
    reconciler: Arc<BalanceReconciler>,
    policy: DistributionPolicy,
}

impl WalletService {
    pub fn new(
        registry: Arc<WalletRegistry>,
        adapters: AdapterRegistry,
        expected_networks: HashMap<WalletFamily, String>,
        policy: DistributionPolicy,
        settlement_delay: Duration,
    ) -> Self {
        let connection = Arc::new(ConnectionManager::new(adapters, expected_networks));
        let reconciler = Arc::new(BalanceReconciler::new(
            connection.clone(),
            policy.asset.clone(),
            settlement_delay,
        ));
        let orchestrator =
            DistributionOrchestrator::new(connection.clone(), reconciler.clone(), policy.asset.clone());

        Self {
            registry,
            connection,
            orchestrator,
            reconciler,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<WalletRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &DistributionPolicy {
        &self.policy
    }

    /// 立即检测一轮并返回结果
    pub fn detect_wallets(&self) -> Vec<WalletDescriptor> {
        self.registry.refresh()
    }

    /// 最近一轮检测结果
    pub fn wallets(&self) -> Vec<WalletDescriptor> {
        self.registry.current()
    }

    /// 按 id 连接钱包，成功后立即拉取一次余额
    pub async fn connect_wallet(&self, wallet_id: &str) -> Result<ConnectionState, ConnectError> {
        let descriptor = match self.registry.find(wallet_id) {
            Some(d) => d,
            None => self
                .registry
                .refresh()
                .into_iter()
                .find(|d| d.id == wallet_id)
                .ok_or_else(|| ConnectError::UnknownWallet(wallet_id.to_string()))?,
        };

        self.connection.connect(&descriptor).await?;

        // 初始余额拉取失败不影响连接
        if let Some(session) = self.connection.session().await {
            if let Err(e) = self.reconciler.reconcile(&session).await {
                tracing::warn!(wallet = %descriptor.name, error = %e, "Initial balance fetch failed");
            }
        }

        Ok(self.connection.snapshot().await)
    }

    /// 断开连接，同时取消待执行的对账并把交易状态重置为 Idle
    pub async fn disconnect(&self) -> ConnectionState {
        self.reconciler.cancel();
        let state = self.connection.disconnect().await;
        if !self.orchestrator.reset().await {
            tracing::warn!("Distribution still processing; its next step will fail");
        }
        state
    }

    /// 按配置的分发策略执行
    pub async fn execute_distribution(&self) -> Result<TransactionResult, DistributionError> {
        self.orchestrator
            .execute_distribution(&self.policy.recipients)
            .await
    }

    pub async fn execute_distribution_to(
        &self,
        recipients: &[Recipient],
    ) -> Result<TransactionResult, DistributionError> {
        self.orchestrator.execute_distribution(recipients).await
    }

    pub async fn resume_distribution(&self) -> Result<TransactionResult, DistributionError> {
        self.orchestrator.resume_distribution().await
    }

    async fn active_session(&self) -> Result<ActiveSession, ProviderError> {
        self.connection
            .session()
            .await
            .ok_or_else(|| ProviderError::ProviderUnavailable("no wallet connected".to_string()))
    }

    pub async fn get_native_balance(&self, address: &str) -> Result<String, ProviderError> {
        let session = self.active_session().await?;
        let balance = session.adapter.get_native_balance(address).await?;
        Ok(format_amount(balance))
    }

    pub async fn get_token_balance(&self, address: &str) -> Result<String, ProviderError> {
        let session = self.active_session().await?;
        let balance = session
            .adapter
            .get_token_balance(address, self.orchestrator.asset())
            .await?;
        Ok(format_amount(balance))
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.snapshot().await
    }

    pub async fn transaction_state(&self) -> TransactionState {
        self.orchestrator.snapshot().await
    }
}
