use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    infrastructure::environment::InjectedEnvironment,
    service::{
        adapters::AdapterRegistry,
        wallet_detector::{WalletDetector, WalletRegistry},
        wallet_service::WalletService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// 注入提供者所在的环境（JSON-RPC 端点或测试替身）
    pub environment: Arc<InjectedEnvironment>,
    pub registry: Arc<WalletRegistry>,
    pub wallet_service: Arc<WalletService>,
}

impl AppState {
    /// 按配置装配所有服务
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let environment = Arc::new(InjectedEnvironment::from_endpoints(&config.providers)?);
        Ok(Self::with_environment(config, environment))
    }

    /// 使用给定环境装配；测试中用来注入脚本化提供者
    pub fn with_environment(config: Config, environment: Arc<InjectedEnvironment>) -> Self {
        let detector = WalletDetector::new(
            environment.clone(),
            config.wallets.clone(),
            config.detection.missing_policy,
        );
        let registry = Arc::new(WalletRegistry::new(detector));

        let wallet_service = Arc::new(WalletService::new(
            registry.clone(),
            AdapterRegistry::with_defaults(),
            config.network.expected_networks(),
            config.distribution.policy(),
            Duration::from_millis(config.reconciliation.settlement_delay_ms),
        ));

        Self {
            config: Arc::new(config),
            environment,
            registry,
            wallet_service,
        }
    }
}
