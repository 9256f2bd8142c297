//! 执行环境注入表
//!
//! 注入路径 → 提供者。环境持有提供者的唯一强引用，移除后所有弱引用立即失效。

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use anyhow::Result;

use crate::{
    config::ProviderEndpointConfig,
    domain::provider::{InjectedProvider, ProviderEnvironment},
    infrastructure::json_rpc_provider::JsonRpcProvider,
};

#[derive(Default)]
pub struct InjectedEnvironment {
    providers: RwLock<HashMap<String, Arc<dyn InjectedProvider>>>,
}

impl InjectedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置的 JSON-RPC 端点构建环境
    pub fn from_endpoints(endpoints: &[ProviderEndpointConfig]) -> Result<Self> {
        let env = Self::new();
        for endpoint in endpoints {
            let provider = JsonRpcProvider::new(endpoint)?;
            env.install(&endpoint.injection_point, Arc::new(provider));
            tracing::info!(
                injection_point = %endpoint.injection_point,
                rpc_url = %endpoint.rpc_url,
                "Installed JSON-RPC wallet provider"
            );
        }
        Ok(env)
    }

    pub fn install(&self, injection_point: &str, provider: Arc<dyn InjectedProvider>) {
        let mut map = match self.providers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.insert(injection_point.to_string(), provider);
    }

    pub fn uninstall(&self, injection_point: &str) -> Option<Arc<dyn InjectedProvider>> {
        let mut map = match self.providers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.remove(injection_point)
    }
}

impl ProviderEnvironment for InjectedEnvironment {
    fn probe(&self, injection_point: &str) -> Option<Arc<dyn InjectedProvider>> {
        let map = match self.providers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(injection_point).cloned()
    }
}
