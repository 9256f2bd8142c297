//! 钱包适配器
//!
//! 把不同家族的注入提供者统一为 [`WalletAdapter`] 能力集。
//! 适配器按描述符上的家族标签从 [`AdapterRegistry`] 选择，选择之后不再探测对象形态。
//! 提供者的原始错误在这里归一化为 [`ProviderError`]，且只归一化一次。

pub mod bitcoin;
pub mod evm;
pub mod solana;

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    domain::{
        asset::{AmountError, Asset},
        provider::{InjectedProvider, ProviderRpcError},
        wallet_descriptor::WalletDescriptor,
        wallet_family::WalletFamily,
    },
    error::ProviderError,
};

pub use bitcoin::BitcoinAdapter;
pub use evm::EvmAdapter;
pub use solana::SolanaAdapter;

/// 单笔转账请求
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub from: &'a str,
    pub recipient: &'a str,
    pub amount: Decimal,
    pub asset: &'a Asset,
}

/// 统一的钱包能力集
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    fn family(&self) -> WalletFamily;

    /// 请求授权并返回账户地址
    async fn connect(&self) -> Result<String, ProviderError>;

    async fn get_chain_id(&self) -> Result<String, ProviderError>;

    async fn switch_network(&self, chain_id: &str) -> Result<(), ProviderError> {
        Err(ProviderError::UnsupportedOperation(format!(
            "{} wallets cannot switch to network {}",
            self.family(),
            chain_id
        )))
    }

    /// 提交转账，返回交易哈希
    async fn request_transfer(&self, request: &TransferRequest<'_>) -> Result<String, ProviderError>;

    async fn get_native_balance(&self, address: &str) -> Result<Decimal, ProviderError>;

    async fn get_token_balance(&self, address: &str, asset: &Asset) -> Result<Decimal, ProviderError>;

    /// 可选；不支持时视为成功
    async fn disconnect(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// 提供者弱引用；每次调用时升级，提供者已被移除则返回 `ProviderUnavailable`
#[derive(Clone)]
pub struct ProviderHandle {
    inner: Weak<dyn InjectedProvider>,
    normalize: fn(ProviderRpcError) -> ProviderError,
}

impl ProviderHandle {
    pub fn new(inner: Weak<dyn InjectedProvider>, normalize: fn(ProviderRpcError) -> ProviderError) -> Self {
        Self { inner, normalize }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let provider = self.inner.upgrade().ok_or_else(|| {
            ProviderError::ProviderUnavailable("wallet provider is no longer injected".to_string())
        })?;

        provider.request(method, params).await.map_err(|e| {
            let normalized = (self.normalize)(e);
            tracing::debug!(method = %method, kind = normalized.kind(), error = %normalized, "Provider request failed");
            normalized
        })
    }
}

pub(crate) fn invalid_amount(err: AmountError) -> ProviderError {
    ProviderError::UnsupportedOperation(format!("invalid amount: {}", err))
}

pub(crate) fn unexpected_response(method: &str, value: &Value) -> ProviderError {
    ProviderError::ProviderUnavailable(format!("unexpected {} response: {}", method, value))
}

pub type AdapterFactory = fn(Weak<dyn InjectedProvider>) -> Arc<dyn WalletAdapter>;

fn evm_factory(provider: Weak<dyn InjectedProvider>) -> Arc<dyn WalletAdapter> {
    Arc::new(EvmAdapter::new(provider))
}

fn bitcoin_factory(provider: Weak<dyn InjectedProvider>) -> Arc<dyn WalletAdapter> {
    Arc::new(BitcoinAdapter::new(provider))
}

fn solana_factory(provider: Weak<dyn InjectedProvider>) -> Arc<dyn WalletAdapter> {
    Arc::new(SolanaAdapter::new(provider))
}

/// 家族标签 → 适配器构造函数
pub struct AdapterRegistry {
    factories: HashMap<WalletFamily, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(WalletFamily::Evm, evm_factory);
        registry.register(WalletFamily::Bitcoin, bitcoin_factory);
        registry.register(WalletFamily::Solana, solana_factory);
        registry
    }

    pub fn register(&mut self, family: WalletFamily, factory: AdapterFactory) {
        self.factories.insert(family, factory);
    }

    pub fn adapter_for(&self, descriptor: &WalletDescriptor) -> Result<Arc<dyn WalletAdapter>, ProviderError> {
        let handle = descriptor.handle().ok_or_else(|| {
            ProviderError::ProviderUnavailable(format!("{} is not installed", descriptor.name))
        })?;

        let factory = self.factories.get(&descriptor.family).ok_or_else(|| {
            ProviderError::UnsupportedOperation(format!(
                "no adapter registered for {} wallets",
                descriptor.family
            ))
        })?;

        Ok(factory(handle))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
