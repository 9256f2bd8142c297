//! Solana 适配器（Phantom 风格）
//!
//! 只支持连接与断开；转账和余额查询报告 `UnsupportedOperation`。

use std::sync::Weak;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use super::{ProviderHandle, TransferRequest, WalletAdapter};
use crate::{
    domain::{
        asset::Asset,
        provider::{InjectedProvider, ProviderRpcError},
        wallet_family::WalletFamily,
    },
    error::ProviderError,
};

pub fn normalize_error(err: ProviderRpcError) -> ProviderError {
    match err {
        ProviderRpcError::Rpc { code, message } => match code {
            4001 | 4100 => ProviderError::UserRejected(message),
            -32601 | 4200 => ProviderError::UnsupportedOperation(message),
            _ => ProviderError::ProviderUnavailable(format!("{} (code {})", message, code)),
        },
        ProviderRpcError::MethodMissing(method) => {
            ProviderError::UnsupportedOperation(format!("provider does not expose {}", method))
        }
        ProviderRpcError::Transport(message) => ProviderError::ProviderUnavailable(message),
    }
}

pub struct SolanaAdapter {
    provider: ProviderHandle,
}

impl SolanaAdapter {
    pub fn new(provider: Weak<dyn InjectedProvider>) -> Self {
        Self {
            provider: ProviderHandle::new(provider, normalize_error),
        }
    }

    fn unsupported(operation: &str) -> ProviderError {
        ProviderError::UnsupportedOperation(format!("solana wallets do not support {}", operation))
    }
}

#[async_trait]
impl WalletAdapter for SolanaAdapter {
    fn family(&self) -> WalletFamily {
        WalletFamily::Solana
    }

    async fn connect(&self) -> Result<String, ProviderError> {
        let value = self.provider.call("connect", Value::Null).await?;
        // publicKey 可能是字符串，也可能是 { publicKey: "..." }
        let key = value.get("publicKey").unwrap_or(&value);
        key.as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ProviderUnavailable(format!("unexpected connect response: {}", value)))
    }

    async fn get_chain_id(&self) -> Result<String, ProviderError> {
        Ok(WalletFamily::Solana.default_network().to_string())
    }

    async fn request_transfer(&self, _request: &TransferRequest<'_>) -> Result<String, ProviderError> {
        Err(Self::unsupported("transfers"))
    }

    async fn get_native_balance(&self, _address: &str) -> Result<Decimal, ProviderError> {
        Err(Self::unsupported("balance queries"))
    }

    async fn get_token_balance(&self, _address: &str, _asset: &Asset) -> Result<Decimal, ProviderError> {
        Err(Self::unsupported("token balance queries"))
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.provider.call("disconnect", Value::Null).await?;
        Ok(())
    }
}
