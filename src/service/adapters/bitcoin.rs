//! Bitcoin 适配器（sats-connect 风格，Xverse）

use std::sync::{RwLock, Weak};

use async_trait::async_trait;
use ethers::types::U256;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::{invalid_amount, unexpected_response, ProviderHandle, TransferRequest, WalletAdapter};
use crate::{
    domain::{
        asset::{self, Asset},
        provider::{InjectedProvider, ProviderRpcError},
        wallet_family::WalletFamily,
    },
    error::ProviderError,
};

const SATS_DECIMALS: u32 = 8;

/// sats-connect 错误码归一化
pub fn normalize_error(err: ProviderRpcError) -> ProviderError {
    match err {
        ProviderRpcError::Rpc { code, message } => match code {
            // -32000 用户拒绝；-32002 访问被拒
            -32000 | -32002 => ProviderError::UserRejected(message),
            -32001 | -32601 => ProviderError::UnsupportedOperation(message),
            _ => ProviderError::ProviderUnavailable(format!("{} (code {})", message, code)),
        },
        ProviderRpcError::MethodMissing(method) => {
            ProviderError::UnsupportedOperation(format!("provider does not expose {}", method))
        }
        ProviderRpcError::Transport(message) => ProviderError::ProviderUnavailable(message),
    }
}

/// 取 payment 用途的地址；兼容数组与 `{ addresses: [...] }` 两种返回
fn payment_address(value: &Value) -> Option<String> {
    let accounts = value
        .as_array()
        .or_else(|| value.get("addresses").and_then(Value::as_array))?;

    accounts
        .iter()
        .find(|a| a.get("purpose").and_then(Value::as_str) == Some("payment"))
        .or_else(|| accounts.first())
        .and_then(|a| a.get("address"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// 聪数可能是数字或十进制字符串
fn parse_sats(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => U256::from_dec_str(s.trim()).ok(),
        _ => None,
    }
}

/// bech32 地址不区分大小写，base58 地址区分
fn same_address(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    a == b || (a.to_ascii_lowercase().starts_with("bc1") && a.eq_ignore_ascii_case(b))
}

pub struct BitcoinAdapter {
    provider: ProviderHandle,
    /// `getBalance` 只返回已授权账户的余额
    account: RwLock<Option<String>>,
}

impl BitcoinAdapter {
    pub fn new(provider: Weak<dyn InjectedProvider>) -> Self {
        Self {
            provider: ProviderHandle::new(provider, normalize_error),
            account: RwLock::new(None),
        }
    }

    fn is_account(&self, address: &str) -> bool {
        self.account
            .read()
            .map(|account| account.as_deref().is_some_and(|a| same_address(a, address)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl WalletAdapter for BitcoinAdapter {
    fn family(&self) -> WalletFamily {
        WalletFamily::Bitcoin
    }

    async fn connect(&self) -> Result<String, ProviderError> {
        let value = self
            .provider
            .call("getAccounts", json!({ "purposes": ["payment"] }))
            .await?;
        let address = payment_address(&value).ok_or_else(|| {
            ProviderError::ProviderUnavailable("wallet returned no payment address".to_string())
        })?;

        if let Ok(mut account) = self.account.write() {
            *account = Some(address.clone());
        }
        Ok(address)
    }

    /// 旧版钱包没有 `wallet_getNetwork`，此时按主网处理
    async fn get_chain_id(&self) -> Result<String, ProviderError> {
        match self.provider.call("wallet_getNetwork", Value::Null).await {
            Ok(value) => Ok(value
                .pointer("/bitcoin/name")
                .and_then(Value::as_str)
                .map(|name| format!("bitcoin:{}", name.to_lowercase()))
                .unwrap_or_else(|| WalletFamily::Bitcoin.default_network().to_string())),
            Err(ProviderError::UnsupportedOperation(_)) => {
                Ok(WalletFamily::Bitcoin.default_network().to_string())
            }
            Err(e) => Err(e),
        }
    }

    async fn request_transfer(&self, request: &TransferRequest<'_>) -> Result<String, ProviderError> {
        if !request.asset.is_native() {
            return Err(ProviderError::UnsupportedOperation(format!(
                "bitcoin wallets cannot transfer token {}",
                request.asset.symbol()
            )));
        }

        let sats = asset::to_base_units(request.amount, SATS_DECIMALS).map_err(invalid_amount)?;
        let amount = u64::try_from(sats).map_err(|_| {
            ProviderError::UnsupportedOperation(format!("amount {} out of range", request.amount))
        })?;

        let value = self
            .provider
            .call(
                "sendTransfer",
                json!({ "recipients": [{ "address": request.recipient, "amount": amount }] }),
            )
            .await?;

        value
            .get("txid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| unexpected_response("sendTransfer", &value))
    }

    async fn get_native_balance(&self, address: &str) -> Result<Decimal, ProviderError> {
        if !self.is_account(address) {
            return Err(ProviderError::UnsupportedOperation(format!(
                "bitcoin wallets only report the balance of the connected account, not {}",
                address
            )));
        }

        let value = self.provider.call("getBalance", Value::Null).await?;
        let sats = value
            .get("total")
            .and_then(parse_sats)
            .ok_or_else(|| unexpected_response("getBalance", &value))?;
        asset::from_base_units(sats, SATS_DECIMALS).map_err(invalid_amount)
    }

    async fn get_token_balance(&self, address: &str, asset: &Asset) -> Result<Decimal, ProviderError> {
        if asset.is_native() {
            return self.get_native_balance(address).await;
        }
        Err(ProviderError::UnsupportedOperation(format!(
            "bitcoin wallets do not hold token {}",
            asset.symbol()
        )))
    }
}
