//! EVM 适配器（EIP-1193）
//!
//! MetaMask、Trust Wallet、Coinbase Wallet、SafePal 共用。
//! ERC-20 转账与余额查询手工拼 ABI 调用数据，签名交给钱包完成。

use std::{str::FromStr, sync::Weak};

use async_trait::async_trait;
use ethers::{
    abi::{encode, Token},
    types::{Address, U256},
};
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

const NATIVE_DECIMALS: u32 = 18;

/// EIP-1193 错误码归一化
pub fn normalize_error(err: ProviderRpcError) -> ProviderError {
    match err {
        ProviderRpcError::Rpc { code, message } => match code {
            // 4001 用户拒绝；4100 未授权
            4001 | 4100 => ProviderError::UserRejected(message),
            4200 | -32601 => ProviderError::UnsupportedOperation(message),
            // 4901 链未连接；4902 钱包未添加该链
            4901 | 4902 => ProviderError::NetworkMismatch(message),
            _ => ProviderError::ProviderUnavailable(format!("{} (code {})", message, code)),
        },
        ProviderRpcError::MethodMissing(method) => {
            ProviderError::UnsupportedOperation(format!("provider does not expose {}", method))
        }
        ProviderRpcError::Transport(message) => ProviderError::ProviderUnavailable(message),
    }
}

fn selector(sig: &str) -> [u8; 4] {
    let hash = ethers::utils::keccak256(sig.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn encode_call(sig: &str, args: Vec<Token>) -> String {
    let mut out = Vec::with_capacity(4 + 32 * args.len());
    out.extend_from_slice(&selector(sig));
    out.extend_from_slice(&encode(&args));
    format!("0x{}", hex::encode(out))
}

fn parse_address(address: &str) -> Result<Address, ProviderError> {
    Address::from_str(address).map_err(|_| {
        ProviderError::UnsupportedOperation(format!("invalid EVM address: {}", address))
    })
}

fn parse_quantity(method: &str, value: &Value) -> Result<U256, ProviderError> {
    let raw = value.as_str().ok_or_else(|| unexpected_response(method, value))?;
    let hex_part = raw.trim().strip_prefix("0x").unwrap_or(raw.trim());
    if hex_part.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(hex_part, 16).map_err(|_| unexpected_response(method, value))
}

fn parse_u256_from_abi_word(method: &str, value: &Value) -> Result<U256, ProviderError> {
    let raw = value.as_str().ok_or_else(|| unexpected_response(method, value))?;
    let hex_part = raw.trim().strip_prefix("0x").unwrap_or(raw.trim());
    let bytes = hex::decode(hex_part).map_err(|_| unexpected_response(method, value))?;
    if bytes.len() < 32 {
        return Err(unexpected_response(method, value));
    }
    Ok(U256::from_big_endian(&bytes[..32]))
}

/// 统一为小写十六进制（`0x38`）；钱包可能返回十六进制字符串、十进制字符串或数字
pub fn normalize_chain_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex_part) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u64::from_str_radix(hex_part, 16).ok().map(|n| format!("{:#x}", n))
            } else {
                s.parse::<u64>().ok().map(|n| format!("{:#x}", n))
            }
        }
        Value::Number(n) => n.as_u64().map(|n| format!("{:#x}", n)),
        _ => None,
    }
}

pub struct EvmAdapter {
    provider: ProviderHandle,
}

impl EvmAdapter {
    pub fn new(provider: Weak<dyn InjectedProvider>) -> Self {
        Self {
            provider: ProviderHandle::new(provider, normalize_error),
        }
    }
}

#[async_trait]
impl WalletAdapter for EvmAdapter {
    fn family(&self) -> WalletFamily {
        WalletFamily::Evm
    }

    async fn connect(&self) -> Result<String, ProviderError> {
        let accounts = self.provider.call("eth_requestAccounts", json!([])).await?;
        accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ProviderUnavailable("wallet returned no accounts".to_string()))
    }

    async fn get_chain_id(&self) -> Result<String, ProviderError> {
        let value = self.provider.call("eth_chainId", json!([])).await?;
        normalize_chain_id(&value).ok_or_else(|| unexpected_response("eth_chainId", &value))
    }

    async fn switch_network(&self, chain_id: &str) -> Result<(), ProviderError> {
        self.provider
            .call("wallet_switchEthereumChain", json!([{ "chainId": chain_id }]))
            .await?;
        Ok(())
    }

    async fn request_transfer(&self, request: &TransferRequest<'_>) -> Result<String, ProviderError> {
        let units = asset::to_base_units(request.amount, request.asset.decimals())
            .map_err(invalid_amount)?;

        let tx = match request.asset {
            Asset::Native { .. } => json!({
                "from": request.from,
                "to": request.recipient,
                "value": format!("{:#x}", units),
            }),
            Asset::Token { contract, .. } => {
                let to = parse_address(request.recipient)?;
                let data = encode_call(
                    "transfer(address,uint256)",
                    vec![Token::Address(to), Token::Uint(units)],
                );
                json!({
                    "from": request.from,
                    "to": contract,
                    "data": data,
                })
            }
        };

        let hash = self.provider.call("eth_sendTransaction", json!([tx])).await?;
        hash.as_str()
            .map(str::to_string)
            .ok_or_else(|| unexpected_response("eth_sendTransaction", &hash))
    }

    async fn get_native_balance(&self, address: &str) -> Result<Decimal, ProviderError> {
        let value = self
            .provider
            .call("eth_getBalance", json!([address, "latest"]))
            .await?;
        let wei = parse_quantity("eth_getBalance", &value)?;
        asset::from_base_units(wei, NATIVE_DECIMALS).map_err(invalid_amount)
    }

    async fn get_token_balance(&self, address: &str, asset: &Asset) -> Result<Decimal, ProviderError> {
        let contract = match asset {
            Asset::Native { .. } => return self.get_native_balance(address).await,
            Asset::Token { contract, .. } => contract,
        };

        let owner = parse_address(address)?;
        let data = encode_call("balanceOf(address)", vec![Token::Address(owner)]);
        let value = self
            .provider
            .call("eth_call", json!([{ "to": contract, "data": data }, "latest"]))
            .await?;

        let units = parse_u256_from_abi_word("eth_call", &value)?;
        asset::from_base_units(units, asset.decimals()).map_err(invalid_amount)
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.provider
            .call("wallet_revokePermissions", json!([{ "eth_accounts": {} }]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::service::adapters::tests_support::Scripted;

    const FROM: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb6";
    const TO: &str = "0x8ba1f109551bd432803012645ac136ddd64dba72";

    fn usdt() -> Asset {
        Asset::Token {
            symbol: "USDT".into(),
            contract: "0x55d398326f99059fF775485246999027B3197955".into(),
            decimals: 18,
        }
    }

    #[test]
    fn test_error_normalization() {
        let rpc = |code| ProviderRpcError::Rpc { code, message: "m".into() };

        assert!(matches!(normalize_error(rpc(4001)), ProviderError::UserRejected(_)));
        assert!(matches!(normalize_error(rpc(4100)), ProviderError::UserRejected(_)));
        assert!(matches!(normalize_error(rpc(4200)), ProviderError::UnsupportedOperation(_)));
        assert!(matches!(normalize_error(rpc(4902)), ProviderError::NetworkMismatch(_)));
        assert!(matches!(normalize_error(rpc(4900)), ProviderError::ProviderUnavailable(_)));
        assert!(matches!(
            normalize_error(ProviderRpcError::Transport("down".into())),
            ProviderError::ProviderUnavailable(_)
        ));
    }

    #[test]
    fn test_normalize_chain_id() {
        assert_eq!(normalize_chain_id(&json!("0x38")).as_deref(), Some("0x38"));
        assert_eq!(normalize_chain_id(&json!("0X38")).as_deref(), Some("0x38"));
        assert_eq!(normalize_chain_id(&json!("56")).as_deref(), Some("0x38"));
        assert_eq!(normalize_chain_id(&json!(56)).as_deref(), Some("0x38"));
        assert_eq!(normalize_chain_id(&json!(null)), None);
    }

    #[test]
    fn test_transfer_calldata() {
        let to = Address::from_str(TO).unwrap();
        let data = encode_call(
            "transfer(address,uint256)",
            vec![Token::Address(to), Token::Uint(U256::exp10(17))],
        );
        // transfer(address,uint256) 的函数选择器
        assert!(data.starts_with("0xa9059cbb"));
        assert_eq!(data.len(), 2 + 8 + 64 * 2);
    }

    #[tokio::test]
    async fn test_token_transfer_request() {
        let provider = Arc::new(Scripted::default().respond("eth_sendTransaction", Ok(json!("0xhash1"))));
        let dyn_provider: Arc<dyn InjectedProvider> = provider.clone();
        let adapter = EvmAdapter::new(Arc::downgrade(&dyn_provider));

        let asset = usdt();
        let hash = adapter
            .request_transfer(&TransferRequest {
                from: FROM,
                recipient: TO,
                amount: Decimal::from_str("0.10").unwrap(),
                asset: &asset,
            })
            .await
            .unwrap();
        assert_eq!(hash, "0xhash1");

        let calls = provider.calls();
        let (method, params) = &calls[0];
        assert_eq!(method, "eth_sendTransaction");
        assert_eq!(params[0]["to"], json!("0x55d398326f99059fF775485246999027B3197955"));
        assert!(params[0]["data"].as_str().unwrap().starts_with("0xa9059cbb"));
    }

    #[tokio::test]
    async fn test_balances() {
        let balance_word = format!("0x{:064x}", 1_500_000_000_000_000_000u128);
        let provider = Arc::new(
            Scripted::default()
                .respond("eth_getBalance", Ok(json!("0xde0b6b3a7640000")))
                .respond("eth_call", Ok(json!(balance_word))),
        );
        let dyn_provider: Arc<dyn InjectedProvider> = provider.clone();
        let adapter = EvmAdapter::new(Arc::downgrade(&dyn_provider));

        let native = adapter.get_native_balance(FROM).await.unwrap();
        assert_eq!(native, Decimal::ONE);

        let token = adapter.get_token_balance(FROM, &usdt()).await.unwrap();
        assert_eq!(token, Decimal::from_str("1.5").unwrap());
    }

    #[tokio::test]
    async fn test_connect_without_accounts() {
        let provider = Arc::new(Scripted::default().respond("eth_requestAccounts", Ok(json!([]))));
        let dyn_provider: Arc<dyn InjectedProvider> = provider.clone();
        let adapter = EvmAdapter::new(Arc::downgrade(&dyn_provider));

        let err = adapter.connect().await.unwrap_err();
        assert!(matches!(err, ProviderError::ProviderUnavailable(_)));
    }
}
