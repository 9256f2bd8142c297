//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{collections::HashMap, path::Path, str::FromStr};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        asset::{Asset, MAX_DECIMALS},
        distribution::{DistributionPolicy, Recipient},
        wallet_family::WalletFamily,
    },
    service::wallet_detector::{DeclaredWallet, MissingWalletPolicy},
    utils::address_validator::AddressValidator,
};

/// BSC 上的 USDT（BEP-20）
const DEFAULT_TOKEN_CONTRACT: &str = "0x55d398326f99059fF775485246999027B3197955";

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// 以 JSON-RPC 端点充当的注入提供者
    #[serde(default)]
    pub providers: Vec<ProviderEndpointConfig>,
    /// 部署方声明的备用钱包列表
    #[serde(default)]
    pub wallets: Vec<DeclaredWallet>,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// 期望网络配置；未设置的家族不做网络检查
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub evm_chain_id: Option<String>,
    pub bitcoin_network: Option<String>,
    pub solana_network: Option<String>,
}

/// 分发策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub family: WalletFamily,
    pub asset: Asset,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

/// 钱包检测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub interval_secs: u64,
    #[serde(default)]
    pub missing_policy: MissingWalletPolicy,
}

/// 分发成功后的余额对账配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    pub settlement_delay_ms: u64,
}

/// JSON-RPC 提供者端点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpointConfig {
    pub injection_point: String,
    pub rpc_url: String,
    #[serde(default)]
    pub markers: Vec<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            evm_chain_id: Some(std::env::var("EVM_CHAIN_ID").unwrap_or_else(|_| "0x38".into())),
            bitcoin_network: std::env::var("BITCOIN_NETWORK").ok(),
            solana_network: std::env::var("SOLANA_NETWORK").ok(),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        let recipients = std::env::var("DISTRIBUTION_RECIPIENTS")
            .ok()
            .map(|raw| parse_recipients(&raw))
            .unwrap_or_default();

        Self {
            family: WalletFamily::Evm,
            asset: Asset::Token {
                symbol: std::env::var("DISTRIBUTION_TOKEN_SYMBOL")
                    .unwrap_or_else(|_| "USDT".into()),
                contract: std::env::var("DISTRIBUTION_TOKEN_CONTRACT")
                    .unwrap_or_else(|_| DEFAULT_TOKEN_CONTRACT.into()),
                decimals: std::env::var("DISTRIBUTION_TOKEN_DECIMALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(18),
            },
            total: std::env::var("DISTRIBUTION_TOTAL")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok()),
            recipients,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval_secs: std::env::var("DETECTION_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            missing_policy: std::env::var("DETECTION_MISSING_POLICY")
                .ok()
                .and_then(|s| MissingWalletPolicy::from_str(&s).ok())
                .unwrap_or_default(),
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            settlement_delay_ms: std::env::var("SETTLEMENT_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5_000),
        }
    }
}

/// 解析 `addr:amount,addr:amount` 形式的收款方列表；无法解析的条目被跳过
fn parse_recipients(raw: &str) -> Vec<Recipient> {
    raw.split(',')
        .filter_map(|entry| {
            let (address, amount) = entry.trim().rsplit_once(':')?;
            match Decimal::from_str(amount.trim()) {
                Ok(amount) => Some(Recipient::new(address.trim(), amount)),
                Err(e) => {
                    tracing::warn!(entry = %entry, error = %e, "Skipping malformed recipient entry");
                    None
                }
            }
        })
        .collect()
}

impl NetworkConfig {
    /// 各家族的期望网络
    pub fn expected_networks(&self) -> HashMap<WalletFamily, String> {
        let mut map = HashMap::new();
        if let Some(id) = &self.evm_chain_id {
            map.insert(WalletFamily::Evm, id.clone());
        }
        if let Some(id) = &self.bitcoin_network {
            map.insert(WalletFamily::Bitcoin, id.clone());
        }
        if let Some(id) = &self.solana_network {
            map.insert(WalletFamily::Solana, id.clone());
        }
        map
    }
}

impl DistributionConfig {
    pub fn policy(&self) -> DistributionPolicy {
        DistributionPolicy {
            family: self.family,
            asset: self.asset.clone(),
            total: self.total,
            recipients: self.recipients.clone(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            network: NetworkConfig::default(),
            distribution: DistributionConfig::default(),
            detection: DetectionConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            providers: Vec::new(),
            wallets: Vec::new(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.detection.interval_secs == 0 {
            anyhow::bail!("detection.interval_secs must be greater than 0");
        }

        let asset = &self.distribution.asset;
        if asset.decimals() > MAX_DECIMALS {
            anyhow::bail!(
                "distribution asset decimals must not exceed {}, got {}",
                MAX_DECIMALS,
                asset.decimals()
            );
        }
        if let Some(contract) = asset.contract() {
            if !AddressValidator::validate(self.distribution.family, &contract.to_lowercase()) {
                anyhow::bail!("distribution asset contract is not a valid address: {}", contract);
            }
        }

        // 空列表允许启动，执行分发时再报错
        if self.distribution.recipients.is_empty() {
            tracing::warn!("No distribution recipients configured");
        } else {
            self.distribution
                .policy()
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid distribution policy: {}", e))?;
        }

        for provider in &self.providers {
            if !provider.rpc_url.starts_with("http://") && !provider.rpc_url.starts_with("https://")
            {
                anyhow::bail!(
                    "provider {} rpc_url must start with http:// or https://",
                    provider.injection_point
                );
            }
        }

        for wallet in &self.wallets {
            if wallet.name.trim().is_empty() {
                anyhow::bail!("declared wallet name must not be empty");
            }
        }

        Ok(())
    }
}
