//! 钱包家族与已知注入点注册表
//!
//! 检测器按固定顺序探测这些注入点；家族标签在检测时确定并随描述符携带，
//! 之后由适配器注册表按标签选择实现，调用方不再按钱包形态分支。

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// 钱包家族（决定使用哪个适配器）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletFamily {
    /// EIP-1193 提供者（MetaMask、Trust、Coinbase、SafePal）
    Evm,
    /// sats-connect 风格提供者（Xverse）
    Bitcoin,
    /// Phantom 风格提供者
    Solana,
}

impl WalletFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Bitcoin => "bitcoin",
            Self::Solana => "solana",
        }
    }

    /// 提供者无法报告网络时使用的默认网络标识
    pub fn default_network(&self) -> &'static str {
        match self {
            Self::Evm => "0x1",
            Self::Bitcoin => "bitcoin:mainnet",
            Self::Solana => "solana:mainnet-beta",
        }
    }
}

impl fmt::Display for WalletFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已知钱包的注入点定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownWallet {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub family: WalletFamily,
    /// 环境中的注入路径，例如 `ethereum`、`phantom.solana`
    pub injection_point: &'static str,
    /// 注入对象必须暴露的标记字段；`None` 表示存在即可
    pub marker: Option<&'static str>,
}

/// 探测顺序即展示顺序
pub static KNOWN_WALLETS: &[KnownWallet] = &[
    KnownWallet {
        id: "metamask",
        name: "MetaMask",
        icon: "🦊",
        family: WalletFamily::Evm,
        injection_point: "ethereum",
        marker: Some("isMetaMask"),
    },
    KnownWallet {
        id: "trustwallet",
        name: "Trust Wallet",
        icon: "🔷",
        family: WalletFamily::Evm,
        injection_point: "ethereum",
        marker: Some("isTrust"),
    },
    KnownWallet {
        id: "xverse",
        name: "Xverse",
        icon: "⚡",
        family: WalletFamily::Bitcoin,
        injection_point: "XverseProviders.BitcoinProvider",
        marker: None,
    },
    KnownWallet {
        id: "safepal",
        name: "SafePal",
        icon: "🛡️",
        family: WalletFamily::Evm,
        injection_point: "safepalProvider",
        marker: None,
    },
    KnownWallet {
        id: "phantom",
        name: "Phantom",
        icon: "👻",
        family: WalletFamily::Solana,
        injection_point: "phantom.solana",
        marker: None,
    },
    KnownWallet {
        id: "coinbase",
        name: "Coinbase Wallet",
        icon: "🔵",
        family: WalletFamily::Evm,
        injection_point: "ethereum",
        marker: Some("isCoinbaseWallet"),
    },
];

static KNOWN_BY_ID: Lazy<HashMap<&'static str, &'static KnownWallet>> =
    Lazy::new(|| KNOWN_WALLETS.iter().map(|w| (w.id, w)).collect());

/// 按 id 查找已知钱包
pub fn known_wallet(id: &str) -> Option<&'static KnownWallet> {
    KNOWN_BY_ID.get(id).copied()
}
