//! 连接状态
//!
//! 进程内只存在一个活跃连接。未连接时地址、网络与钱包名必须全部为空。

use serde::{Deserialize, Serialize};

/// 初始余额展示值
pub const INITIAL_BALANCE: &str = "0.00";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub address: Option<String>,
    pub chain_id: Option<String>,
    pub wallet_name: Option<String>,
    pub native_balance: String,
    pub token_balance: String,
}

impl ConnectionState {
    /// 进程启动时与断开后的状态
    pub fn initial() -> Self {
        Self {
            is_connected: false,
            address: None,
            chain_id: None,
            wallet_name: None,
            native_balance: INITIAL_BALANCE.to_string(),
            token_balance: INITIAL_BALANCE.to_string(),
        }
    }

    pub fn connected(
        address: impl Into<String>,
        chain_id: impl Into<String>,
        wallet_name: impl Into<String>,
    ) -> Self {
        Self {
            is_connected: true,
            address: Some(address.into()),
            chain_id: Some(chain_id.into()),
            wallet_name: Some(wallet_name.into()),
            native_balance: INITIAL_BALANCE.to_string(),
            token_balance: INITIAL_BALANCE.to_string(),
        }
    }

    /// 不变量：未连接 ⇒ 地址、网络、钱包名均为空；已连接 ⇒ 均非空
    pub fn is_consistent(&self) -> bool {
        if self.is_connected {
            self.address.is_some() && self.chain_id.is_some() && self.wallet_name.is_some()
        } else {
            self.address.is_none() && self.chain_id.is_none() && self.wallet_name.is_none()
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// 连接状态机阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionPhase::*;

        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        )
    }
}
