//! 连接状态机
//!
//! Disconnected → Connecting → Connected → Disconnected；连接失败时 Connecting → Disconnected。
//! 进程内只有一个活跃连接。每次开始连接或断开都会推进连接纪元，
//! 持有旧纪元的异步工作（进行中的连接、余额对账）在写回前被丢弃。

use std::{collections::HashMap, sync::Arc};

use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    domain::{
        asset::format_amount,
        connection_state::{ConnectionPhase, ConnectionState},
        wallet_descriptor::WalletDescriptor,
        wallet_family::WalletFamily,
    },
    error::ConnectError,
    metrics,
    service::adapters::{evm::normalize_chain_id, AdapterRegistry, WalletAdapter},
};

/// 已建立的连接
#[derive(Clone)]
pub struct ActiveSession {
    pub epoch: u64,
    pub wallet_id: String,
    pub wallet_name: String,
    pub family: WalletFamily,
    pub address: String,
    pub chain_id: String,
    pub adapter: Arc<dyn WalletAdapter>,
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("epoch", &self.epoch)
            .field("wallet_id", &self.wallet_id)
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

struct ConnectionInner {
    phase: ConnectionPhase,
    state: ConnectionState,
    session: Option<ActiveSession>,
    epoch: u64,
}

pub struct ConnectionManager {
    adapters: AdapterRegistry,
    expected_networks: HashMap<WalletFamily, String>,
    inner: RwLock<ConnectionInner>,
}

/// 网络标识规范化：EVM 链号统一为小写十六进制，其余转小写
pub fn normalize_network_id(id: &str) -> String {
    normalize_chain_id(&Value::String(id.to_string())).unwrap_or_else(|| id.trim().to_lowercase())
}

impl ConnectionManager {
    pub fn new(adapters: AdapterRegistry, expected_networks: HashMap<WalletFamily, String>) -> Self {
        Self {
            adapters,
            expected_networks,
            inner: RwLock::new(ConnectionInner {
                phase: ConnectionPhase::Disconnected,
                state: ConnectionState::initial(),
                session: None,
                epoch: 0,
            }),
        }
    }

    /// 连接钱包
    ///
    /// 成功后状态为 Connected 且地址、网络、钱包名均非空；失败后回到 Disconnected。
    pub async fn connect(&self, descriptor: &WalletDescriptor) -> Result<ConnectionState, ConnectError> {
        let epoch = {
            let mut inner = self.inner.write().await;
            match inner.phase {
                ConnectionPhase::Connecting => return Err(ConnectError::AlreadyConnecting),
                ConnectionPhase::Connected => {
                    let name = inner.state.wallet_name.clone().unwrap_or_default();
                    return Err(ConnectError::AlreadyConnected(name));
                }
                ConnectionPhase::Disconnected => {
                    inner.epoch += 1;
                    inner.phase = ConnectionPhase::Connecting;
                    inner.epoch
                }
            }
        };

        metrics::inc_connect_attempt(&descriptor.id);
        tracing::info!(wallet = %descriptor.name, family = %descriptor.family, epoch = epoch, "Connecting wallet");

        let result = self.establish(descriptor).await;

        let mut inner = self.inner.write().await;

        // 连接期间发生了断开
        if inner.epoch != epoch || inner.phase != ConnectionPhase::Connecting {
            metrics::inc_connect_failure("Aborted");
            tracing::warn!(wallet = %descriptor.name, epoch = epoch, "Connection aborted by disconnect");
            return Err(ConnectError::Aborted);
        }

        match result {
            Ok((adapter, address, chain_id)) => {
                let state =
                    ConnectionState::connected(address.clone(), chain_id.clone(), descriptor.name.clone());
                inner.phase = ConnectionPhase::Connected;
                inner.state = state.clone();
                inner.session = Some(ActiveSession {
                    epoch,
                    wallet_id: descriptor.id.clone(),
                    wallet_name: descriptor.name.clone(),
                    family: descriptor.family,
                    address: address.clone(),
                    chain_id: chain_id.clone(),
                    adapter,
                });

                tracing::info!(
                    wallet = %descriptor.name,
                    address = %address,
                    chain_id = %chain_id,
                    "Wallet connected"
                );
                Ok(state)
            }
            Err(e) => {
                inner.phase = ConnectionPhase::Disconnected;
                inner.state = ConnectionState::initial();
                inner.session = None;

                metrics::inc_connect_failure(connect_error_kind(&e));
                tracing::warn!(wallet = %descriptor.name, error = %e, "Wallet connection failed");
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        descriptor: &WalletDescriptor,
    ) -> Result<(Arc<dyn WalletAdapter>, String, String), ConnectError> {
        let adapter = self.adapters.adapter_for(descriptor)?;
        let address = adapter.connect().await?;
        let mut chain_id = adapter.get_chain_id().await?;

        if let Some(expected) = self.expected_networks.get(&descriptor.family) {
            let expected = normalize_network_id(expected);
            if normalize_network_id(&chain_id) != expected {
                tracing::info!(
                    wallet = %descriptor.name,
                    current = %chain_id,
                    expected = %expected,
                    "Requesting network switch"
                );

                adapter.switch_network(&expected).await.map_err(|e| {
                    ConnectError::NetworkMismatch(format!(
                        "wallet is on {} but {} is required: {}",
                        chain_id,
                        expected,
                        e.message()
                    ))
                })?;
                chain_id = expected;
            }
        }

        Ok((adapter, address, normalize_network_id(&chain_id)))
    }

    /// 断开连接；任何状态下都返回初始状态
    ///
    /// 提供者自身的断开调用只是尽力而为，失败不影响结果。
    pub async fn disconnect(&self) -> ConnectionState {
        let (session, was) = {
            let mut inner = self.inner.write().await;
            let was = inner.phase;
            if was != ConnectionPhase::Disconnected {
                inner.epoch += 1;
            }
            inner.phase = ConnectionPhase::Disconnected;
            inner.state = ConnectionState::initial();
            (inner.session.take(), was)
        };

        if was != ConnectionPhase::Disconnected {
            metrics::inc_disconnect();
            tracing::info!(previous = was.as_str(), "Wallet disconnected");
        }

        if let Some(session) = session {
            if let Err(e) = session.adapter.disconnect().await {
                tracing::debug!(wallet = %session.wallet_name, error = %e, "Provider disconnect failed");
            }
        }

        ConnectionState::initial()
    }

    pub async fn snapshot(&self) -> ConnectionState {
        self.inner.read().await.state.clone()
    }

    pub async fn phase(&self) -> ConnectionPhase {
        self.inner.read().await.phase
    }

    pub async fn session(&self) -> Option<ActiveSession> {
        self.inner.read().await.session.clone()
    }

    /// 纪元是否仍对应当前活跃连接
    pub async fn is_current(&self, epoch: u64) -> bool {
        let inner = self.inner.read().await;
        inner.phase == ConnectionPhase::Connected && inner.epoch == epoch
    }

    /// 写回余额；连接已变化时丢弃并返回 false
    pub async fn apply_balances(
        &self,
        epoch: u64,
        native: Option<Decimal>,
        token: Option<Decimal>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        if inner.phase != ConnectionPhase::Connected || inner.epoch != epoch {
            return false;
        }

        if let Some(native) = native {
            inner.state.native_balance = format_amount(native);
        }
        if let Some(token) = token {
            inner.state.token_balance = format_amount(token);
        }
        true
    }
}

fn connect_error_kind(err: &ConnectError) -> &'static str {
    match err {
        ConnectError::UserRejected(_) => "UserRejected",
        ConnectError::ProviderUnavailable(_) => "ProviderUnavailable",
        ConnectError::NetworkMismatch(_) => "NetworkMismatch",
        ConnectError::AlreadyConnecting => "AlreadyConnecting",
        ConnectError::AlreadyConnected(_) => "AlreadyConnected",
        ConnectError::UnknownWallet(_) => "UnknownWallet",
        ConnectError::Aborted => "Aborted",
    }
}
