//! 测试辅助模块
//! 脚本化的注入钱包与测试应用状态

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use splitpay::{
    app_state::AppState,
    config::{Config, DistributionConfig, NetworkConfig, ReconciliationConfig},
    domain::{
        asset::Asset,
        distribution::Recipient,
        provider::{InjectedProvider, ProviderRpcError},
        wallet_family::WalletFamily,
    },
    infrastructure::environment::InjectedEnvironment,
};

pub const ACCOUNT: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb6";
pub const USDT_CONTRACT: &str = "0x55d398326f99059ff775485246999027b3197955";

pub const RECIPIENT_A: &str = "0x1111111111111111111111111111111111111111";
pub const RECIPIENT_B: &str = "0x2222222222222222222222222222222222222222";
pub const RECIPIENT_C: &str = "0x3333333333333333333333333333333333333333";

/// 1 BNB（wei）
pub const ONE_NATIVE_WEI: &str = "0xde0b6b3a7640000";

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal")
}

pub fn usdt() -> Asset {
    Asset::Token {
        symbol: "USDT".into(),
        contract: USDT_CONTRACT.into(),
        decimals: 18,
    }
}

/// 三个收款方各 0.10
pub fn three_recipients() -> Vec<Recipient> {
    vec![
        Recipient::new(RECIPIENT_A, dec("0.10")),
        Recipient::new(RECIPIENT_B, dec("0.10")),
        Recipient::new(RECIPIENT_C, dec("0.10")),
    ]
}

/// ABI 编码的 uint256 返回值
pub fn abi_word(value: u128) -> String {
    format!("0x{:064x}", value)
}

/// 可编排的注入钱包
///
/// - 普通方法按方法名返回固定结果
/// - `eth_sendTransaction` 依次消费队列中的结果，队列为空时返回自增哈希
pub struct MockWallet {
    markers: HashSet<String>,
    responses: Mutex<HashMap<String, Result<Value, ProviderRpcError>>>,
    transfers: Mutex<VecDeque<Result<Value, ProviderRpcError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, Value)>>,
    next_hash: AtomicU64,
}

impl MockWallet {
    pub fn new(markers: &[&str]) -> Self {
        Self {
            markers: markers.iter().map(|m| m.to_string()).collect(),
            responses: Mutex::new(HashMap::new()),
            transfers: Mutex::new(VecDeque::new()),
            delays: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_hash: AtomicU64::new(1),
        }
    }

    /// 已授权账户、处于 BSC 且余额充足的 MetaMask
    pub fn metamask() -> Self {
        let wallet = Self::new(&["isMetaMask"]);
        wallet.respond("eth_requestAccounts", Ok(json!([ACCOUNT])));
        wallet.respond("eth_chainId", Ok(json!("0x38")));
        wallet.respond("wallet_switchEthereumChain", Ok(Value::Null));
        wallet.respond("wallet_revokePermissions", Ok(Value::Null));
        wallet.respond("eth_getBalance", Ok(json!(ONE_NATIVE_WEI)));
        wallet.respond("eth_call", Ok(json!(abi_word(100_000_000_000_000_000_000))));
        wallet
    }

    pub fn respond(&self, method: &str, result: Result<Value, ProviderRpcError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), result);
    }

    pub fn forget(&self, method: &str) {
        self.responses.lock().unwrap().remove(method);
    }

    /// 追加一次 `eth_sendTransaction` 的结果
    pub fn queue_transfer(&self, result: Result<Value, ProviderRpcError>) {
        self.transfers.lock().unwrap().push_back(result);
    }

    pub fn delay(&self, method: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(method.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params)
            .collect()
    }
}

pub fn user_rejected() -> ProviderRpcError {
    ProviderRpcError::Rpc {
        code: 4001,
        message: "User denied transaction signature".into(),
    }
}

#[async_trait]
impl InjectedProvider for MockWallet {
    fn has_marker(&self, marker: &str) -> bool {
        self.markers.contains(marker)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        let delay = self.delays.lock().unwrap().get(method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if method == "eth_sendTransaction" {
            let queued = self.transfers.lock().unwrap().pop_front();
            return queued.unwrap_or_else(|| {
                let n = self.next_hash.fetch_add(1, Ordering::SeqCst);
                Ok(json!(format!("0x{:064x}", n)))
            });
        }

        self.responses
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or_else(|| Err(ProviderRpcError::MethodMissing(method.to_string())))
    }
}

/// 不依赖环境变量的测试配置
pub fn test_config(recipients: Vec<Recipient>) -> Config {
    let mut config = Config::from_env().expect("config");
    config.network = NetworkConfig {
        evm_chain_id: Some("0x38".into()),
        bitcoin_network: None,
        solana_network: None,
    };
    config.distribution = DistributionConfig {
        family: WalletFamily::Evm,
        asset: usdt(),
        total: None,
        recipients,
    };
    config.reconciliation = ReconciliationConfig {
        settlement_delay_ms: 20,
    };
    config.providers = Vec::new();
    config.wallets = Vec::new();
    config
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub environment: Arc<InjectedEnvironment>,
}

impl TestApp {
    pub fn new(config: Config) -> Self {
        let environment = Arc::new(InjectedEnvironment::new());
        let state = Arc::new(AppState::with_environment(config, environment.clone()));
        Self { state, environment }
    }

    /// 在 `ethereum` 注入点安装钱包并完成一轮检测
    pub fn with_metamask(config: Config) -> (Self, Arc<MockWallet>) {
        let app = Self::new(config);
        let wallet = Arc::new(MockWallet::metamask());
        app.environment.install("ethereum", wallet.clone());
        app.state.registry.refresh();
        (app, wallet)
    }

    pub async fn connect_metamask(&self) {
        self.state
            .wallet_service
            .connect_wallet("metamask")
            .await
            .expect("connect metamask");
    }
}

/// 等待后台对账落定
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(120)).await;
}
