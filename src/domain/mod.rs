//! Domain 模块
//!
//! 钱包、连接与分发的领域模型

pub mod asset;
pub mod connection_state;
pub mod distribution;
pub mod provider;
pub mod transaction_status;
pub mod wallet_descriptor;
pub mod wallet_family;

// 重新导出常用类型
pub use asset::{Asset, AmountError};
pub use connection_state::{ConnectionPhase, ConnectionState};
pub use distribution::{
    DistributionPolicy, DistributionStep, Recipient, TransactionResult, TransactionState,
};
pub use provider::{InjectedProvider, ProviderEnvironment, ProviderRpcError};
pub use transaction_status::{StepStatus, TransactionStatus};
pub use wallet_descriptor::WalletDescriptor;
pub use wallet_family::{KnownWallet, WalletFamily, KNOWN_WALLETS};
