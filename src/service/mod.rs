pub mod adapters;
pub mod balance_reconciler;
pub mod connection_manager;
pub mod distribution_orchestrator;
pub mod wallet_detector; // 钱包检测 + 注册表
pub mod wallet_service;

pub use wallet_service::WalletService;
