pub mod environment;
pub mod json_rpc_provider;
pub mod logging;

pub use environment::InjectedEnvironment;
pub use json_rpc_provider::JsonRpcProvider;
