//! Network module
//!
//! Provides the RPC client, per-wallet HTTP clients and the event bus for
//! progress reporting.

pub mod event_bus;
pub mod http;
pub mod rpc_client;

pub use event_bus::{Event, EventBus};
pub use rpc_client::{BalanceOracle, RpcManager, SignatureCheck};
