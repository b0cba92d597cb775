//! FOGO Swap Bot Library
//!
//! Components for running a fleet of testnet wallets through repeated DEX
//! swaps, with faucet funding and paymaster submission fallbacks.

pub mod agent;
pub mod config;
pub mod execution;
pub mod faucet;
pub mod network;
pub mod state;
pub mod telemetry;
pub mod utils;

// Re-export main types
pub use agent::{FleetRunner, SwapOrchestrator, SwapOutcome, WorkerLoop};
pub use config::AppConfig;
pub use faucet::FundingAcquirer;
pub use network::{Event, EventBus, RpcManager};
pub use state::FleetProgress;
pub use utils::types::{FleetStats, Wallet, WalletRunStats};
