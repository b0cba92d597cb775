//! Shared helpers, domain types and error types

pub mod error;
pub mod helpers;
pub mod types;

pub use error::{SwapError, SwapResult};
pub use types::{FleetStats, SwapDirection, Wallet, WalletRunStats};
