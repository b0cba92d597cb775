//! Common types used throughout the application

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::fmt;
use std::time::Duration;

use crate::utils::helpers::{safe_div, truncate_address};

/// A wallet loaded from the credential file. Immutable for the whole run.
pub struct Wallet {
    index: usize,
    keypair: Keypair,
}

impl Wallet {
    pub fn new(index: usize, keypair: Keypair) -> Self {
        Self { index, keypair }
    }

    /// 1-based position in the credential file, used as the worker id
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.keypair.sign_message(message)
    }

    /// Short form of the address for log lines
    pub fn short(&self) -> String {
        truncate_address(&self.pubkey().to_string(), 6)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("index", &self.index)
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

/// Direction of the fixed swap pair (mint A = native token, mint B = stable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    AForB,
    BForA,
}

impl SwapDirection {
    pub fn a_for_b(&self) -> bool {
        matches!(self, SwapDirection::AForB)
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::AForB => write!(f, "A->B"),
            SwapDirection::BForA => write!(f, "B->A"),
        }
    }
}

/// Per-wallet accumulator, owned by exactly one worker loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct WalletRunStats {
    pub worker_id: usize,
    pub wallet: String,
    pub planned: u32,
    pub successful: u32,
    pub failed: u32,
    /// Sum of input amounts of successful swaps, in lamports
    pub volume: u64,
    /// Traceable submission signatures, in operation order
    pub references: Vec<String>,
    /// Loop stopped early on shutdown
    pub interrupted: bool,
}

impl WalletRunStats {
    pub fn new(worker_id: usize, wallet: impl Into<String>, planned: u32) -> Self {
        Self {
            worker_id,
            wallet: wallet.into(),
            planned,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, amount_in: u64, reference: Option<String>) {
        self.successful += 1;
        self.volume += amount_in;
        if let Some(reference) = reference {
            self.references.push(reference);
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Operations with a recorded outcome
    pub fn attempts(&self) -> u32 {
        self.successful + self.failed
    }

    pub fn failure_rate(&self) -> f64 {
        safe_div(self.failed as f64, self.attempts() as f64)
    }

    /// Success percentage over recorded attempts
    pub fn success_rate_pct(&self) -> f64 {
        safe_div(self.successful as f64, self.attempts() as f64) * 100.0
    }
}

/// Derived per-wallet report row
#[derive(Debug, Clone, Serialize)]
pub struct WalletEfficiency {
    pub worker_id: usize,
    pub success_rate_pct: f64,
    pub volume_per_swap: u64,
    pub total_volume: u64,
    pub swaps_per_minute: f64,
}

/// Fleet totals, assembled once after every worker has joined
#[derive(Debug, Clone, Serialize)]
pub struct FleetStats {
    pub wallets: Vec<WalletRunStats>,
    pub swaps_per_wallet: u32,
    pub total_successful: u32,
    pub total_failed: u32,
    pub total_volume: u64,
    pub elapsed: Duration,
}

impl FleetStats {
    pub fn aggregate(wallets: Vec<WalletRunStats>, swaps_per_wallet: u32, elapsed: Duration) -> Self {
        let total_successful = wallets.iter().map(|w| w.successful).sum();
        let total_failed = wallets.iter().map(|w| w.failed).sum();
        let total_volume = wallets.iter().map(|w| w.volume).sum();

        Self {
            wallets,
            swaps_per_wallet,
            total_successful,
            total_failed,
            total_volume,
            elapsed,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.wallets.len()
    }

    /// Swaps the run was configured to attempt
    pub fn planned_swaps(&self) -> u64 {
        self.worker_count() as u64 * self.swaps_per_wallet as u64
    }

    pub fn success_rate_pct(&self) -> f64 {
        safe_div(self.total_successful as f64, self.planned_swaps() as f64) * 100.0
    }

    pub fn interrupted(&self) -> bool {
        self.wallets.iter().any(|w| w.interrupted)
    }

    pub fn efficiency(&self) -> Vec<WalletEfficiency> {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        let mut rows: Vec<WalletEfficiency> = self
            .wallets
            .iter()
            .map(|w| WalletEfficiency {
                worker_id: w.worker_id,
                success_rate_pct: safe_div(w.successful as f64, self.swaps_per_wallet as f64) * 100.0,
                volume_per_swap: if w.successful > 0 { w.volume / w.successful as u64 } else { 0 },
                total_volume: w.volume,
                swaps_per_minute: safe_div(w.successful as f64, minutes),
            })
            .collect();
        rows.sort_by(|a, b| b.success_rate_pct.total_cmp(&a.success_rate_pct));
        rows
    }
}
