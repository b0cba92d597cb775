//! Configuration module
//!
//! Handles loading and validation of the application configuration.
//! Every section defaults to the FOGO testnet deployment, so a config file
//! only needs to list what differs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::utils::types::SwapDirection;

pub const NATIVE_TOKEN_SYMBOL: &str = "FOGO";
pub const NATIVE_TOKEN_DECIMALS: u32 = 9;
pub const LAMPORTS_PER_TOKEN: u64 = 1_000_000_000;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub dex: DexConfig,
    #[serde(default)]
    pub paymaster: PaymasterConfig,
    #[serde(default)]
    pub funding: FundingConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub wallets: WalletsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            dex: DexConfig::default(),
            paymaster: PaymasterConfig::default(),
            funding: FundingConfig::default(),
            swap: SwapConfig::default(),
            worker: WorkerConfig::default(),
            wallets: WalletsConfig::default(),
            http: HttpConfig::default(),
            telemetry: TelemetryConfig::default(),
            explorer_url: default_explorer_url(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to built-in defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No config file at {:?}, using built-in defaults", path);
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.swap.amounts.is_empty(),
            "swap.amounts must not be empty"
        );
        anyhow::ensure!(
            self.swap.amounts.len() == self.swap.weights.len(),
            "swap.amounts and swap.weights must have the same length"
        );
        anyhow::ensure!(
            self.swap.weights.iter().all(|w| *w >= 0.0) && self.swap.weights.iter().any(|w| *w > 0.0),
            "swap.weights must be non-negative with at least one positive weight"
        );
        anyhow::ensure!(
            self.swap.adjusted_fraction > 0.0 && self.swap.adjusted_fraction <= 1.0,
            "swap.adjusted_fraction must be between 0 and 1"
        );
        anyhow::ensure!(self.worker.swaps_per_wallet > 0, "worker.swaps_per_wallet must be positive");
        anyhow::ensure!(
            self.worker.min_delay_secs >= 0.0 && self.worker.max_delay_secs >= 0.0,
            "worker delays must be non-negative"
        );
        anyhow::ensure!(
            self.worker.min_delay_secs <= self.worker.max_delay_secs,
            "worker.min_delay_secs cannot exceed worker.max_delay_secs"
        );
        anyhow::ensure!(self.worker.min_spacing_secs >= 0.0, "worker.min_spacing_secs must be non-negative");
        anyhow::ensure!(!self.http.user_agents.is_empty(), "http.user_agents must not be empty");
        Ok(())
    }

    /// Create a default config for testing
    #[cfg(test)]
    pub fn default_for_test() -> Self {
        let mut config = Self::default();
        config.rpc.url = "http://127.0.0.1:8899".to_string();
        config.rpc.alternate_url = "http://127.0.0.1:8898".to_string();
        config.funding.confirmation_delay_secs = 0;
        config.worker.swaps_per_wallet = 2;
        config.worker.min_delay_secs = 0.0;
        config.worker.max_delay_secs = 0.0;
        config.worker.seed = Some(7);
        config.telemetry.enable_metrics = false;
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,
    /// Compatible network used as the last funding fallback
    #[serde(default = "default_alternate_url")]
    pub alternate_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Expected genesis hash; connectivity verification fails on mismatch
    #[serde(default = "default_genesis_hash")]
    pub genesis_hash: Option<String>,
    #[serde(default = "default_network_check_delay")]
    pub network_check_delay_ms: u64,
}

fn default_rpc_url() -> String { "https://testnet.fogo.io/".to_string() }
fn default_alternate_url() -> String { "https://api.devnet.solana.com".to_string() }
fn default_request_timeout() -> u64 { 30_000 }
fn default_genesis_hash() -> Option<String> {
    Some("9GGSFo95raqzZxWqKM5tGYvJp5iv4Dm565S4r8h5PEu9".to_string())
}
fn default_network_check_delay() -> u64 { 2_000 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            alternate_url: default_alternate_url(),
            request_timeout_ms: default_request_timeout(),
            genesis_hash: default_genesis_hash(),
            network_check_delay_ms: default_network_check_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexConfig {
    #[serde(default = "default_dex_api_url")]
    pub api_url: String,
    #[serde(default = "default_mint_a")]
    pub mint_a: String,
    #[serde(default = "default_mint_b")]
    pub mint_b: String,
    #[serde(default = "default_fee_payer")]
    pub fee_payer: String,
    /// Sent as both `Origin` and `Referer`
    #[serde(default = "default_dex_origin")]
    pub origin: String,
    #[serde(default = "default_direction")]
    pub direction: SwapDirection,
}

fn default_dex_api_url() -> String { "https://api.valiant.trade".to_string() }
fn default_mint_a() -> String { "So11111111111111111111111111111111111111112".to_string() }
fn default_mint_b() -> String { "fUSDNGgHkZfwckbr5RLLvRbvqvRcTLdH9hcHJiq4jry".to_string() }
fn default_fee_payer() -> String { "8HnaXmgFJbvvJxSdjeNyWwMXZb85E35NM4XNg6rxuw3w".to_string() }
fn default_dex_origin() -> String { "https://valiant.trade".to_string() }
fn default_direction() -> SwapDirection { SwapDirection::AForB }

impl Default for DexConfig {
    fn default() -> Self {
        Self {
            api_url: default_dex_api_url(),
            mint_a: default_mint_a(),
            mint_b: default_mint_b(),
            fee_payer: default_fee_payer(),
            origin: default_dex_origin(),
            direction: default_direction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymasterConfig {
    #[serde(default = "default_paymaster_url")]
    pub url: String,
    /// Shortest body accepted as a transaction reference
    #[serde(default = "default_min_reference_len")]
    pub min_reference_len: usize,
    /// Error signatures that mean "expected, try the next channel"
    #[serde(default = "default_transient_error_codes")]
    pub transient_error_codes: Vec<String>,
}

fn default_paymaster_url() -> String { "https://sessions-example.fogo.io/paymaster".to_string() }
fn default_min_reference_len() -> usize { 10 }
fn default_transient_error_codes() -> Vec<String> { vec!["5663009".to_string()] }

impl Default for PaymasterConfig {
    fn default() -> Self {
        Self {
            url: default_paymaster_url(),
            min_reference_len: default_min_reference_len(),
            transient_error_codes: default_transient_error_codes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Fund wallets whose balance is too low during a swap
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_airdrop_amount")]
    pub amount_lamports: u64,
    /// Case-insensitive substrings of an airdrop error that mean "already funded"
    #[serde(default = "default_already_funded_patterns")]
    pub already_funded_patterns: Vec<String>,
    #[serde(default = "default_alternate_faucets")]
    pub alternate_faucets: Vec<FaucetEndpoint>,
    #[serde(default = "default_confirmation_delay")]
    pub confirmation_delay_secs: u64,
}

/// An alternate faucet with its own request body.
///
/// String values `$address` and `$amount` inside `body` are replaced with the
/// wallet address and the configured airdrop amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetEndpoint {
    pub url: String,
    pub body: serde_json::Value,
}

fn default_airdrop_amount() -> u64 { 2 * LAMPORTS_PER_TOKEN }
fn default_already_funded_patterns() -> Vec<String> {
    ["limit", "already", "funded", "recent"].iter().map(|s| s.to_string()).collect()
}
fn default_alternate_faucets() -> Vec<FaucetEndpoint> {
    vec![
        FaucetEndpoint {
            url: "https://faucet.fogo.io/api/airdrop".to_string(),
            body: serde_json::json!({ "address": "$address", "amount": "$amount" }),
        },
        FaucetEndpoint {
            url: "https://testnet.fogo.io/api/faucet".to_string(),
            body: serde_json::json!({ "wallet": "$address", "network": "testnet" }),
        },
    ]
}
fn default_confirmation_delay() -> u64 { 5 }

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            amount_lamports: default_airdrop_amount(),
            already_funded_patterns: default_already_funded_patterns(),
            alternate_faucets: default_alternate_faucets(),
            confirmation_delay_secs: default_confirmation_delay(),
        }
    }
}

/// What to do when the balance is short of the requested amount but still
/// above the usability threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientBalancePolicy {
    /// Send the originally requested amount and let the network decide
    KeepRequested,
    /// Send `adjusted_fraction` of the available balance instead
    ScaleToBalance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "default_swap_amounts")]
    pub amounts: Vec<u64>,
    #[serde(default = "default_swap_weights")]
    pub weights: Vec<f64>,
    /// Balances at or below this go through funding instead of a partial swap
    #[serde(default = "default_usability_threshold")]
    pub usability_threshold: u64,
    #[serde(default = "default_adjusted_fraction")]
    pub adjusted_fraction: f64,
    #[serde(default = "default_balance_policy")]
    pub insufficient_balance_policy: InsufficientBalancePolicy,
    /// Count a swap with a non-zero quote as done even if no channel took it
    #[serde(default = "default_true")]
    pub count_unconfirmed_as_success: bool,
}

fn default_swap_amounts() -> Vec<u64> { vec![100_000, 200_000, 500_000, 1_000_000, 1_500_000] }
fn default_swap_weights() -> Vec<f64> { vec![0.3, 0.25, 0.2, 0.15, 0.1] }
fn default_usability_threshold() -> u64 { 100_000 }
fn default_adjusted_fraction() -> f64 { 0.8 }
fn default_balance_policy() -> InsufficientBalancePolicy { InsufficientBalancePolicy::KeepRequested }

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            amounts: default_swap_amounts(),
            weights: default_swap_weights(),
            usability_threshold: default_usability_threshold(),
            adjusted_fraction: default_adjusted_fraction(),
            insufficient_balance_policy: default_balance_policy(),
            count_unconfirmed_as_success: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_swaps_per_wallet")]
    pub swaps_per_wallet: u32,
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
    /// Floor applied after the adaptive multiplier
    #[serde(default = "default_min_spacing")]
    pub min_spacing_secs: f64,
    /// Fixed RNG seed for reproducible amount and proxy choices
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_swaps_per_wallet() -> u32 { 10 }
fn default_min_delay() -> f64 { 5.0 }
fn default_max_delay() -> f64 { 15.0 }
fn default_min_spacing() -> f64 { 0.1 }

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            swaps_per_wallet: default_swaps_per_wallet(),
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            min_spacing_secs: default_min_spacing(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletsConfig {
    #[serde(default = "default_keys_path")]
    pub keys_path: PathBuf,
    #[serde(default = "default_proxies_path")]
    pub proxies_path: PathBuf,
    #[serde(default)]
    pub use_proxies: bool,
}

fn default_keys_path() -> PathBuf { PathBuf::from("private_key.txt") }
fn default_proxies_path() -> PathBuf { PathBuf::from("proxy.txt") }

impl Default for WalletsConfig {
    fn default() -> Self {
        Self {
            keys_path: default_keys_path(),
            proxies_path: default_proxies_path(),
            use_proxies: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

fn default_http_timeout() -> u64 { 30_000 }
fn default_connect_timeout() -> u64 { 10_000 }
fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0".to_string(),
    ]
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_http_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            user_agents: default_user_agents(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    pub log_file: Option<String>,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default)]
    pub enable_metrics: bool,
}

fn default_log_level() -> String { "info".to_string() }
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }
fn default_explorer_url() -> String { "https://explorer.fogo.io/tx/".to_string() }

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            log_file: None,
            metrics_port: default_metrics_port(),
            enable_metrics: false,
        }
    }
}
