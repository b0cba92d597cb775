//! Network RPC access
//!
//! Wraps the nonblocking Solana `RpcClient` for the read-only calls the bot
//! needs: balances, connectivity verification and signature lookups.

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RpcConfig;
use crate::execution::PLACEHOLDER_SIGNATURE;
use crate::utils::helpers::{format_token_amount, truncate_address};

/// Source of spendable balances.
///
/// Failures are swallowed and reported as a zero balance; callers cannot
/// tell "empty" from "query failed" and treat both as "needs funding".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    async fn balance(&self, pubkey: &Pubkey) -> u64;
}

/// Result of the pre-run connectivity check
#[derive(Debug, Clone)]
pub struct NetworkReport {
    pub genesis_hash: String,
    pub start_slot: u64,
    pub end_slot: u64,
}

impl NetworkReport {
    /// Slots progressed between the two samples
    pub fn is_active(&self) -> bool {
        self.end_slot > self.start_slot
    }
}

/// Lookup result for a recorded submission reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Processed without error
    Landed,
    /// Processed with an on-chain error
    Failed,
    /// The network has no record of it
    NotFound,
    /// Placeholder reference or the lookup itself failed
    Unverifiable,
}

impl SignatureCheck {
    /// Lenient reading: only a definite miss or failure counts against it
    pub fn is_ok(&self) -> bool {
        matches!(self, SignatureCheck::Landed | SignatureCheck::Unverifiable)
    }
}

/// RPC manager for the primary network
pub struct RpcManager {
    client: RpcClient,
    config: RpcConfig,
}

impl RpcManager {
    pub fn new(config: &RpcConfig) -> Self {
        let client = RpcClient::new_with_timeout_and_commitment(
            config.url.clone(),
            Duration::from_millis(config.request_timeout_ms),
            CommitmentConfig::confirmed(),
        );

        info!("RPC manager initialized for {}", config.url);

        Self {
            client,
            config: config.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Verify genesis hash, report the node version and check that slots
    /// are advancing.
    ///
    /// A genesis mismatch or an unreachable node is an error. A stalled
    /// network is reported through [`NetworkReport::is_active`].
    pub async fn verify_connection(&self) -> Result<NetworkReport> {
        let genesis = self
            .client
            .get_genesis_hash()
            .await
            .context("Failed to get genesis hash")?
            .to_string();

        if let Some(expected) = &self.config.genesis_hash {
            anyhow::ensure!(
                &genesis == expected,
                "Genesis hash mismatch: expected {}, got {}",
                expected,
                genesis
            );
        }
        info!("Genesis hash verified: {}", genesis);

        match self.client.get_version().await {
            Ok(v) => {
                info!("Network version: {}", v.solana_core);
                if let Some(features) = v.feature_set {
                    info!("Feature set: {}", features);
                }
            }
            Err(e) => debug!("Failed to get network version: {}", e),
        }

        let start_slot = self.client.get_slot().await.context("Failed to get slot")?;
        info!("Current slot: {}", start_slot);

        tokio::time::sleep(Duration::from_millis(self.config.network_check_delay_ms)).await;

        let end_slot = self.client.get_slot().await.context("Failed to get slot")?;
        if end_slot > start_slot {
            info!("Network is active (slot progressed from {} to {})", start_slot, end_slot);
        } else {
            warn!("Network might be stalled (slot unchanged: {})", start_slot);
        }

        Ok(NetworkReport {
            genesis_hash: genesis,
            start_slot,
            end_slot,
        })
    }

    /// Look up a recorded submission reference
    pub async fn signature_status(&self, reference: &str) -> SignatureCheck {
        if reference.is_empty() || reference == PLACEHOLDER_SIGNATURE {
            return SignatureCheck::Unverifiable;
        }

        let signature = match Signature::from_str(reference) {
            Ok(sig) => sig,
            Err(e) => {
                debug!("Unparseable signature {}: {}", reference, e);
                return SignatureCheck::Unverifiable;
            }
        };

        match self.client.get_signature_statuses(&[signature]).await {
            Ok(response) => match response.value.into_iter().next().flatten() {
                None => SignatureCheck::NotFound,
                Some(status) if status.err.is_none() => SignatureCheck::Landed,
                Some(_) => SignatureCheck::Failed,
            },
            Err(e) => {
                debug!("Signature lookup failed for {}: {}", reference, e);
                SignatureCheck::Unverifiable
            }
        }
    }
}

#[async_trait]
impl BalanceOracle for RpcManager {
    async fn balance(&self, pubkey: &Pubkey) -> u64 {
        match self.client.get_balance(pubkey).await {
            Ok(lamports) => lamports,
            Err(e) => {
                debug!(
                    "Balance check failed for {}: {}",
                    truncate_address(&pubkey.to_string(), 6),
                    e
                );
                0
            }
        }
    }
}

/// Balance readiness line used by the pre- and post-run wallet reports
pub fn balance_status(balance: u64) -> &'static str {
    if balance > READY_BALANCE_LAMPORTS {
        "Ready"
    } else {
        "Needs funding"
    }
}

/// Balance above which a wallet is reported as ready to swap
pub const READY_BALANCE_LAMPORTS: u64 = 1_000_000;

/// Log the balance of every wallet, one line each
pub async fn report_balances(oracle: &dyn BalanceOracle, wallets: &[Pubkey]) -> Vec<u64> {
    info!("Checking wallet balances...");
    let mut balances = Vec::with_capacity(wallets.len());
    for (i, pubkey) in wallets.iter().enumerate() {
        let balance = oracle.balance(pubkey).await;
        info!(
            "Wallet {}: {} | Balance: {} | {}",
            i + 1,
            truncate_address(&pubkey.to_string(), 8),
            format_token_amount(balance),
            balance_status(balance)
        );
        balances.push(balance);
    }
    balances
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_rpc_manager_creation() {
        let manager = RpcManager::new(&RpcConfig::default());
        assert_eq!(manager.url(), "https://testnet.fogo.io/");
    }

    #[test]
    fn test_balance_status_threshold() {
        assert_eq!(balance_status(0), "Needs funding");
        assert_eq!(balance_status(1_000_000), "Needs funding");
        assert_eq!(balance_status(1_000_001), "Ready");
    }

    #[test]
    fn test_signature_check_leniency() {
        assert!(SignatureCheck::Landed.is_ok());
        assert!(SignatureCheck::Unverifiable.is_ok());
        assert!(!SignatureCheck::NotFound.is_ok());
        assert!(!SignatureCheck::Failed.is_ok());
    }

    #[tokio::test]
    async fn test_placeholder_is_unverifiable_without_network() {
        let mut config = RpcConfig::default();
        config.url = "http://127.0.0.1:1".to_string();
        let manager = RpcManager::new(&config);
        assert_eq!(
            manager.signature_status(PLACEHOLDER_SIGNATURE).await,
            SignatureCheck::Unverifiable
        );
        assert_eq!(manager.signature_status("").await, SignatureCheck::Unverifiable);
    }

    #[tokio::test]
    async fn test_report_balances_queries_each_wallet_in_order() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        let mut oracle = MockBalanceOracle::new();
        oracle.expect_balance().with(eq(a)).times(1).return_const(5_000_000u64);
        oracle.expect_balance().with(eq(b)).times(1).return_const(0u64);

        let balances = report_balances(&oracle, &[a, b]).await;
        assert_eq!(balances, vec![5_000_000, 0]);
    }
}
