//! Funding Acquirer
//!
//! Gets test funds onto a wallet by walking an ordered list of channels and
//! stopping at the first one that succeeds. "Already funded" answers count
//! as success: the wallet is presumed to hold funds already.

pub mod channels;

pub use channels::{AlternateFaucetChannel, NativeAirdropChannel};

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{FundingConfig, RpcConfig};
use crate::network::{Event, EventBus};
use crate::telemetry::metrics;
use crate::utils::helpers::truncate_address;

/// Result of one funding channel attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingOutcome {
    /// Request taken, with the airdrop signature when the channel returns one
    Funded(Option<String>),
    /// Refused with a message that means the wallet was funded recently
    AlreadyFunded(String),
    Failed(String),
}

impl FundingOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FundingOutcome::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            FundingOutcome::Funded(_) => "funded",
            FundingOutcome::AlreadyFunded(_) => "already_funded",
            FundingOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingReceipt {
    pub channel: &'static str,
    pub outcome: FundingOutcome,
}

/// One way of getting test funds onto a wallet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FundingChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn request(&self, pubkey: &Pubkey) -> FundingOutcome;
}

pub struct FundingAcquirer {
    channels: Vec<Box<dyn FundingChannel>>,
    confirmation_delay: Duration,
}

impl FundingAcquirer {
    pub fn new(channels: Vec<Box<dyn FundingChannel>>, confirmation_delay: Duration) -> Self {
        Self {
            channels,
            confirmation_delay,
        }
    }

    /// Standard channel order: primary airdrop, alternate faucets, then the
    /// airdrop on the alternate network.
    pub fn from_config(client: Client, rpc: &RpcConfig, funding: &FundingConfig) -> Self {
        let mut channels: Vec<Box<dyn FundingChannel>> = Vec::new();

        channels.push(Box::new(NativeAirdropChannel::new(
            "native_airdrop",
            client.clone(),
            rpc.url.clone(),
            funding.amount_lamports,
            funding.already_funded_patterns.clone(),
        )));

        for endpoint in &funding.alternate_faucets {
            channels.push(Box::new(AlternateFaucetChannel::new(
                client.clone(),
                endpoint.clone(),
                funding.amount_lamports,
            )));
        }

        channels.push(Box::new(NativeAirdropChannel::new(
            "fallback_airdrop",
            client,
            rpc.alternate_url.clone(),
            funding.amount_lamports,
            Vec::new(),
        )));

        Self::new(channels, Duration::from_secs(funding.confirmation_delay_secs))
    }

    /// Wait the caller owes after a successful acquisition before the
    /// balance can be expected to show it
    pub fn confirmation_delay(&self) -> Duration {
        self.confirmation_delay
    }

    /// Try each channel once, in order. `Some` means the wallet should now
    /// be considered fundable; the balance may not reflect it yet.
    pub async fn acquire(&self, pubkey: &Pubkey) -> Option<FundingReceipt> {
        let short = truncate_address(&pubkey.to_string(), 6);

        for channel in &self.channels {
            let outcome = channel.request(pubkey).await;
            metrics::record_funding_attempt(channel.name(), outcome.label());

            match &outcome {
                FundingOutcome::Funded(Some(signature)) => {
                    info!("{} successful for {} TX: {}", channel.name(), short, signature)
                }
                FundingOutcome::Funded(None) => info!("{} successful for {}", channel.name(), short),
                FundingOutcome::AlreadyFunded(message) => {
                    info!("{} limit reached for {} (already funded recently: {})", channel.name(), short, message)
                }
                FundingOutcome::Failed(reason) => {
                    debug!("{} failed for {}: {}", channel.name(), short, reason);
                    continue;
                }
            }

            return Some(FundingReceipt {
                channel: channel.name(),
                outcome,
            });
        }

        warn!("All airdrop methods failed for {}", short);
        None
    }
}

/// Pre-run airdrop for every wallet at once.
///
/// Returns how many wallets were funded. Waits one confirmation delay if
/// any succeeded.
pub async fn fund_fleet(targets: &[(Pubkey, FundingAcquirer)], events: Option<&EventBus>) -> usize {
    info!("Requesting airdrops for all wallets...");

    let results = join_all(targets.iter().map(|(pubkey, acquirer)| acquirer.acquire(pubkey))).await;
    let funded = results.iter().filter(|r| r.is_some()).count();

    if let Some(bus) = events {
        for ((pubkey, _), receipt) in targets.iter().zip(&results) {
            if let Some(receipt) = receipt {
                bus.publish(Event::WalletFunded {
                    wallet: pubkey.to_string(),
                    channel: receipt.channel,
                });
            }
        }
    }

    info!("Airdrop requests completed: {}/{} successful", funded, targets.len());

    if funded > 0 {
        let delay = targets
            .iter()
            .map(|(_, a)| a.confirmation_delay())
            .max()
            .unwrap_or_default();
        info!("Waiting {:?} for airdrop confirmations...", delay);
        tokio::time::sleep(delay).await;
    }

    funded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &'static str, outcome: FundingOutcome, times: usize) -> Box<dyn FundingChannel> {
        let mut mock = MockFundingChannel::new();
        mock.expect_name().return_const(name);
        mock.expect_request().times(times).return_const(outcome);
        Box::new(mock)
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let acquirer = FundingAcquirer::new(
            vec![
                channel("native_airdrop", FundingOutcome::Funded(Some("sig".into())), 1),
                channel("alternate_faucet", FundingOutcome::Funded(None), 0),
                channel("fallback_airdrop", FundingOutcome::Funded(None), 0),
            ],
            Duration::ZERO,
        );

        let receipt = acquirer.acquire(&Pubkey::new_unique()).await.unwrap();
        assert_eq!(receipt.channel, "native_airdrop");
    }

    #[tokio::test]
    async fn test_already_funded_counts_as_success() {
        let acquirer = FundingAcquirer::new(
            vec![
                channel("native_airdrop", FundingOutcome::AlreadyFunded("rate limit".into()), 1),
                channel("fallback_airdrop", FundingOutcome::Funded(None), 0),
            ],
            Duration::ZERO,
        );

        let receipt = acquirer.acquire(&Pubkey::new_unique()).await.unwrap();
        assert!(matches!(receipt.outcome, FundingOutcome::AlreadyFunded(_)));
    }

    #[tokio::test]
    async fn test_falls_through_to_last_channel() {
        let acquirer = FundingAcquirer::new(
            vec![
                channel("native_airdrop", FundingOutcome::Failed("boom".into()), 1),
                channel("alternate_faucet", FundingOutcome::Failed("404".into()), 1),
                channel("fallback_airdrop", FundingOutcome::Funded(Some("devsig".into())), 1),
            ],
            Duration::ZERO,
        );

        let receipt = acquirer.acquire(&Pubkey::new_unique()).await.unwrap();
        assert_eq!(receipt.channel, "fallback_airdrop");
    }

    #[tokio::test]
    async fn test_all_fail_returns_none() {
        let acquirer = FundingAcquirer::new(
            vec![
                channel("native_airdrop", FundingOutcome::Failed("a".into()), 1),
                channel("fallback_airdrop", FundingOutcome::Failed("b".into()), 1),
            ],
            Duration::ZERO,
        );

        assert!(acquirer.acquire(&Pubkey::new_unique()).await.is_none());
    }

    #[test]
    fn test_from_config_channel_order() {
        let acquirer = FundingAcquirer::from_config(
            Client::new(),
            &RpcConfig::default(),
            &FundingConfig::default(),
        );
        let names: Vec<_> = acquirer.channels.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec!["native_airdrop", "alternate_faucet", "alternate_faucet", "fallback_airdrop"]
        );
        assert_eq!(acquirer.confirmation_delay(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fund_fleet_counts_successes() {
        let targets = vec![
            (
                Pubkey::new_unique(),
                FundingAcquirer::new(
                    vec![channel("native_airdrop", FundingOutcome::Funded(None), 1)],
                    Duration::from_secs(5),
                ),
            ),
            (
                Pubkey::new_unique(),
                FundingAcquirer::new(
                    vec![channel("native_airdrop", FundingOutcome::Failed("x".into()), 1)],
                    Duration::from_secs(5),
                ),
            ),
        ];

        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();
        let start = tokio::time::Instant::now();
        assert_eq!(fund_fleet(&targets, Some(&bus)).await, 1);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(matches!(
            receiver.try_recv(),
            Ok(Event::WalletFunded { channel: "native_airdrop", .. })
        ));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fund_fleet_skips_settle_delay_when_nothing_funded() {
        let targets: Vec<_> = (0..2)
            .map(|_| {
                (
                    Pubkey::new_unique(),
                    FundingAcquirer::new(
                        vec![channel("native_airdrop", FundingOutcome::Failed("x".into()), 1)],
                        Duration::from_secs(5),
                    ),
                )
            })
            .collect();

        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();
        let start = tokio::time::Instant::now();
        assert_eq!(fund_fleet(&targets, Some(&bus)).await, 0);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(receiver.try_recv().is_err());
    }
}
