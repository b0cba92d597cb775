//! Swap Orchestrator
//!
//! One wallet-level swap: balance, optional funding, quote, build, submit.
//! Every failure ends the operation and comes back as a `SwapOutcome`;
//! nothing propagates past `execute`.

use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state_machine::{SwapStage, SwapStateMachine};
use crate::config::{AppConfig, InsufficientBalancePolicy};
use crate::execution::{
    DexClient, PaymasterChannel, RpcSubmitChannel, SubmissionChannel, SubmissionPipeline,
    SubmissionReceipt, SwapRouter,
};
use crate::faucet::FundingAcquirer;
use crate::network::BalanceOracle;
use crate::utils::helpers::{format_small_amount, format_token_amount};
use crate::utils::types::{SwapDirection, Wallet};

/// How a completed swap is backed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// A submission channel took the transaction
    Submitted(SubmissionReceipt),
    /// No channel took it, but the quote promised a non-zero output
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    Completed {
        amount_in: u64,
        received: u64,
        confirmation: Confirmation,
    },
    Failed {
        stage: SwapStage,
        reason: String,
    },
}

impl SwapOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SwapOutcome::Completed { .. })
    }

    /// Traceable signature of a submitted swap
    pub fn signature(&self) -> Option<&str> {
        match self {
            SwapOutcome::Completed {
                confirmation: Confirmation::Submitted(receipt),
                ..
            } => receipt.reference.signature(),
            _ => None,
        }
    }
}

/// Knobs that decide how a swap proceeds
#[derive(Debug, Clone)]
pub struct SwapPolicy {
    pub direction: SwapDirection,
    pub usability_threshold: u64,
    pub adjusted_fraction: f64,
    pub insufficient_balance: InsufficientBalancePolicy,
    pub count_unconfirmed_as_success: bool,
}

impl SwapPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            direction: config.dex.direction,
            usability_threshold: config.swap.usability_threshold,
            adjusted_fraction: config.swap.adjusted_fraction,
            insufficient_balance: config.swap.insufficient_balance_policy,
            count_unconfirmed_as_success: config.swap.count_unconfirmed_as_success,
        }
    }
}

pub struct SwapOrchestrator {
    oracle: Arc<dyn BalanceOracle>,
    funding: Option<FundingAcquirer>,
    router: Box<dyn SwapRouter>,
    submitter: SubmissionPipeline,
    policy: SwapPolicy,
}

impl SwapOrchestrator {
    pub fn new(
        oracle: Arc<dyn BalanceOracle>,
        funding: Option<FundingAcquirer>,
        router: Box<dyn SwapRouter>,
        submitter: SubmissionPipeline,
        policy: SwapPolicy,
    ) -> Self {
        Self {
            oracle,
            funding,
            router,
            submitter,
            policy,
        }
    }

    /// Production wiring for one wallet. `client` carries that wallet's
    /// proxy and user agent.
    pub fn for_wallet(config: &AppConfig, oracle: Arc<dyn BalanceOracle>, client: Client) -> Self {
        let funding = config
            .funding
            .enabled
            .then(|| FundingAcquirer::from_config(client.clone(), &config.rpc, &config.funding));

        let router = Box::new(DexClient::new(client.clone(), &config.dex));

        let channels: Vec<Box<dyn SubmissionChannel>> = vec![
            Box::new(PaymasterChannel::new(client.clone(), &config.paymaster)),
            Box::new(RpcSubmitChannel::new(client, config.rpc.url.clone())),
        ];

        Self::new(
            oracle,
            funding,
            router,
            SubmissionPipeline::new(channels),
            SwapPolicy::from_config(config),
        )
    }

    pub async fn execute(&self, wallet: &Wallet, requested: u64) -> SwapOutcome {
        let mut sm = SwapStateMachine::new();
        let short = wallet.short();
        let pubkey = wallet.pubkey();

        let balance = self.oracle.balance(&pubkey).await;
        info!("Balance for {}: {}", short, format_token_amount(balance));

        let amount_in = match self.ensure_funds(&mut sm, wallet, balance, requested).await {
            Ok(amount) => amount,
            Err(reason) => return fail(&mut sm, reason),
        };

        sm.transition_to(SwapStage::Quote);
        let quote = match self.router.quote(amount_in, self.policy.direction).await {
            Ok(quote) => quote,
            Err(e) => return fail(&mut sm, format!("Failed to get swap quote: {}", e)),
        };

        sm.transition_to(SwapStage::Build);
        let built = match self.router.build(&pubkey, amount_in, &quote).await {
            Ok(built) => built,
            Err(e) => return fail(&mut sm, format!("Failed to get swap transaction: {}", e)),
        };

        sm.transition_to(SwapStage::Submit);
        match self.submitter.submit(wallet, &built).await {
            Ok(receipt) if quote.min_out > 0 => {
                sm.transition_to(SwapStage::Completed);
                SwapOutcome::Completed {
                    amount_in,
                    received: quote.min_out,
                    confirmation: Confirmation::Submitted(receipt),
                }
            }
            Err(e) if quote.min_out > 0 && self.policy.count_unconfirmed_as_success => {
                info!(
                    "[{}] Transaction may have succeeded (quoted {} tokens): {}",
                    short, quote.min_out, e
                );
                sm.transition_to_with_reason(SwapStage::Completed, Some("unconfirmed".to_string()));
                SwapOutcome::Completed {
                    amount_in,
                    received: quote.min_out,
                    confirmation: Confirmation::Unconfirmed,
                }
            }
            Ok(receipt) => {
                warn!(
                    "[{}] Swap submitted via {} but quote promised no output",
                    short, receipt.channel
                );
                fail(&mut sm, "zero expected output".to_string())
            }
            Err(e) => fail(&mut sm, e.to_string()),
        }
    }

    /// Decide the amount to swap, funding the wallet once if needed
    async fn ensure_funds(
        &self,
        sm: &mut SwapStateMachine,
        wallet: &Wallet,
        balance: u64,
        requested: u64,
    ) -> Result<u64, String> {
        if balance >= requested {
            return Ok(requested);
        }

        let short = wallet.short();

        if balance > 0 {
            info!(
                "Has {} but need {}",
                format_token_amount(balance),
                format_small_amount(requested)
            );
            if balance > self.policy.usability_threshold {
                let adjusted = (balance as f64 * self.policy.adjusted_fraction) as u64;
                return Ok(match self.policy.insufficient_balance {
                    InsufficientBalancePolicy::KeepRequested => {
                        info!(
                            "Adjusted amount would be {}, keeping requested {}",
                            format_small_amount(adjusted),
                            format_small_amount(requested)
                        );
                        requested
                    }
                    InsufficientBalancePolicy::ScaleToBalance => {
                        info!("Adjusting amount to {}", format_small_amount(adjusted));
                        adjusted
                    }
                });
            }
            warn!("Balance too low for any swap, requesting airdrop...");
        } else {
            info!("Zero balance, requesting airdrop for {}", short);
        }

        let Some(funding) = &self.funding else {
            return Err("insufficient balance and funding is disabled".to_string());
        };

        sm.transition_to(SwapStage::FundWallet);
        let pubkey = wallet.pubkey();

        if funding.acquire(&pubkey).await.is_none() {
            warn!("Airdrop failed for {}, skipping swap", short);
            return Err("all funding channels failed".to_string());
        }

        tokio::time::sleep(funding.confirmation_delay()).await;

        let new_balance = self.oracle.balance(&pubkey).await;
        info!("Balance after airdrop: {}", format_token_amount(new_balance));

        if new_balance >= requested {
            Ok(requested)
        } else {
            warn!("Insufficient balance after airdrop for {}, skipping swap", short);
            Err(format!(
                "balance {} still below {} after funding",
                new_balance, requested
            ))
        }
    }
}

fn fail(sm: &mut SwapStateMachine, reason: String) -> SwapOutcome {
    let stage = sm.current_stage();
    debug!(
        "Operation failed at {} (path {:?}, funded: {})",
        stage,
        sm.path(),
        sm.funding_attempted()
    );
    sm.transition_to_with_reason(SwapStage::Failed, Some(reason.clone()));
    SwapOutcome::Failed { stage, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::dex::MockSwapRouter;
    use crate::execution::submitter::MockSubmissionChannel;
    use crate::execution::{BuiltTransaction, Quote, RejectReason, SubmissionOutcome};
    use crate::faucet::{FundingChannel, FundingOutcome, MockFundingChannel};
    use crate::network::rpc_client::MockBalanceOracle;
    use crate::utils::error::SwapError;
    use solana_sdk::signature::Keypair;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn policy() -> SwapPolicy {
        SwapPolicy::from_config(&AppConfig::default_for_test())
    }

    fn balances(values: Vec<u64>) -> Arc<dyn BalanceOracle> {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut oracle = MockBalanceOracle::new();
        oracle.expect_balance().times(values.len()).returning(move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            values[n.min(values.len() - 1)]
        });
        Arc::new(oracle)
    }

    fn router(expected_amount: u64, min_out: u64) -> Box<dyn SwapRouter> {
        let mut router = MockSwapRouter::new();
        router
            .expect_quote()
            .withf(move |amount, _| *amount == expected_amount)
            .times(1)
            .returning(move |_, direction| {
                Ok(Quote {
                    min_out,
                    pool_address: "Pool111".to_string(),
                    direction,
                })
            });
        router.expect_build().times(1).returning(|_, _, _| {
            Ok(BuiltTransaction {
                encoded: "AQID".to_string(),
                raw: vec![1, 2, 3],
            })
        });
        Box::new(router)
    }

    fn pipeline(outcome: SubmissionOutcome) -> SubmissionPipeline {
        let mut channel = MockSubmissionChannel::new();
        channel.expect_name().return_const("paymaster");
        channel.expect_submit().return_const(outcome);
        SubmissionPipeline::new(vec![Box::new(channel)])
    }

    fn funding(outcome: FundingOutcome, times: usize) -> Option<FundingAcquirer> {
        let mut channel = MockFundingChannel::new();
        channel.expect_name().return_const("native_airdrop");
        channel.expect_request().times(times).return_const(outcome);
        let channels: Vec<Box<dyn FundingChannel>> = vec![Box::new(channel)];
        Some(FundingAcquirer::new(channels, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_sufficient_balance_swaps_directly() {
        let wallet = Wallet::new(1, Keypair::new());
        let orchestrator = SwapOrchestrator::new(
            balances(vec![5_000_000]),
            funding(FundingOutcome::Funded(None), 0),
            router(1_000_000, 4_200),
            pipeline(SubmissionOutcome::Accepted("abc1234567".into())),
            policy(),
        );

        let outcome = orchestrator.execute(&wallet, 1_000_000).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.signature(), Some("abc1234567"));
        match outcome {
            SwapOutcome::Completed { amount_in, received, .. } => {
                assert_eq!(amount_in, 1_000_000);
                assert_eq!(received, 4_200);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_funding_attempted_once_then_fails_when_still_short() {
        let wallet = Wallet::new(1, Keypair::new());
        let mut untouched = MockSwapRouter::new();
        untouched.expect_quote().times(0);
        untouched.expect_build().times(0);

        let orchestrator = SwapOrchestrator::new(
            balances(vec![0, 50_000]),
            funding(FundingOutcome::Funded(Some("airdrop".into())), 1),
            Box::new(untouched),
            pipeline(SubmissionOutcome::Accepted("never".into())),
            policy(),
        );

        match orchestrator.execute(&wallet, 1_000_000).await {
            SwapOutcome::Failed { stage, reason } => {
                assert_eq!(stage, SwapStage::FundWallet);
                assert!(reason.contains("still below"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_funding_success_then_swap() {
        let wallet = Wallet::new(1, Keypair::new());
        let orchestrator = SwapOrchestrator::new(
            balances(vec![0, 2_000_000_000]),
            funding(FundingOutcome::AlreadyFunded("rate limit".into()), 1),
            router(100_000, 10),
            pipeline(SubmissionOutcome::Accepted("abc1234567".into())),
            policy(),
        );

        assert!(orchestrator.execute(&wallet, 100_000).await.is_success());
    }

    #[tokio::test]
    async fn test_funding_failure_fails_operation() {
        let wallet = Wallet::new(1, Keypair::new());
        let orchestrator = SwapOrchestrator::new(
            balances(vec![0]),
            funding(FundingOutcome::Failed("nope".into()), 1),
            Box::new(MockSwapRouter::new()),
            pipeline(SubmissionOutcome::Accepted("never".into())),
            policy(),
        );

        assert!(matches!(
            orchestrator.execute(&wallet, 100_000).await,
            SwapOutcome::Failed { stage: SwapStage::FundWallet, .. }
        ));
    }

    #[tokio::test]
    async fn test_keep_requested_amount_above_threshold() {
        let wallet = Wallet::new(1, Keypair::new());
        let orchestrator = SwapOrchestrator::new(
            balances(vec![500_000]),
            funding(FundingOutcome::Funded(None), 0),
            router(1_000_000, 7),
            pipeline(SubmissionOutcome::Accepted("abc1234567".into())),
            policy(),
        );

        assert!(orchestrator.execute(&wallet, 1_000_000).await.is_success());
    }

    #[tokio::test]
    async fn test_scale_to_balance_policy() {
        let wallet = Wallet::new(1, Keypair::new());
        let mut policy = policy();
        policy.insufficient_balance = InsufficientBalancePolicy::ScaleToBalance;

        let orchestrator = SwapOrchestrator::new(
            balances(vec![500_000]),
            funding(FundingOutcome::Funded(None), 0),
            router(400_000, 7),
            pipeline(SubmissionOutcome::Accepted("abc1234567".into())),
            policy,
        );

        match orchestrator.execute(&wallet, 1_000_000).await {
            SwapOutcome::Completed { amount_in, .. } => assert_eq!(amount_in, 400_000),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfirmed_counts_when_quote_nonzero() {
        let wallet = Wallet::new(1, Keypair::new());
        let orchestrator = SwapOrchestrator::new(
            balances(vec![5_000_000]),
            None,
            router(100_000, 12),
            pipeline(SubmissionOutcome::Rejected(RejectReason::hard("status 400"))),
            policy(),
        );

        match orchestrator.execute(&wallet, 100_000).await {
            SwapOutcome::Completed { confirmation, received, .. } => {
                assert_eq!(confirmation, Confirmation::Unconfirmed);
                assert_eq!(received, 12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_with_zero_quote_fails() {
        let wallet = Wallet::new(1, Keypair::new());
        let orchestrator = SwapOrchestrator::new(
            balances(vec![5_000_000]),
            None,
            router(100_000, 0),
            pipeline(SubmissionOutcome::Rejected(RejectReason::hard("status 400"))),
            policy(),
        );

        assert!(matches!(
            orchestrator.execute(&wallet, 100_000).await,
            SwapOutcome::Failed { stage: SwapStage::Submit, .. }
        ));
    }

    #[tokio::test]
    async fn test_accepted_with_zero_quote_fails() {
        let wallet = Wallet::new(1, Keypair::new());
        let orchestrator = SwapOrchestrator::new(
            balances(vec![5_000_000]),
            None,
            router(100_000, 0),
            pipeline(SubmissionOutcome::Accepted("abc1234567".into())),
            policy(),
        );

        let outcome = orchestrator.execute(&wallet, 100_000).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.signature(), None);
        match outcome {
            SwapOutcome::Failed { stage, reason } => {
                assert_eq!(stage, SwapStage::Submit);
                assert_eq!(reason, "zero expected output");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scale_to_balance_after_funding_swaps_requested() {
        let wallet = Wallet::new(1, Keypair::new());
        let mut policy = policy();
        policy.insufficient_balance = InsufficientBalancePolicy::ScaleToBalance;

        let orchestrator = SwapOrchestrator::new(
            balances(vec![50_000, 2_000_000]),
            funding(FundingOutcome::Funded(Some("airdrop".into())), 1),
            router(1_000_000, 7),
            pipeline(SubmissionOutcome::Accepted("abc1234567".into())),
            policy,
        );

        match orchestrator.execute(&wallet, 1_000_000).await {
            SwapOutcome::Completed { amount_in, .. } => assert_eq!(amount_in, 1_000_000),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfirmed_policy_can_be_disabled() {
        let wallet = Wallet::new(1, Keypair::new());
        let mut policy = policy();
        policy.count_unconfirmed_as_success = false;

        let orchestrator = SwapOrchestrator::new(
            balances(vec![5_000_000]),
            None,
            router(100_000, 12),
            pipeline(SubmissionOutcome::Rejected(RejectReason::hard("status 400"))),
            policy,
        );

        assert!(!orchestrator.execute(&wallet, 100_000).await.is_success());
    }

    #[tokio::test]
    async fn test_quote_error_stops_before_build() {
        let wallet = Wallet::new(1, Keypair::new());
        let mut router = MockSwapRouter::new();
        router
            .expect_quote()
            .times(1)
            .returning(|_, _| Err(SwapError::MissingField("quote")));
        router.expect_build().times(0);

        let orchestrator = SwapOrchestrator::new(
            balances(vec![5_000_000]),
            None,
            Box::new(router),
            pipeline(SubmissionOutcome::Accepted("never".into())),
            policy(),
        );

        match orchestrator.execute(&wallet, 100_000).await {
            SwapOutcome::Failed { stage, reason } => {
                assert_eq!(stage, SwapStage::Quote);
                assert!(reason.contains("quote"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_low_balance_without_funding_fails() {
        let wallet = Wallet::new(1, Keypair::new());
        let orchestrator = SwapOrchestrator::new(
            balances(vec![50_000]),
            None,
            Box::new(MockSwapRouter::new()),
            pipeline(SubmissionOutcome::Accepted("never".into())),
            policy(),
        );

        assert!(matches!(
            orchestrator.execute(&wallet, 100_000).await,
            SwapOutcome::Failed { stage: SwapStage::QueryBalance, .. }
        ));
    }
}
