//! Wallet worker loop
//!
//! Runs the configured number of swap operations for one wallet, strictly
//! one after another, with an adaptive pause between them.

use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::orchestrator::{SwapOrchestrator, SwapOutcome};
use super::pacing::{AmountSampler, DelayPolicy};
use crate::network::{Event, EventBus};
use crate::telemetry::metrics;
use crate::utils::helpers::{elapsed_ms, format_small_amount, format_token_amount};
use crate::utils::types::{Wallet, WalletRunStats};

pub struct WorkerLoop {
    wallet: Arc<Wallet>,
    orchestrator: SwapOrchestrator,
    sampler: AmountSampler,
    delays: DelayPolicy,
    swaps: u32,
    rng: StdRng,
    events: Option<EventBus>,
    shutdown: watch::Receiver<bool>,
}

impl WorkerLoop {
    pub fn new(
        wallet: Arc<Wallet>,
        orchestrator: SwapOrchestrator,
        sampler: AmountSampler,
        delays: DelayPolicy,
        swaps: u32,
        rng: StdRng,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            wallet,
            orchestrator,
            sampler,
            delays,
            swaps,
            rng,
            events: None,
            shutdown,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    pub async fn run(mut self) -> WalletRunStats {
        let worker_id = self.wallet.index();
        let short = self.wallet.short();
        let mut stats = WalletRunStats::new(worker_id, self.wallet.pubkey().to_string(), self.swaps);

        info!("[Worker {}] Starting {} swaps for {}", worker_id, self.swaps, short);
        metrics::worker_started();
        self.publish(Event::WorkerStarted {
            worker_id,
            wallet: self.wallet.pubkey().to_string(),
            planned: self.swaps,
        });

        for cycle in 1..=self.swaps {
            if *self.shutdown.borrow() {
                stats.interrupted = true;
                break;
            }

            let amount = self.sampler.sample(&mut self.rng);
            info!(
                "[Worker {}] Swap #{}/{}: {}",
                worker_id,
                cycle,
                self.swaps,
                format_small_amount(amount)
            );

            let started = Instant::now();
            let outcome = tokio::select! {
                outcome = self.orchestrator.execute(&self.wallet, amount) => outcome,
                _ = wait_for_shutdown(&mut self.shutdown) => {
                    warn!("[Worker {}] Interrupted during swap #{}", worker_id, cycle);
                    stats.interrupted = true;
                    break;
                }
            };
            let latency = elapsed_ms(started);

            match &outcome {
                SwapOutcome::Completed { amount_in, received, .. } => {
                    stats.record_success(*amount_in, outcome.signature().map(str::to_string));
                    metrics::record_swap_success(*amount_in, latency);
                    info!(
                        "[Worker {}] Swap #{} successful! Volume: {} (received {})",
                        worker_id,
                        cycle,
                        format_small_amount(stats.volume),
                        received
                    );
                    self.publish(Event::OperationFinished {
                        worker_id,
                        cycle,
                        success: true,
                        amount_in: *amount_in,
                        received: *received,
                    });
                }
                SwapOutcome::Failed { stage, reason } => {
                    stats.record_failure();
                    metrics::record_swap_failure(latency);
                    error!("[Worker {}] Swap #{} failed at {}: {}", worker_id, cycle, stage, reason);
                    self.publish(Event::OperationFinished {
                        worker_id,
                        cycle,
                        success: false,
                        amount_in: 0,
                        received: 0,
                    });
                }
            }

            if cycle < self.swaps {
                let delay = self.delays.next_delay(stats.failure_rate(), &mut self.rng);
                info!("[Worker {}] Waiting {:.1}s...", worker_id, delay.as_secs_f64());

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = wait_for_shutdown(&mut self.shutdown) => {
                        stats.interrupted = true;
                        break;
                    }
                }
            }
        }

        if stats.interrupted {
            warn!(
                "[Worker {}] Stopped early after {}/{} swaps",
                worker_id,
                stats.attempts(),
                self.swaps
            );
        } else {
            info!("[Worker {}] All swaps completed!", worker_id);
        }
        info!(
            "[Worker {}] Success: {}/{} ({:.1}%)",
            worker_id,
            stats.successful,
            self.swaps,
            stats.success_rate_pct()
        );
        info!("[Worker {}] Volume: {}", worker_id, format_token_amount(stats.volume));

        metrics::worker_finished();
        self.publish(Event::WorkerFinished {
            worker_id,
            successful: stats.successful,
            failed: stats.failed,
            volume: stats.volume,
            interrupted: stats.interrupted,
        });

        stats
    }
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::orchestrator::SwapPolicy;
    use crate::config::AppConfig;
    use crate::execution::dex::MockSwapRouter;
    use crate::execution::submitter::MockSubmissionChannel;
    use crate::execution::{BuiltTransaction, Quote, SubmissionOutcome, SubmissionPipeline};
    use crate::network::rpc_client::MockBalanceOracle;
    use crate::utils::error::SwapError;
    use rand::SeedableRng;
    use solana_sdk::signature::Keypair;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Orchestrator whose quotes fail on the calls listed in `failing`
    fn orchestrator(failing: Vec<usize>) -> SwapOrchestrator {
        let mut oracle = MockBalanceOracle::new();
        oracle.expect_balance().returning(|_| 10_000_000_000);

        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = MockSwapRouter::new();
        router.expect_quote().returning(move |_, direction| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if failing.contains(&n) {
                Err(SwapError::MissingField("quote"))
            } else {
                Ok(Quote {
                    min_out: 5,
                    pool_address: "Pool111".to_string(),
                    direction,
                })
            }
        });
        router.expect_build().returning(|_, _, _| {
            Ok(BuiltTransaction {
                encoded: "AQID".to_string(),
                raw: vec![1, 2, 3],
            })
        });

        let mut channel = MockSubmissionChannel::new();
        channel.expect_name().return_const("paymaster");
        channel
            .expect_submit()
            .return_const(SubmissionOutcome::Accepted("abc1234567".to_string()));

        let config = AppConfig::default_for_test();
        SwapOrchestrator::new(
            Arc::new(oracle),
            None,
            Box::new(router),
            SubmissionPipeline::new(vec![Box::new(channel)]),
            SwapPolicy::from_config(&config),
        )
    }

    fn worker(
        failing: Vec<usize>,
        swaps: u32,
        min_delay: f64,
        shutdown: watch::Receiver<bool>,
    ) -> WorkerLoop {
        WorkerLoop::new(
            Arc::new(Wallet::new(1, Keypair::new())),
            orchestrator(failing),
            AmountSampler::new(&[100_000], &[1.0]).unwrap(),
            DelayPolicy {
                min_delay,
                max_delay: min_delay,
                min_spacing: 0.0,
            },
            swaps,
            StdRng::seed_from_u64(1),
            shutdown,
        )
    }

    #[tokio::test]
    async fn test_records_exactly_planned_operations() {
        let (_tx, rx) = watch::channel(false);
        let stats = worker(vec![1], 3, 0.0, rx).run().await;

        assert_eq!(stats.attempts(), 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.volume, 200_000);
        assert_eq!(stats.references.len(), 2);
        assert!(!stats.interrupted);
    }

    #[tokio::test]
    async fn test_events_published() {
        let (_tx, rx) = watch::channel(false);
        let bus = EventBus::new(64);
        let mut receiver = bus.subscribe();

        worker(vec![], 2, 0.0, rx).with_events(bus).run().await;

        let mut finished_ops = 0;
        let mut saw_end = false;
        while let Ok(event) = receiver.try_recv() {
            match event {
                Event::OperationFinished { success, .. } => {
                    assert!(success);
                    finished_ops += 1;
                }
                Event::WorkerFinished { successful, .. } => {
                    assert_eq!(successful, 2);
                    saw_end = true;
                }
                _ => {}
            }
        }
        assert_eq!(finished_ops, 2);
        assert!(saw_end);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_delay_stops_loop() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker(vec![], 5, 60.0, rx).run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        let stats = handle.await.unwrap();
        assert!(stats.interrupted);
        assert_eq!(stats.attempts(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_records_nothing() {
        let (_tx, rx) = watch::channel(true);
        let stats = worker(vec![], 3, 0.0, rx).run().await;
        assert!(stats.interrupted);
        assert_eq!(stats.attempts(), 0);
    }
}
