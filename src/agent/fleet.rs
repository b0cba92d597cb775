//! Fleet runner
//!
//! One concurrent worker loop per wallet. Loops share nothing mutable; the
//! fleet totals are assembled only after every loop has been joined.

use anyhow::Result;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use super::orchestrator::SwapOrchestrator;
use super::pacing::{AmountSampler, DelayPolicy};
use super::worker::WorkerLoop;
use crate::config::AppConfig;
use crate::network::EventBus;
use crate::utils::types::{FleetStats, Wallet, WalletRunStats};

/// Per-wallet RNG. A fixed seed gives every wallet its own reproducible stream.
pub fn wallet_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
        None => StdRng::from_os_rng(),
    }
}

pub struct FleetRunner {
    config: Arc<AppConfig>,
    events: Option<EventBus>,
    shutdown: watch::Receiver<bool>,
}

impl FleetRunner {
    pub fn new(config: Arc<AppConfig>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            config,
            events: None,
            shutdown,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Run every wallet to completion (or shutdown) and aggregate the results.
    ///
    /// `make_orchestrator` is called once per wallet before anything starts.
    pub async fn run<F>(&self, wallets: Vec<Arc<Wallet>>, mut make_orchestrator: F) -> Result<FleetStats>
    where
        F: FnMut(&Wallet) -> Result<SwapOrchestrator>,
    {
        let run_id = Uuid::new_v4();
        let swaps = self.config.worker.swaps_per_wallet;
        let sampler = AmountSampler::from_config(&self.config.swap)?;
        let delays = DelayPolicy::from_config(&self.config.worker);

        info!(
            "Run {}: starting {} workers with {} swaps each",
            run_id,
            wallets.len(),
            swaps
        );

        let mut workers = Vec::with_capacity(wallets.len());
        for wallet in &wallets {
            let orchestrator = make_orchestrator(wallet.as_ref())?;
            let mut worker = WorkerLoop::new(
                wallet.clone(),
                orchestrator,
                sampler.clone(),
                delays,
                swaps,
                wallet_rng(self.config.worker.seed, wallet.index()),
                self.shutdown.clone(),
            );
            if let Some(bus) = &self.events {
                worker = worker.with_events(bus.clone());
            }
            workers.push(worker);
        }

        let started = Instant::now();
        let handles: Vec<_> = workers
            .into_iter()
            .map(|worker| tokio::spawn(worker.run()))
            .collect();

        let joined = join_all(handles).await;

        let results: Vec<WalletRunStats> = joined
            .into_iter()
            .zip(&wallets)
            .map(|(result, wallet)| match result {
                Ok(stats) => stats,
                Err(e) => {
                    error!("[Worker {}] Task failed: {}", wallet.index(), e);
                    WalletRunStats::new(wallet.index(), wallet.pubkey().to_string(), swaps)
                }
            })
            .collect();

        let stats = FleetStats::aggregate(results, swaps, started.elapsed());
        info!(
            "Run {} finished in {:.1}s: {}/{} successful",
            run_id,
            stats.elapsed.as_secs_f64(),
            stats.total_successful,
            stats.planned_swaps()
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_seeded_rngs_differ_per_wallet() {
        let a: u64 = wallet_rng(Some(7), 1).random();
        let a_again: u64 = wallet_rng(Some(7), 1).random();
        let b: u64 = wallet_rng(Some(7), 2).random();

        assert_eq!(a, a_again);
        assert_ne!(a, b);
    }
}
