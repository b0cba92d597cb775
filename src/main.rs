//! FOGO Swap Bot
//!
//! Drives a fleet of FOGO testnet wallets through repeated DEX swaps:
//! - Verifies the network before starting
//! - Funds empty wallets through airdrop and faucet fallbacks
//! - Submits swaps through the paymaster with direct RPC as fallback
//! - Reports per-wallet and fleet statistics at the end

use anyhow::{Context, Result};
use clap::Parser;
use rand::seq::IndexedRandom;
use reqwest::Client;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use fogo_swap_bot::agent::{report, wallet_rng, FleetRunner, SwapOrchestrator};
use fogo_swap_bot::config::AppConfig;
use fogo_swap_bot::faucet::{fund_fleet, FundingAcquirer};
use fogo_swap_bot::network::http::build_client;
use fogo_swap_bot::network::rpc_client::report_balances;
use fogo_swap_bot::network::{BalanceOracle, Event, EventBus, RpcManager, SignatureCheck};
use fogo_swap_bot::state::{spawn_progress_monitor, FleetProgress};
use fogo_swap_bot::telemetry::{init_logging, init_metrics};
use fogo_swap_bot::utils::helpers::{load_keypairs, load_proxies};
use fogo_swap_bot::utils::types::{FleetStats, Wallet};

/// FOGO testnet multi-wallet swap bot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Swaps per wallet
    #[arg(long)]
    swaps: Option<u32>,

    /// Minimum delay between swaps, in seconds
    #[arg(long)]
    min_delay: Option<f64>,

    /// Maximum delay between swaps, in seconds
    #[arg(long)]
    max_delay: Option<f64>,

    /// Route each wallet through a proxy from the proxy file
    #[arg(long)]
    use_proxies: bool,

    /// Report wallet balances before and after the run
    #[arg(long)]
    check_balances: bool,

    /// Request airdrops for every wallet before starting
    #[arg(long)]
    airdrop: bool,

    /// Skip the network verification step
    #[arg(long)]
    skip_verify: bool,

    /// Look up recorded signatures after the run
    #[arg(long)]
    verify_signatures: bool,

    /// Fixed RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_or_default(&args.config)?;

    // Apply CLI overrides
    if let Some(swaps) = args.swaps {
        config.worker.swaps_per_wallet = swaps;
    }
    if let Some(min_delay) = args.min_delay {
        config.worker.min_delay_secs = min_delay;
    }
    if let Some(max_delay) = args.max_delay {
        config.worker.max_delay_secs = max_delay;
    }
    if args.use_proxies {
        config.wallets.use_proxies = true;
    }
    if args.seed.is_some() {
        config.worker.seed = args.seed;
    }
    if let Some(level) = args.log_level {
        config.telemetry.log_level = level;
    }
    config.validate()?;

    let _log_guard = init_logging(&config.telemetry)?;

    info!("Starting FOGO Swap Bot v{}", env!("CARGO_PKG_VERSION"));
    info!("RPC endpoint: {}", config.rpc.url);
    info!(
        "Swaps per wallet: {} | Delay: {:.1}-{:.1}s",
        config.worker.swaps_per_wallet, config.worker.min_delay_secs, config.worker.max_delay_secs
    );

    if config.telemetry.enable_metrics {
        init_metrics(config.telemetry.metrics_port)?;
        info!("Metrics server started on port {}", config.telemetry.metrics_port);
    }

    let config = Arc::new(config);
    let rpc = Arc::new(RpcManager::new(&config.rpc));

    if args.skip_verify {
        warn!("Skipping network verification for {}", rpc.url());
    } else {
        let report = rpc.verify_connection().await?;
        anyhow::ensure!(
            report.is_active(),
            "Network {} is not producing slots, aborting",
            report.genesis_hash
        );
    }

    let wallets: Vec<Arc<Wallet>> = load_keypairs(&config.wallets.keys_path)?
        .into_iter()
        .enumerate()
        .map(|(i, keypair)| Arc::new(Wallet::new(i + 1, keypair)))
        .collect();
    anyhow::ensure!(
        !wallets.is_empty(),
        "No valid keypairs found in {:?}",
        config.wallets.keys_path
    );
    info!("Loaded {} wallets", wallets.len());

    let clients = build_wallet_clients(&config, &wallets)?;
    let pubkeys: Vec<_> = wallets.iter().map(|w| w.pubkey()).collect();

    if args.check_balances {
        report_balances(rpc.as_ref(), &pubkeys).await;
    }

    let events = EventBus::default();
    let progress = Arc::new(FleetProgress::new(wallets.len()));
    let monitor = spawn_progress_monitor(&events, progress.clone());

    if args.airdrop {
        let targets: Vec<_> = wallets
            .iter()
            .map(|w| {
                let client = clients.get(&w.index()).cloned().unwrap_or_default();
                (
                    w.pubkey(),
                    FundingAcquirer::from_config(client, &config.rpc, &config.funding),
                )
            })
            .collect();
        fund_fleet(&targets, Some(&events)).await;

        if args.check_balances {
            report_balances(rpc.as_ref(), &pubkeys).await;
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_events = events.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping after in-flight work...");
                shutdown_events.publish(Event::ShutdownRequested);
                let _ = shutdown_tx.send(true);
            }
            Err(err) => error!("Error listening for shutdown signal: {}", err),
        }
    });

    let oracle: Arc<dyn BalanceOracle> = rpc.clone();
    let runner = FleetRunner::new(config.clone(), shutdown_rx).with_events(events.clone());
    let stats = runner
        .run(wallets.clone(), |wallet| {
            let client = clients
                .get(&wallet.index())
                .cloned()
                .with_context(|| format!("No HTTP client for wallet {}", wallet.index()))?;
            Ok(SwapOrchestrator::for_wallet(&config, oracle.clone(), client))
        })
        .await?;

    report::log_summary(&stats, &config.explorer_url);
    report::log_efficiency_report(&stats);

    if args.check_balances {
        report_balances(rpc.as_ref(), &pubkeys).await;
    }
    if args.verify_signatures {
        verify_signatures(&rpc, &stats).await;
    }

    monitor.abort();
    info!("FOGO Swap Bot stopped");
    Ok(())
}

/// One HTTP client per wallet, each with its own user agent and optional proxy
fn build_wallet_clients(config: &AppConfig, wallets: &[Arc<Wallet>]) -> Result<HashMap<usize, Client>> {
    let proxies = if config.wallets.use_proxies {
        let proxies = load_proxies(&config.wallets.proxies_path);
        info!("Loaded {} proxies", proxies.len());
        proxies
    } else {
        Vec::new()
    };

    let mut rng = wallet_rng(config.worker.seed, 0);
    let mut clients = HashMap::with_capacity(wallets.len());

    for wallet in wallets {
        let user_agent = config
            .http
            .user_agents
            .choose(&mut rng)
            .map(String::as_str)
            .unwrap_or_default();
        let proxy = proxies.choose(&mut rng).map(String::as_str);
        if let Some(proxy) = proxy {
            info!("[Worker {}] Using proxy: {}", wallet.index(), proxy);
        }

        let client = match build_client(&config.http, user_agent, proxy) {
            Ok(client) => client,
            Err(e) => {
                warn!("[Worker {}] Proxy client failed ({}), using direct connection", wallet.index(), e);
                build_client(&config.http, user_agent, None)?
            }
        };
        clients.insert(wallet.index(), client);
    }

    Ok(clients)
}

async fn verify_signatures(rpc: &RpcManager, stats: &FleetStats) {
    info!("Verifying recorded signatures...");
    for wallet in &stats.wallets {
        for reference in &wallet.references {
            let check = rpc.signature_status(reference).await;
            match check {
                SignatureCheck::Landed => info!("[Worker {}] {} landed", wallet.worker_id, reference),
                SignatureCheck::Unverifiable => {
                    info!("[Worker {}] {} cannot be verified", wallet.worker_id, reference)
                }
                SignatureCheck::NotFound | SignatureCheck::Failed => {
                    warn!("[Worker {}] {} {:?}", wallet.worker_id, reference, check)
                }
            }
        }
    }
}
