//! End-of-run summary and efficiency report

use tracing::{info, warn};

use crate::config::{LAMPORTS_PER_TOKEN, NATIVE_TOKEN_SYMBOL};
use crate::utils::helpers::{format_token_amount, lamports_to_tokens, safe_div};
use crate::utils::types::{FleetStats, WalletEfficiency};

/// Averages across the per-wallet efficiency rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FleetAverages {
    pub success_rate_pct: f64,
    pub total_volume: f64,
    pub swaps_per_minute: f64,
}

pub fn averages(rows: &[WalletEfficiency]) -> FleetAverages {
    let n = rows.len() as f64;
    FleetAverages {
        success_rate_pct: safe_div(rows.iter().map(|r| r.success_rate_pct).sum(), n),
        total_volume: safe_div(rows.iter().map(|r| r.total_volume as f64).sum(), n),
        swaps_per_minute: safe_div(rows.iter().map(|r| r.swaps_per_minute).sum(), n),
    }
}

/// Tuning hints derived from the efficiency rows
pub fn recommendations(rows: &[WalletEfficiency]) -> Vec<String> {
    let mut hints = Vec::new();
    if rows.is_empty() {
        return hints;
    }

    let best = rows
        .iter()
        .max_by(|a, b| a.success_rate_pct.total_cmp(&b.success_rate_pct));
    let worst = rows
        .iter()
        .min_by(|a, b| a.success_rate_pct.total_cmp(&b.success_rate_pct));

    if let (Some(best), Some(worst)) = (best, worst) {
        if best.success_rate_pct - worst.success_rate_pct > 20.0 {
            hints.push("Large performance difference detected between workers".to_string());
            hints.push(format!("Best: Worker {} ({:.1}%)", best.worker_id, best.success_rate_pct));
            hints.push(format!("Worst: Worker {} ({:.1}%)", worst.worker_id, worst.success_rate_pct));
            hints.push("Consider adjusting delays or proxy settings".to_string());
        }
    }

    let avg = averages(rows);
    if avg.success_rate_pct < 70.0 {
        hints.push(format!("Overall success rate is low ({:.1}%)", avg.success_rate_pct));
        hints.push("Consider increasing delays between transactions".to_string());
        hints.push("Check network conditions and RPC stability".to_string());
    }
    if avg.swaps_per_minute < 1.0 {
        hints.push(format!("Transaction speed is low ({:.2} swaps/min)", avg.swaps_per_minute));
        hints.push("Consider decreasing delays or optimizing network settings".to_string());
    }

    hints
}

pub fn log_summary(stats: &FleetStats, explorer_url: &str) {
    let attempted = stats.total_successful + stats.total_failed;

    if stats.interrupted() {
        warn!("Run interrupted before every swap was attempted");
    } else {
        info!("ALL WORKERS COMPLETED");
    }
    info!("Total execution time: {:.2} seconds", stats.elapsed.as_secs_f64());
    info!("Total swaps attempted: {} of {} planned", attempted, stats.planned_swaps());
    info!(
        "Successful swaps: {} ({:.1}%)",
        stats.total_successful,
        stats.success_rate_pct()
    );
    info!("Failed swaps: {}", stats.total_failed);
    info!("Total volume: {}", format_token_amount(stats.total_volume));
    info!("Explorer: {}", explorer_url);

    for wallet in &stats.wallets {
        info!(
            "Worker {}: {} ok / {} failed ({:.1}%) - {}",
            wallet.worker_id,
            wallet.successful,
            wallet.failed,
            safe_div(wallet.successful as f64, stats.swaps_per_wallet as f64) * 100.0,
            format_token_amount(wallet.volume)
        );
    }
}

pub fn log_efficiency_report(stats: &FleetStats) {
    let rows = stats.efficiency();
    if rows.is_empty() {
        return;
    }

    info!("EFFICIENCY REPORT");
    info!(
        "{:<8} {:<9} {:<12} {:<14} {:<10}",
        "Worker", "Success%", "Vol/Swap", "Total Vol", "Swaps/min"
    );
    for row in &rows {
        info!(
            "{:<8} {:<8.1}% {:<12} {:<14} {:<10.2}",
            row.worker_id,
            row.success_rate_pct,
            format!("{:.6}", lamports_to_tokens(row.volume_per_swap)),
            format!("{:.6}", lamports_to_tokens(row.total_volume)),
            row.swaps_per_minute
        );
    }

    let avg = averages(&rows);
    info!(
        "{:<8} {:<8.1}% {:<12} {:<14.6} {:<10.2}",
        "Average",
        avg.success_rate_pct,
        "-",
        avg.total_volume / LAMPORTS_PER_TOKEN as f64,
        avg.swaps_per_minute
    );
    info!("Volumes in {}", NATIVE_TOKEN_SYMBOL);

    let hints = recommendations(&rows);
    if !hints.is_empty() {
        info!("RECOMMENDATIONS:");
        for hint in hints {
            info!("  - {}", hint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(worker_id: usize, success: f64, speed: f64) -> WalletEfficiency {
        WalletEfficiency {
            worker_id,
            success_rate_pct: success,
            volume_per_swap: 100_000,
            total_volume: 1_000_000,
            swaps_per_minute: speed,
        }
    }

    #[test]
    fn test_healthy_fleet_has_no_hints() {
        let rows = vec![row(1, 90.0, 2.0), row(2, 80.0, 3.0)];
        assert!(recommendations(&rows).is_empty());
    }

    #[test]
    fn test_spread_and_low_success_hints() {
        let rows = vec![row(1, 100.0, 2.0), row(2, 20.0, 2.0)];
        let hints = recommendations(&rows);
        assert!(hints.iter().any(|h| h.contains("Large performance difference")));
        assert!(hints.iter().any(|h| h.contains("Best: Worker 1")));
        assert!(hints.iter().any(|h| h.contains("Overall success rate is low (60.0%)")));
    }

    #[test]
    fn test_slow_fleet_hint() {
        let rows = vec![row(1, 100.0, 0.5)];
        let hints = recommendations(&rows);
        assert_eq!(hints.len(), 2);
        assert!(hints[0].contains("0.50 swaps/min"));
    }

    #[test]
    fn test_averages() {
        let avg = averages(&[row(1, 50.0, 1.0), row(2, 100.0, 3.0)]);
        assert_eq!(avg.success_rate_pct, 75.0);
        assert_eq!(avg.swaps_per_minute, 2.0);
        assert_eq!(averages(&[]).success_rate_pct, 0.0);
    }
}
