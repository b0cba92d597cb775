//! Prometheus metrics export

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub fn init_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metrics();
    info!("Prometheus metrics server started on {}", addr);
    Ok(())
}

fn register_metrics() {
    // Swap metrics
    describe_counter!("fogo_swap_bot_swaps_total", "Swap operations with a recorded outcome");
    describe_counter!("fogo_swap_bot_swaps_success", "Swap operations counted as successful");
    describe_counter!("fogo_swap_bot_swaps_failed", "Swap operations counted as failed");
    describe_counter!("fogo_swap_bot_swap_volume_lamports", "Input volume of successful swaps");
    describe_histogram!("fogo_swap_bot_swap_latency_ms", "End-to-end latency of one swap operation");

    // Channel metrics
    describe_counter!("fogo_swap_bot_funding_attempts", "Funding channel attempts by channel and outcome");
    describe_counter!("fogo_swap_bot_submissions", "Submission channel attempts by channel and outcome");

    // Worker metrics
    describe_gauge!("fogo_swap_bot_active_workers", "Wallet loops currently running");
}

pub fn record_swap_success(amount_in: u64, latency_ms: u64) {
    counter!("fogo_swap_bot_swaps_total").increment(1);
    counter!("fogo_swap_bot_swaps_success").increment(1);
    counter!("fogo_swap_bot_swap_volume_lamports").increment(amount_in);
    histogram!("fogo_swap_bot_swap_latency_ms").record(latency_ms as f64);
}

pub fn record_swap_failure(latency_ms: u64) {
    counter!("fogo_swap_bot_swaps_total").increment(1);
    counter!("fogo_swap_bot_swaps_failed").increment(1);
    histogram!("fogo_swap_bot_swap_latency_ms").record(latency_ms as f64);
}

pub fn record_funding_attempt(channel: &'static str, outcome: &'static str) {
    counter!("fogo_swap_bot_funding_attempts", "channel" => channel, "outcome" => outcome).increment(1);
}

pub fn record_submission(channel: &'static str, outcome: &'static str) {
    counter!("fogo_swap_bot_submissions", "channel" => channel, "outcome" => outcome).increment(1);
}

pub fn worker_started() {
    gauge!("fogo_swap_bot_active_workers").increment(1.0);
}

pub fn worker_finished() {
    gauge!("fogo_swap_bot_active_workers").decrement(1.0);
}
