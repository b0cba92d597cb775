//! Helper functions

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use solana_sdk::signature::Keypair;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::config::{NATIVE_TOKEN_DECIMALS, NATIVE_TOKEN_SYMBOL};

const SECRET_KEY_LEN: usize = 64;

pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 { 0.0 } else { numerator / denominator }
}

/// Lamports as an exact decimal in native-token units
pub fn lamports_to_tokens(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(lamports as i128, NATIVE_TOKEN_DECIMALS)
}

pub fn format_token_amount(lamports: u64) -> String {
    format!("{:.6} {}", lamports_to_tokens(lamports), NATIVE_TOKEN_SYMBOL)
}

/// Like [`format_token_amount`] but keeps precision for dust amounts
pub fn format_small_amount(lamports: u64) -> String {
    let amount = lamports_to_tokens(lamports);
    if amount < dec!(0.001) {
        format!("{:.8} {}", amount, NATIVE_TOKEN_SYMBOL)
    } else {
        format!("{:.6} {}", amount, NATIVE_TOKEN_SYMBOL)
    }
}

pub fn truncate_address(address: &str, length: usize) -> String {
    let end = address
        .char_indices()
        .nth(length)
        .map(|(i, _)| i)
        .unwrap_or(address.len());
    format!("{}...", &address[..end])
}

/// Parse one base58 secret key line
pub fn parse_secret_key(line: &str) -> Result<Keypair> {
    let bytes = bs58::decode(line)
        .into_vec()
        .context("secret key is not valid base58")?;
    anyhow::ensure!(
        bytes.len() == SECRET_KEY_LEN,
        "expected {} bytes, got {}",
        SECRET_KEY_LEN,
        bytes.len()
    );
    Keypair::from_bytes(&bytes).map_err(|e| anyhow::anyhow!("Invalid keypair: {}", e))
}

/// Load keypairs from a line-oriented base58 file.
///
/// Blank lines and `#` comments are skipped. Lines that fail to decode are
/// logged and skipped so one typo does not take the whole fleet down.
pub fn load_keypairs(path: &Path) -> Result<Vec<Keypair>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keypair file: {:?}", path))?;

    let mut keypairs = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_secret_key(line) {
            Ok(keypair) => {
                debug!(line = line_num + 1, "Loaded keypair");
                keypairs.push(keypair);
            }
            Err(e) => error!("Failed to load keypair from line {}: {:#}", line_num + 1, e),
        }
    }
    Ok(keypairs)
}

/// Normalize a proxy line, adding `http://` when the scheme is missing
pub fn normalize_proxy(line: &str) -> Option<String> {
    let proxy = line.trim();
    if proxy.is_empty() || proxy.starts_with('#') {
        return None;
    }
    let proxy = if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    };
    match url::Url::parse(&proxy) {
        Ok(_) => Some(proxy),
        Err(e) => {
            warn!("Skipping invalid proxy {}: {}", proxy, e);
            None
        }
    }
}

/// Load proxies; a missing file yields an empty list
pub fn load_proxies(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().filter_map(normalize_proxy).collect(),
        Err(_) => {
            warn!("Proxy file {:?} not found, running without proxies", path);
            Vec::new()
        }
    }
}
