//! DEX aggregator client
//!
//! Quote and transaction build for the one fixed swap pair:
//! - `GET /dex/quote` for the minimum output and pool
//! - `GET /dex/txs/swap` for the serialized, unsigned transaction

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Response};
use serde::{Deserialize, Deserializer};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::config::DexConfig;
use crate::network::http::preview;
use crate::utils::error::{SwapError, SwapResult};
use crate::utils::types::SwapDirection;

/// Price quote for one swap attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub min_out: u64,
    pub pool_address: String,
    pub direction: SwapDirection,
}

/// Unsigned transaction as returned by the aggregator
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    /// Base64 exactly as received
    pub encoded: String,
    pub raw: Vec<u8>,
}

impl BuiltTransaction {
    pub fn from_base64(encoded: String) -> SwapResult<Self> {
        let raw = base64::engine::general_purpose::STANDARD.decode(encoded.as_bytes())?;
        Ok(Self { encoded, raw })
    }
}

/// Quote and build stage.
///
/// Single request each, no retries and no state between calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapRouter: Send + Sync {
    async fn quote(&self, amount_in: u64, direction: SwapDirection) -> SwapResult<Quote>;

    async fn build(&self, owner: &Pubkey, amount_in: u64, quote: &Quote) -> SwapResult<BuiltTransaction>;
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(default)]
    quote: Option<QuoteBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteBody {
    #[serde(deserialize_with = "de_lenient_u64")]
    token_min_out: u64,
    pool_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapTxEnvelope {
    #[serde(default)]
    serialized_tx: Option<String>,
}

/// Amounts arrive either as JSON numbers or as decimal strings
fn de_lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(u64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn parse_quote(body: &str, direction: SwapDirection) -> SwapResult<Quote> {
    let envelope: QuoteEnvelope = serde_json::from_str(body)?;
    let quote = envelope.quote.ok_or(SwapError::MissingField("quote"))?;
    Ok(Quote {
        min_out: quote.token_min_out,
        pool_address: quote.pool_address,
        direction,
    })
}

fn parse_built(body: &str) -> SwapResult<BuiltTransaction> {
    let envelope: SwapTxEnvelope = serde_json::from_str(body)?;
    let encoded = envelope
        .serialized_tx
        .filter(|s| !s.is_empty())
        .ok_or(SwapError::MissingField("serializedTx"))?;
    BuiltTransaction::from_base64(encoded)
}

async fn success_body(response: Response) -> SwapResult<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(SwapError::Status {
            status,
            body: preview(&body, 200).to_string(),
        });
    }
    Ok(body)
}

/// Aggregator client bound to one wallet's HTTP client
pub struct DexClient {
    client: Client,
    config: DexConfig,
}

impl DexClient {
    pub fn new(client: Client, config: &DexConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    fn base_params(&self, amount_in: u64, direction: SwapDirection) -> Vec<(&'static str, String)> {
        vec![
            ("mintA", self.config.mint_a.clone()),
            ("mintB", self.config.mint_b.clone()),
            ("aForB", direction.a_for_b().to_string()),
            ("isExactIn", "true".to_string()),
            ("inputAmount", amount_in.to_string()),
            ("feePayer", self.config.fee_payer.clone()),
        ]
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let origin = self.config.origin.trim_end_matches('/');
        self.client
            .get(format!("{}{}", self.config.api_url.trim_end_matches('/'), path))
            .header("Accept", "*/*")
            .header("Accept-Language", "en-US,en;q=0.5")
            .header("Referer", format!("{}/", origin))
            .header("Origin", origin)
    }
}

#[async_trait]
impl SwapRouter for DexClient {
    async fn quote(&self, amount_in: u64, direction: SwapDirection) -> SwapResult<Quote> {
        debug!("Getting swap quote for {} ({})", amount_in, direction);

        let response = self
            .get("/dex/quote")
            .query(&self.base_params(amount_in, direction))
            .send()
            .await?;

        let body = success_body(response).await?;
        parse_quote(&body, direction)
    }

    async fn build(&self, owner: &Pubkey, amount_in: u64, quote: &Quote) -> SwapResult<BuiltTransaction> {
        debug!("Getting swap transaction for pool {}", quote.pool_address);

        let owner = owner.to_string();
        let mut params = self.base_params(amount_in, quote.direction);
        params.extend([
            ("userAddress", owner.clone()),
            ("sessionAddress", owner),
            ("outputAmount", quote.min_out.to_string()),
            ("poolAddress", quote.pool_address.clone()),
        ]);

        let response = self.get("/dex/txs/swap").query(&params).send().await?;

        let body = success_body(response).await?;
        parse_built(&body)
    }
}
