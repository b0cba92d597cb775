//! Transaction Submitter
//!
//! Signs the built transaction and walks the submission channels in
//! priority order, stopping at the first one that takes it. A rejection is
//! never retried on the same channel.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::dex::BuiltTransaction;
use super::signer::sign_serialized;
use super::{
    RejectReason, SubmissionError, SubmissionOutcome, SubmissionReceipt, TxReference,
    PLACEHOLDER_SIGNATURE,
};
use crate::network::http::{json_rpc, JsonRpcResponse};
use crate::telemetry::metrics;
use crate::utils::types::Wallet;

/// Both forms of one transaction, built once per submission
#[derive(Debug, Clone)]
pub struct SubmissionPayload {
    /// Base64 as the aggregator returned it
    pub original: String,
    /// Locally signed bytes, or the original bytes if signing failed
    pub signed: Vec<u8>,
    pub locally_signed: bool,
}

/// One way of getting a transaction onto the network
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubmissionChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn submit(&self, payload: &SubmissionPayload) -> SubmissionOutcome;
}

/// Direct `sendTransaction` against the network RPC, preflight disabled
pub struct RpcSubmitChannel {
    client: Client,
    url: String,
}

impl RpcSubmitChannel {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

/// Classify a `sendTransaction` response
pub fn classify_send_result(status: StatusCode, envelope: Option<&JsonRpcResponse>) -> SubmissionOutcome {
    if status != StatusCode::OK {
        return SubmissionOutcome::Rejected(RejectReason::hard(format!("RPC returned status {}", status)));
    }

    match envelope.and_then(JsonRpcResponse::result_str) {
        Some(PLACEHOLDER_SIGNATURE) => SubmissionOutcome::Ambiguous("placeholder signature".to_string()),
        Some(signature) => SubmissionOutcome::Accepted(signature.to_string()),
        None => {
            let detail = envelope
                .and_then(|e| e.error.as_ref())
                .map(|e| format!("RPC error {}: {}", e.code, e.message))
                .unwrap_or_else(|| "RPC response without result".to_string());
            SubmissionOutcome::Rejected(RejectReason::hard(detail))
        }
    }
}

#[async_trait]
impl SubmissionChannel for RpcSubmitChannel {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn submit(&self, payload: &SubmissionPayload) -> SubmissionOutcome {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&payload.signed);
        let params = json!([encoded, { "skipPreflight": true, "encoding": "base64" }]);

        match json_rpc(&self.client, &self.url, "sendTransaction", params).await {
            Ok((status, envelope)) => {
                let outcome = classify_send_result(status, envelope.as_ref());
                if let SubmissionOutcome::Rejected(reason) = &outcome {
                    error!("RPC transaction failed: {}", reason);
                }
                outcome
            }
            Err(e) => {
                debug!("Direct RPC transaction failed: {}", e);
                SubmissionOutcome::Rejected(RejectReason::transient(e.to_string()))
            }
        }
    }
}

/// Ordered submission channels
pub struct SubmissionPipeline {
    channels: Vec<Box<dyn SubmissionChannel>>,
}

impl SubmissionPipeline {
    pub fn new(channels: Vec<Box<dyn SubmissionChannel>>) -> Self {
        Self { channels }
    }

    /// Sign and submit. Ok means some channel took the transaction, not
    /// that it landed.
    pub async fn submit(
        &self,
        wallet: &Wallet,
        tx: &BuiltTransaction,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let wallet_short = wallet.short();

        let payload = match sign_serialized(&tx.raw, wallet) {
            Ok(signed) => {
                debug!("Transaction signed successfully for {}", wallet_short);
                SubmissionPayload {
                    original: tx.encoded.clone(),
                    signed,
                    locally_signed: true,
                }
            }
            Err(e) => {
                warn!(
                    "Local signing failed for {}, submitting original bytes: {}",
                    wallet_short, e
                );
                SubmissionPayload {
                    original: tx.encoded.clone(),
                    signed: tx.raw.clone(),
                    locally_signed: false,
                }
            }
        };

        let mut last = "no submission channels configured".to_string();

        for channel in &self.channels {
            let name = channel.name();
            debug!("Sending through {} for {}", name, wallet_short);

            match channel.submit(&payload).await {
                SubmissionOutcome::Accepted(signature) => {
                    metrics::record_submission(name, "accepted");
                    info!("[{}] {} TX: {}", wallet_short, name, signature);
                    return Ok(SubmissionReceipt {
                        channel: name,
                        reference: TxReference::Signature(signature),
                    });
                }
                SubmissionOutcome::Ambiguous(reason) => {
                    metrics::record_submission(name, "ambiguous");
                    info!(
                        "[{}] Transaction submitted through {} ({})",
                        wallet_short, name, reason
                    );
                    return Ok(SubmissionReceipt {
                        channel: name,
                        reference: TxReference::Placeholder,
                    });
                }
                SubmissionOutcome::Rejected(reason) => {
                    metrics::record_submission(name, "rejected");
                    last = format!("{}: {}", name, reason);
                }
            }
        }

        Err(SubmissionError::Exhausted {
            attempted: self.channels.len(),
            last,
        })
    }
}
