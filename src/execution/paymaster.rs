//! Paymaster submission channel
//!
//! Posts the transaction exactly as the aggregator built it; the paymaster
//! adds the fee payer signature and forwards it. The response body is the
//! bare signature, sometimes wrapped in JSON quotes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, error};

use super::submitter::{SubmissionChannel, SubmissionPayload};
use super::{RejectKind, RejectReason, SubmissionOutcome};
use crate::config::PaymasterConfig;
use crate::network::http::{preview, read_body};

pub struct PaymasterChannel {
    client: Client,
    config: PaymasterConfig,
}

impl PaymasterChannel {
    pub fn new(client: Client, config: &PaymasterConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }
}

/// Classify a paymaster HTTP response
pub fn classify_response(status: StatusCode, body: &str, config: &PaymasterConfig) -> SubmissionOutcome {
    if status == StatusCode::OK {
        let reference = body.trim().trim_matches('"');
        if !reference.is_empty() && reference != "null" && reference.len() >= config.min_reference_len {
            return SubmissionOutcome::Accepted(reference.to_string());
        }
        return SubmissionOutcome::Rejected(RejectReason::transient(format!(
            "empty or invalid result: {}",
            preview(reference, 64)
        )));
    }

    if let Some(code) = config
        .transient_error_codes
        .iter()
        .find(|code| body.contains(code.as_str()))
    {
        return SubmissionOutcome::Rejected(RejectReason::transient(format!(
            "known transaction error ({})",
            code
        )));
    }

    if status.is_server_error() {
        return SubmissionOutcome::Rejected(RejectReason::transient(format!("server error ({})", status)));
    }

    SubmissionOutcome::Rejected(RejectReason::hard(format!(
        "status {}: {}",
        status,
        preview(body, 200)
    )))
}

#[async_trait]
impl SubmissionChannel for PaymasterChannel {
    fn name(&self) -> &'static str {
        "paymaster"
    }

    async fn submit(&self, payload: &SubmissionPayload) -> SubmissionOutcome {
        let response = self
            .client
            .post(&self.config.url)
            .json(&json!({ "transaction": payload.original }))
            .send()
            .await;

        let outcome = match response {
            Ok(resp) => {
                let status = resp.status();
                let body = read_body(resp, &self.config.url).await;
                classify_response(status, &body, &self.config)
            }
            Err(e) => SubmissionOutcome::Rejected(RejectReason::transient(format!("request failed: {}", e))),
        };

        if let SubmissionOutcome::Rejected(reason) = &outcome {
            match reason.kind {
                RejectKind::Transient => debug!("Paymaster: {} - trying fallback", reason.detail),
                RejectKind::Hard => error!("Paymaster returned {}", reason.detail),
            }
        }

        outcome
    }
}
