//! Funding channels
//!
//! - `NativeAirdropChannel`: JSON-RPC `requestAirdrop`, used against the
//!   primary network and again against the alternate network
//! - `AlternateFaucetChannel`: HTTP faucet with its own request body

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use super::{FundingChannel, FundingOutcome};
use crate::config::FaucetEndpoint;
use crate::network::http::{json_rpc, preview, read_body, JsonRpcResponse};

/// `requestAirdrop` against one RPC endpoint
pub struct NativeAirdropChannel {
    name: &'static str,
    client: Client,
    url: String,
    amount: u64,
    /// Error substrings read as "already funded"; empty disables the policy
    already_funded_patterns: Vec<String>,
}

impl NativeAirdropChannel {
    pub fn new(
        name: &'static str,
        client: Client,
        url: impl Into<String>,
        amount: u64,
        already_funded_patterns: Vec<String>,
    ) -> Self {
        Self {
            name,
            client,
            url: url.into(),
            amount,
            already_funded_patterns: already_funded_patterns
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }
}

/// Classify a `requestAirdrop` response
pub fn classify_airdrop(
    status: StatusCode,
    envelope: Option<&JsonRpcResponse>,
    already_funded_patterns: &[String],
) -> FundingOutcome {
    if status != StatusCode::OK {
        return FundingOutcome::Failed(format!("status {}", status));
    }
    let Some(envelope) = envelope else {
        return FundingOutcome::Failed("empty response".to_string());
    };

    if let Some(signature) = envelope.result_str() {
        return FundingOutcome::Funded(Some(signature.to_string()));
    }

    match &envelope.error {
        Some(error) => {
            let message = error.message.to_lowercase();
            if already_funded_patterns.iter().any(|p| message.contains(p.as_str())) {
                FundingOutcome::AlreadyFunded(error.message.clone())
            } else {
                FundingOutcome::Failed(error.message.clone())
            }
        }
        None => FundingOutcome::Failed("response without result".to_string()),
    }
}

#[async_trait]
impl FundingChannel for NativeAirdropChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn request(&self, pubkey: &Pubkey) -> FundingOutcome {
        let params = json!([pubkey.to_string(), self.amount]);
        match json_rpc(&self.client, &self.url, "requestAirdrop", params).await {
            Ok((status, envelope)) => {
                classify_airdrop(status, envelope.as_ref(), &self.already_funded_patterns)
            }
            Err(e) => FundingOutcome::Failed(e.to_string()),
        }
    }
}

/// Replace `$address` and `$amount` string values anywhere in `template`
pub fn render_body(template: &Value, address: &str, amount: u64) -> Value {
    match template {
        Value::String(s) if s == "$address" => Value::String(address.to_string()),
        Value::String(s) if s == "$amount" => json!(amount),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_body(v, address, amount)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_body(v, address, amount)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Classify an HTTP faucet reply: 200 or 201 funds the wallet, anything
/// else is a failure
pub fn classify_faucet_status(status: StatusCode, body: &str) -> FundingOutcome {
    if status == StatusCode::OK || status == StatusCode::CREATED {
        FundingOutcome::Funded(None)
    } else {
        FundingOutcome::Failed(format!("status {}: {}", status, preview(body, 200)))
    }
}

/// Faucet reachable over plain HTTP
pub struct AlternateFaucetChannel {
    client: Client,
    endpoint: FaucetEndpoint,
    amount: u64,
}

impl AlternateFaucetChannel {
    pub fn new(client: Client, endpoint: FaucetEndpoint, amount: u64) -> Self {
        Self {
            client,
            endpoint,
            amount,
        }
    }
}

#[async_trait]
impl FundingChannel for AlternateFaucetChannel {
    fn name(&self) -> &'static str {
        "alternate_faucet"
    }

    async fn request(&self, pubkey: &Pubkey) -> FundingOutcome {
        debug!("Trying faucet: {}", self.endpoint.url);
        let body = render_body(&self.endpoint.body, &pubkey.to_string(), self.amount);

        let response = match self
            .client
            .post(&self.endpoint.url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return FundingOutcome::Failed(format!("{}: {}", self.endpoint.url, e)),
        };

        let status = response.status();
        let text = read_body(response, &self.endpoint.url).await;
        debug!("Faucet {} response: {}", self.endpoint.url, preview(&text, 100));

        match classify_faucet_status(status, &text) {
            FundingOutcome::Failed(detail) => {
                FundingOutcome::Failed(format!("{} returned {}", self.endpoint.url, detail))
            }
            outcome => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<String> {
        ["limit", "already", "funded", "recent"].iter().map(|s| s.to_string()).collect()
    }

    fn envelope(value: Value) -> JsonRpcResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_airdrop_signature_is_funded() {
        let resp = envelope(json!({ "result": "3xAirdropSig" }));
        assert_eq!(
            classify_airdrop(StatusCode::OK, Some(&resp), &patterns()),
            FundingOutcome::Funded(Some("3xAirdropSig".to_string()))
        );
    }

    #[test]
    fn test_rate_limit_reads_as_already_funded() {
        let resp = envelope(json!({ "error": { "code": 429, "message": "Airdrop Rate LIMIT reached" } }));
        assert!(matches!(
            classify_airdrop(StatusCode::OK, Some(&resp), &patterns()),
            FundingOutcome::AlreadyFunded(_)
        ));
    }

    #[test]
    fn test_pattern_policy_can_be_disabled() {
        let resp = envelope(json!({ "error": { "code": 429, "message": "rate limit" } }));
        assert!(matches!(
            classify_airdrop(StatusCode::OK, Some(&resp), &[]),
            FundingOutcome::Failed(_)
        ));
    }

    #[test]
    fn test_other_errors_fail() {
        let resp = envelope(json!({ "error": { "code": -32601, "message": "Method not found" } }));
        assert!(!classify_airdrop(StatusCode::OK, Some(&resp), &patterns()).is_success());
        assert!(!classify_airdrop(StatusCode::BAD_GATEWAY, None, &patterns()).is_success());
    }

    #[test]
    fn test_faucet_ok_and_created_fund() {
        assert_eq!(classify_faucet_status(StatusCode::OK, ""), FundingOutcome::Funded(None));
        assert_eq!(
            classify_faucet_status(StatusCode::CREATED, r#"{"queued":true}"#),
            FundingOutcome::Funded(None)
        );
    }

    #[test]
    fn test_faucet_other_statuses_fail() {
        for status in [
            StatusCode::ACCEPTED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            match classify_faucet_status(status, "try later") {
                FundingOutcome::Failed(detail) => {
                    assert!(detail.contains(status.as_str()));
                    assert!(detail.contains("try later"));
                }
                other => panic!("{} gave {:?}", status, other),
            }
        }
    }

    #[tokio::test]
    async fn test_unreachable_faucet_fails() {
        let endpoint = FaucetEndpoint {
            url: "http://127.0.0.1:1/faucet".to_string(),
            body: json!({ "address": "$address" }),
        };
        let channel = AlternateFaucetChannel::new(Client::new(), endpoint, 1);
        assert!(!channel.request(&Pubkey::new_unique()).await.is_success());
    }

    #[test]
    fn test_render_body_placeholders() {
        let template = json!({ "address": "$address", "amount": "$amount", "network": "testnet", "nested": ["$address"] });
        let body = render_body(&template, "Wallet111", 2_000_000_000);
        assert_eq!(body["address"], "Wallet111");
        assert_eq!(body["amount"], 2_000_000_000u64);
        assert_eq!(body["network"], "testnet");
        assert_eq!(body["nested"][0], "Wallet111");
    }

    #[test]
    fn test_patterns_lowercased_on_construction() {
        let channel = NativeAirdropChannel::new(
            "native_airdrop",
            Client::new(),
            "http://127.0.0.1:1",
            1,
            vec!["LIMIT".to_string()],
        );
        assert_eq!(channel.already_funded_patterns, vec!["limit".to_string()]);
    }
}
