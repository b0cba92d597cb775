//! HTTP plumbing shared by the remote channels
//!
//! Every wallet gets its own `reqwest::Client` so that the proxy and the
//! browser user agent chosen for it stay fixed for the whole run.

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::HttpConfig;
use crate::utils::error::{SwapError, SwapResult};

/// JSON-RPC response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl JsonRpcResponse {
    /// Non-empty string result, if any
    pub fn result_str(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Build a client bound to one user agent and an optional proxy
pub fn build_client(config: &HttpConfig, user_agent: &str, proxy: Option<&str>) -> SwapResult<Client> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_millis(config.timeout_ms))
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms));

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| SwapError::Proxy {
            proxy: proxy.to_string(),
            reason: e.to_string(),
        })?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Post a JSON-RPC call.
///
/// Returns the HTTP status together with the decoded envelope. A non-200
/// status yields `None` for the body since the remote side does not
/// promise JSON on errors.
pub async fn json_rpc(
    client: &Client,
    url: &str,
    method: &str,
    params: Value,
) -> SwapResult<(StatusCode, Option<JsonRpcResponse>)> {
    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    let response = client.post(url).json(&request).send().await?;
    let status = response.status();

    if status != StatusCode::OK {
        let body = read_body(response, url).await;
        debug!(method, %status, body = %preview(&body, 200), "JSON-RPC call returned non-200");
        return Ok((status, None));
    }

    let envelope: JsonRpcResponse = response.json().await?;
    Ok((status, Some(envelope)))
}

/// Response body as text; an unreadable body is logged and read as empty
pub async fn read_body(response: Response, source: &str) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!("Failed to read response body from {}: {}", source, e);
            String::new()
        }
    }
}

/// First `max` characters of a response body for log lines
pub fn preview(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_with_result() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"5xSig"}"#).unwrap();
        assert_eq!(resp.result_str(), Some("5xSig"));
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_envelope_with_error() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"rate limit"}}"#,
        )
        .unwrap();
        assert_eq!(resp.result_str(), None);
        assert_eq!(resp.error.unwrap().message, "rate limit");
    }

    #[test]
    fn test_empty_result_is_none() {
        let resp: JsonRpcResponse = serde_json::from_str(r#"{"result":""}"#).unwrap();
        assert_eq!(resp.result_str(), None);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("abcdef", 3), "abc");
        assert_eq!(preview("ab", 3), "ab");
        assert_eq!(preview("ééé", 2), "éé");
    }

    #[test]
    fn test_build_client_rejects_bad_proxy() {
        let config = HttpConfig::default();
        assert!(build_client(&config, "agent", None).is_ok());
        let err = build_client(&config, "agent", Some("http://proxy:notaport")).unwrap_err();
        assert!(matches!(err, SwapError::Proxy { .. }));
    }
}
