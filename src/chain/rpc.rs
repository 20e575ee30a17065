//! Minimal JSON-RPC 2.0 client over HTTP
//!
//! One request per call, no retries and no knowledge of method semantics.
//! Failover lives in the sender; this layer only reports what happened.

use crate::error::{FireError, FireResult};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default per-call timeout so one hung endpoint cannot stall the run
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw JSON-RPC transport against an endpoint URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Issue a single JSON-RPC request and return its `result`
    async fn call(&self, url: &str, method: &str, params: Value) -> FireResult<Value>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    jsonrpc: Option<String>,
    /// `None` when the key is absent, `Some(Value::Null)` for an explicit null
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP implementation of [`RpcClient`]
pub struct HttpRpcClient {
    http: Client,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a client with the given per-call timeout
    pub fn new(timeout: Duration) -> FireResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FireError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn call(&self, url: &str, method: &str, params: Value) -> FireResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!("RPC {} -> {} (id {})", method, url, id);

        let response = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let parsed: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(FireError::Decode(format!(
                    "Malformed JSON-RPC response for {}: {}",
                    method, e
                )))
            }
            Err(_) => {
                return Err(FireError::Transport(format!("HTTP {} from {}", status, url)));
            }
        };

        if parsed.jsonrpc.as_deref() != Some("2.0") {
            if !status.is_success() {
                return Err(FireError::Transport(format!("HTTP {} from {}", status, url)));
            }
            return Err(FireError::Decode(format!(
                "Response to {} from {} is not JSON-RPC 2.0",
                method, url
            )));
        }

        if let Some(err) = parsed.error {
            return Err(FireError::from_rpc_error(err.code, err.message));
        }

        if !status.is_success() {
            return Err(FireError::Transport(format!("HTTP {} from {}", status, url)));
        }

        // An explicit `null` is valid (e.g. receipt not yet available)
        parsed.result.ok_or_else(|| {
            FireError::Decode(format!("Response to {} from {} has no result", method, url))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpRpcClient {
        HttpRpcClient::new(Duration::from_millis(500)).unwrap()
    }

    #[tokio::test]
    async fn returns_result_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "jsonrpc": "2.0", "method": "eth_blockNumber" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x10" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client()
            .call(&server.uri(), "eth_blockNumber", json!([]))
            .await
            .unwrap();
        assert_eq!(result, json!("0x10"));
    }

    #[tokio::test]
    async fn null_result_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": null })),
            )
            .mount(&server)
            .await;

        let result = client()
            .call(&server.uri(), "eth_getTransactionReceipt", json!(["0x00"]))
            .await
            .unwrap();
        assert!(result.is_null());
    }

    #[tokio::test]
    async fn maps_error_objects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "execution reverted: cooldown" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getTransactionCount" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32601, "message": "method not found" }
            })))
            .mount(&server)
            .await;

        let rpc = client();
        let err = rpc
            .call(&server.uri(), "eth_sendRawTransaction", json!(["0x00"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FireError::Revert(ref m) if m.contains("cooldown")));

        let err = rpc
            .call(&server.uri(), "eth_getTransactionCount", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, FireError::Rpc { code: -32601, .. }));
    }

    #[tokio::test]
    async fn http_failure_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = client()
            .call(&server.uri(), "eth_blockNumber", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, FireError::Transport(_)));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x1" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = client()
            .call(&server.uri(), "eth_blockNumber", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, FireError::Transport(_)));
    }

    #[tokio::test]
    async fn non_json_rpc_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hello": "world" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1 })),
            )
            .mount(&server)
            .await;

        let rpc = client();
        let err = rpc
            .call(&server.uri(), "eth_getTransactionReceipt", json!(["0x00"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FireError::Decode(_)));

        // Versioned envelope, but neither result nor error
        let err = rpc
            .call(&server.uri(), "eth_blockNumber", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, FireError::Decode(_)));
    }
}
