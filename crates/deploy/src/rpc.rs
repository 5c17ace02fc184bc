//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    parse_response(method, result)
}

/// Extract the `result` of a JSON-RPC response, turning an `error` member into an error.
fn parse_response<T: DeserializeOwned>(method: &str, response: Value) -> Result<T, anyhow::Error> {
    if let Some(error) = response.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = response
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_result() {
        let accounts: Vec<String> = parse_response(
            "eth_accounts",
            serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": ["0x01"]}),
        )
        .unwrap();
        assert_eq!(accounts, ["0x01"]);

        // A pending receipt is a null result.
        let receipt: Option<Value> = parse_response(
            "eth_getTransactionReceipt",
            serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": null}),
        )
        .unwrap();
        assert!(receipt.is_none());
    }

    #[test]
    fn test_parse_response_error() {
        let err = parse_response::<Value>(
            "eth_sendTransaction",
            serde_json::json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "insufficient funds"}}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "RPC error: insufficient funds");
    }
}
