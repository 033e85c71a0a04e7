// crates/reward-audit-chain/src/dev_rpc.rs
//
// JSON-RPC 2.0 client for the fork node's `dev_*` control methods, POSTed
// over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::json;

use reward_audit_core::AuditError;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The call's result, or the server-reported error as [`AuditError::Fork`].
    ///
    /// A response without either field is a `null` result.
    pub fn into_result(self, method: &str) -> Result<serde_json::Value, AuditError> {
        match (self.error, self.result) {
            (Some(err), _) => Err(AuditError::Fork(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            ))),
            (None, result) => Ok(result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// `dev_setStorage` params for raw `(key, value)` pairs.
pub fn set_storage_params(pairs: &[(&[u8], &[u8])]) -> serde_json::Value {
    let entries: Vec<[String; 2]> = pairs
        .iter()
        .map(|(key, value)| {
            [
                format!("0x{}", hex::encode(key)),
                format!("0x{}", hex::encode(value)),
            ]
        })
        .collect();
    json!([entries])
}

/// HTTP JSON-RPC client bound to one fork node.
#[derive(Debug)]
pub struct DevRpcClient {
    endpoint: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl DevRpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one call and return its `result`.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AuditError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AuditError::Rpc(format!("{} request failed: {}", method, e)))?;

        if !resp.status().is_success() {
            return Err(AuditError::Rpc(format!(
                "{} returned HTTP {}",
                method,
                resp.status()
            )));
        }

        let body: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| AuditError::Rpc(format!("{} response unreadable: {}", method, e)))?;
        body.into_result(method)
    }

    /// Write raw storage pairs into the fork head.
    pub async fn set_storage(&self, pairs: &[(&[u8], &[u8])]) -> Result<(), AuditError> {
        self.call("dev_setStorage", set_storage_params(pairs)).await?;
        Ok(())
    }

    /// Build exactly one block.
    pub async fn new_block(&self) -> Result<serde_json::Value, AuditError> {
        self.call("dev_newBlock", json!([{ "count": 1 }])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "dev_newBlock".to_string(),
            params: json!([{ "count": 1 }]),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "dev_newBlock",
                "params": [{ "count": 1 }]
            })
        );
    }

    #[test]
    fn test_set_storage_params_hex_pairs() {
        let params = set_storage_params(&[(&b":code"[..], &[0xde_u8, 0xad][..])]);
        assert_eq!(params, json!([[["0x3a636f6465", "0xdead"]]]));
    }

    #[test]
    fn test_response_result() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0xabc"}"#).unwrap();
        assert_eq!(resp.into_result("chain_getBlockHash").unwrap(), json!("0xabc"));
    }

    #[test]
    fn test_response_null_result() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert_eq!(resp.into_result("dev_setStorage").unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_response_error() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        let err = resp.into_result("dev_newBlock").unwrap_err();
        match err {
            AuditError::Fork(msg) => {
                assert!(msg.contains("dev_newBlock"));
                assert!(msg.contains("-32601"));
            }
            other => panic!("Expected Fork, got: {:?}", other),
        }
    }
}
