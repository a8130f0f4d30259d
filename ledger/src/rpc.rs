//! JSON-RPC 2.0 ledger client.
//!
//! Speaks the three node methods the pipeline needs: pre-flight
//! simulation, submission, and liveness. Transport failures map to the
//! shared retryable network/timeout codes; node-reported errors map to
//! [`ErrorCode::Rpc`] with the node's own code and message preserved as
//! details.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use blink_actions::ports::Ledger;
use blink_actions::types::{ActionError, ErrorCode, SimulationOutcome};

#[derive(Debug)]
pub struct RpcLedger {
    http: reqwest::Client,
    endpoint: Url,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcLedger {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ActionError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ActionError::new(
                ErrorCode::BadArgs,
                format!("rpc endpoint is not a valid URL: {e}"),
                false,
            )
            .with_detail("endpoint", endpoint)
        })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ActionError::new(
                    ErrorCode::Internal,
                    format!("failed to build RPC client: {e}"),
                    false,
                )
            })?;

        Ok(Self { http, endpoint })
    }

    /// One request-response round trip. Returns the envelope's `result`
    /// field; a populated `error` field fails with [`ErrorCode::Rpc`].
    async fn call(&self, rpc_method: &str, params: Value) -> Result<Value, ActionError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": rpc_method,
            "params": params,
        });

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(rpc_method, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::new(
                ErrorCode::Rpc,
                format!("RPC node returned HTTP {status} for {rpc_method}"),
                status.is_server_error(),
            )
            .with_detail("status", status.as_u16().to_string())
            .with_detail("method", rpc_method));
        }

        let envelope: RpcEnvelope = response.json().await.map_err(|e| {
            ActionError::new(
                ErrorCode::Rpc,
                format!("RPC response for {rpc_method} is not valid JSON-RPC: {e}"),
                false,
            )
            .with_detail("method", rpc_method)
        })?;

        if let Some(error) = envelope.error {
            return Err(ActionError::new(
                ErrorCode::Rpc,
                format!("{rpc_method} failed: {}", error.message),
                false,
            )
            .with_detail("rpc_code", error.code.to_string())
            .with_detail("method", rpc_method));
        }

        envelope.result.ok_or_else(|| {
            ActionError::new(
                ErrorCode::Rpc,
                format!("RPC response for {rpc_method} carries neither result nor error"),
                false,
            )
            .with_detail("method", rpc_method)
        })
    }
}

fn transport_error(rpc_method: &str, error: &reqwest::Error) -> ActionError {
    let (code, message) = if error.is_timeout() {
        (
            ErrorCode::Timeout,
            format!("RPC call {rpc_method} timed out"),
        )
    } else {
        (
            ErrorCode::Network,
            format!("RPC call {rpc_method} failed: {error}"),
        )
    };
    ActionError::new(code, message, true).with_detail("method", rpc_method)
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn simulate(&self, transaction: &str) -> Result<SimulationOutcome, ActionError> {
        let result = self
            .call(
                "simulateTransaction",
                json!([
                    transaction,
                    {
                        "encoding": "base64",
                        "sigVerify": false,
                        "replaceRecentBlockhash": true,
                    }
                ]),
            )
            .await?;

        let value = &result["value"];
        let error = value.get("err").filter(|e| !e.is_null()).map(Value::to_string);
        let units_consumed = value
            .get("unitsConsumed")
            .and_then(Value::as_u64);

        let outcome = SimulationOutcome {
            success: error.is_none(),
            units_consumed,
            error,
        };
        tracing::debug!(
            success = outcome.success,
            units = outcome.units_consumed,
            "simulation completed"
        );
        Ok(outcome)
    }

    async fn submit(&self, signed_transaction: &str) -> Result<String, ActionError> {
        let result = self
            .call(
                "sendTransaction",
                json!([signed_transaction, { "encoding": "base64" }]),
            )
            .await?;

        result.as_str().map(ToString::to_string).ok_or_else(|| {
            ActionError::new(
                ErrorCode::Rpc,
                "sendTransaction result is not a signature string",
                false,
            )
        })
    }

    async fn health(&self) -> Result<(), ActionError> {
        let result = self.call("getHealth", json!([])).await?;
        if result.as_str() == Some("ok") {
            Ok(())
        } else {
            Err(ActionError::new(
                ErrorCode::Rpc,
                format!("RPC node reports unhealthy: {result}"),
                true,
            ))
        }
    }
}
