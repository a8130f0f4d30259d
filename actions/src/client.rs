//! Two-phase action protocol client.
//!
//! Implements the GET (metadata) / POST (transaction) exchange against a
//! canonical endpoint. Every call is one attempt with a bounded timeout;
//! retries, if any, belong to the caller so a stateful endpoint is never
//! double-submitted against. Responses are validated into the strict
//! types in [`crate::types`] before leaving this module.

use std::collections::BTreeMap;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::resolved::ResolvedConfig;
use crate::resolver::CanonicalUrl;
use crate::types::{ActionError, ActionMetadata, ActionTransaction, ErrorCode, ParamValue};

/// Maximum response-body length carried in error details.
const BODY_SNIPPET_LEN: usize = 256;

/// HTTP client for the two-phase protocol exchange.
pub struct ActionClient {
    http: reqwest::Client,
}

impl ActionClient {
    pub(crate) fn new(config: &ResolvedConfig) -> Result<Self, ActionError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ActionError::new(
                    ErrorCode::Internal,
                    format!("failed to build HTTP client: {e}"),
                    false,
                )
            })?;
        Ok(Self { http })
    }

    /// Shared connection pool, reused by the registry source.
    #[must_use]
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// GET phase: fetch and validate endpoint metadata.
    pub async fn metadata(&self, url: &CanonicalUrl) -> Result<ActionMetadata, ActionError> {
        tracing::debug!(url = url.as_str(), "fetching action metadata");
        let response = self
            .http
            .get(url.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(fetch_error(status, &body));
        }

        parse_metadata(&body)
    }

    /// POST phase: request an unsigned transaction for `account`.
    ///
    /// Extra `params` are forwarded verbatim alongside the account field.
    pub async fn transaction(
        &self,
        url: &CanonicalUrl,
        account: &str,
        params: &BTreeMap<String, ParamValue>,
    ) -> Result<ActionTransaction, ActionError> {
        tracing::debug!(url = url.as_str(), account, "requesting action transaction");
        let response = self
            .http
            .post(url.as_str())
            .header(ACCEPT, "application/json")
            .json(&post_body(account, params))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(fetch_error(status, &body));
        }

        parse_transaction(&body)
    }
}

/// JSON body for the POST phase: `{ account, ...params }`.
fn post_body(account: &str, params: &BTreeMap<String, ParamValue>) -> Value {
    let mut map = Map::new();
    map.insert("account".to_string(), Value::String(account.to_string()));
    for (name, value) in params {
        // The account field is authoritative; a colliding param must not
        // overwrite it.
        if name != "account" {
            map.insert(name.clone(), value.to_json());
        }
    }
    Value::Object(map)
}

pub(crate) fn map_transport_error(error: reqwest::Error) -> ActionError {
    if error.is_timeout() {
        ActionError::new(ErrorCode::Timeout, "request exceeded its bounded timeout", true)
    } else {
        ActionError::new(ErrorCode::Network, format!("network error: {error}"), true)
    }
}

fn fetch_error(status: reqwest::StatusCode, body: &str) -> ActionError {
    ActionError::new(
        ErrorCode::ActionFetch,
        format!("endpoint returned HTTP {status}"),
        status.is_server_error(),
    )
    .with_detail("status", status.as_str())
    .with_detail("body", snippet(body))
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_SNIPPET_LEN {
        return trimmed.to_string();
    }
    let mut end = BODY_SNIPPET_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

fn parse_metadata(body: &str) -> Result<ActionMetadata, ActionError> {
    let metadata: ActionMetadata = serde_json::from_str(body).map_err(|e| {
        ActionError::new(
            ErrorCode::Schema,
            format!("metadata response does not match the expected shape: {e}"),
            false,
        )
        .with_detail("body", snippet(body))
    })?;

    if metadata.title.trim().is_empty() {
        return Err(ActionError::new(
            ErrorCode::Schema,
            "metadata title must not be empty",
            false,
        ));
    }

    Ok(metadata)
}

#[derive(Deserialize)]
struct TransactionResponse {
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    signers: Option<Vec<String>>,
}

fn parse_transaction(body: &str) -> Result<ActionTransaction, ActionError> {
    let parsed: TransactionResponse = serde_json::from_str(body).map_err(|e| {
        ActionError::new(
            ErrorCode::Schema,
            format!("transaction response does not match the expected shape: {e}"),
            false,
        )
        .with_detail("body", snippet(body))
    })?;

    let transaction = parsed
        .transaction
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            ActionError::new(
                ErrorCode::MissingTransaction,
                "endpoint response carries no transaction payload",
                false,
            )
            .with_detail("body", snippet(body))
        })?;

    Ok(ActionTransaction {
        transaction,
        message: parsed.message,
        signers: parsed.signers,
    })
}
