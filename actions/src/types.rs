//! Domain types for the action pipeline.
//!
//! Input, output, configuration, and error types shared by every stage of
//! the pipeline. Wire payloads from third-party endpoints are validated
//! into these strict representations at the protocol-client boundary;
//! untyped JSON never travels past it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::{RefreshMode, TrustStatus};

/// Metadata describing what a user can do at an action endpoint.
///
/// Fetched fresh on every inspection; endpoints may serve dynamic content
/// (e.g. live pricing), so this is never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMetadata {
    /// Human-readable title. Required; an empty title is a schema error.
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Icon URL rendered by clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Label for the default (single-button) presentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Endpoint has marked itself non-executable.
    #[serde(default)]
    pub disabled: bool,

    /// Linked sub-actions, when the endpoint exposes more than one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<ActionLinks>,
}

/// Container for the `links.actions` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLinks {
    pub actions: Vec<LinkedAction>,
}

/// One executable action linked from metadata.
///
/// `href` may be relative; the pipeline resolves it against the canonical
/// endpoint's origin before it reaches a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAction {
    pub label: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ActionParameter>,
}

/// A user-supplied parameter declared by a linked action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionParameter {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Unsigned transaction payload returned by the POST phase.
///
/// Opaque to this crate beyond pass-through: the pipeline hands the
/// encoded payload to the external signer/ledger and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTransaction {
    /// Base64-encoded unsigned wire transaction.
    pub transaction: String,

    /// Optional human-readable note from the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Additional signer addresses the endpoint expects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<String>>,
}

/// Result of a ledger transaction simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units_consumed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Externally visible artifact of a successful inspection.
///
/// Immutable once constructed; all `href` values in `actions` are
/// absolute.
#[derive(Debug, Clone, Serialize)]
pub struct InspectResult {
    pub canonical_url: String,
    pub trust: TrustStatus,
    pub metadata: ActionMetadata,
    pub actions: Vec<LinkedAction>,
}

/// Endpoint parameter value: string or number, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(serde_json::Number),
    Text(String),
}

impl ParamValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Number(n) => serde_json::Value::Number(n.clone()),
            ParamValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Number(serde_json::Number::from(value))
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(serde_json::Number::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map_or_else(|| ParamValue::Text(value.to_string()), ParamValue::Number)
    }
}

/// Caller-supplied request for the execute operation.
///
/// Validated before any network call. Params not known to this crate are
/// forwarded to the endpoint verbatim (forward-compatible with
/// endpoint-specific fields).
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub raw_url: String,
    pub account: String,
    pub params: BTreeMap<String, ParamValue>,
    pub dry_run: bool,
}

impl ExecutionRequest {
    pub fn new(raw_url: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            raw_url: raw_url.into(),
            account: account.into(),
            params: BTreeMap::new(),
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, ParamValue>) -> Self {
        self.params.extend(params);
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Syntactic validation performed before any network call.
    pub fn validate(&self) -> Result<(), ActionError> {
        if !is_valid_address(&self.account) {
            return Err(ActionError::new(
                ErrorCode::BadArgs,
                "account is not a syntactically valid ledger address",
                false,
            )
            .with_detail("account", &self.account));
        }
        Ok(())
    }
}

/// Check whether a string is syntactically a valid ledger address
/// (base58 text of a 32-byte key: 32-44 characters, base58 alphabet).
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58_ALPHABET.contains(c))
}

/// Outcome of the execute operation.
///
/// Exactly one variant per call: dry runs simulate and never submit;
/// non-dry runs sign and submit and never simulate.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecuteOutcome {
    Simulated {
        simulation: SimulationOutcome,
        trust: TrustStatus,
    },
    Submitted {
        signature: String,
        trust: TrustStatus,
    },
}

impl ExecuteOutcome {
    #[must_use]
    pub fn trust(&self) -> TrustStatus {
        match self {
            ExecuteOutcome::Simulated { trust, .. } | ExecuteOutcome::Submitted { trust, .. } => {
                *trust
            }
        }
    }
}

/// Pipeline configuration as read from the boundary (all optional).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsConfig {
    /// User-Agent string for HTTP requests.
    pub user_agent: Option<String>,

    /// Bounded timeout applied to every network call, in seconds.
    /// Default: 10.
    pub timeout_seconds: Option<u32>,

    /// Authoritative trust registry document URL.
    pub registry_url: Option<String>,

    /// Trust snapshot lifetime in seconds. Default: 600.
    pub registry_ttl_seconds: Option<u32>,

    /// Whether an expired snapshot refreshes inline or in the background
    /// while stale data keeps serving. Default: blocking.
    pub registry_refresh: Option<RefreshMode>,
}

impl ActionsConfig {
    /// Default network timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECONDS: u32 = 10;

    /// Default trust snapshot TTL in seconds.
    pub const DEFAULT_REGISTRY_TTL_SECONDS: u32 = 600;

    /// Default authoritative registry document.
    pub const DEFAULT_REGISTRY_URL: &'static str = "https://actions-registry.dial.to/all";
}

/// Structured pipeline error.
///
/// Every error keeps its discriminant and context end to end; this crate
/// never downgrades an error to a default value. The only local recovery
/// anywhere in the pipeline is the trust registry's fallback-to-defaults
/// behavior, which lives in [`crate::registry`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ActionError {
    /// Stable error code.
    pub code: ErrorCode,

    /// Human-readable description.
    pub message: String,

    /// Whether retrying the whole operation may succeed.
    pub retryable: bool,

    /// Error-specific context (status code, body snippet, ...).
    pub details: ErrorDetails,
}

impl ActionError {
    pub fn new(code: ErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
            details: ErrorDetails::default(),
        }
    }

    /// Add a detail field.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.0.push((key.into(), value.into()));
        self
    }

    /// Look up a detail field by key.
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details
            .0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Numeric code for the structured command surface: the HTTP status
    /// when one was observed, otherwise a stable per-variant code.
    #[must_use]
    pub fn numeric_code(&self) -> u16 {
        if let Some(status) = self.detail("status").and_then(|s| s.parse::<u16>().ok()) {
            return status;
        }
        self.code.protocol_code()
    }

    /// Serialize to JSON for the command surface.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "error": true,
            "code": self.code,
            "numeric_code": self.numeric_code(),
            "message": self.message,
            "retryable": self.retryable,
        });

        if !self.details.0.is_empty() {
            let details: serde_json::Map<String, serde_json::Value> = self
                .details
                .0
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            obj["details"] = serde_json::Value::Object(details);
        }

        obj
    }
}

impl Serialize for ActionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/// Error details as ordered key-value pairs.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetails(pub Vec<(String, String)>);

/// Stable error codes surfaced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid request parameters.
    BadArgs,
    /// Unparseable or unsupported URL form.
    InvalidUrl,
    /// Host is on the malicious list; execution refused.
    UntrustedHostBlocked,
    /// Endpoint returned a non-2xx response.
    ActionFetch,
    /// A network call exceeded its bounded timeout.
    Timeout,
    /// Network/connection error.
    Network,
    /// Response body does not match the expected shape.
    Schema,
    /// POST succeeded but carried no usable transaction payload.
    MissingTransaction,
    /// Catalog template parameter absent.
    MissingTemplateParameter,
    /// Catalog has no such service.
    UnknownService,
    /// Ledger RPC failure.
    Rpc,
    /// Local signing failure.
    Signing,
    /// Unexpected internal error.
    Internal,
}

impl ErrorCode {
    /// Protocol-defined numeric code used when no HTTP status applies.
    #[must_use]
    pub fn protocol_code(self) -> u16 {
        match self {
            ErrorCode::BadArgs => 1001,
            ErrorCode::InvalidUrl => 1002,
            ErrorCode::UntrustedHostBlocked => 1003,
            ErrorCode::ActionFetch => 1004,
            ErrorCode::Timeout => 1005,
            ErrorCode::Network => 1006,
            ErrorCode::Schema => 1007,
            ErrorCode::MissingTransaction => 1008,
            ErrorCode::MissingTemplateParameter => 1009,
            ErrorCode::UnknownService => 1010,
            ErrorCode::Rpc => 1011,
            ErrorCode::Signing => 1012,
            ErrorCode::Internal => 1099,
        }
    }

    /// Whether this code is retryable by default.
    #[must_use]
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::Timeout | ErrorCode::Network | ErrorCode::Rpc | ErrorCode::Internal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_address_accepts_base58_of_plausible_length() {
        assert!(is_valid_address("Fh9yU7hDvjB7WsmCYEzmZGwitJjAXMjq1F2dwzYLaqAb"));
        assert!(is_valid_address("11111111111111111111111111111111"));
    }

    #[test]
    fn valid_address_rejects_bad_charset_and_length() {
        // '0', 'O', 'I', 'l' are not in the base58 alphabet
        assert!(!is_valid_address("0OIl1111111111111111111111111111"));
        assert!(!is_valid_address("tooshort"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn execution_request_validate_rejects_bad_account() {
        let request = ExecutionRequest::new("https://example.com", "not-an-address");
        let err = request.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::BadArgs);
    }

    #[test]
    fn numeric_code_prefers_http_status_detail() {
        let err = ActionError::new(ErrorCode::ActionFetch, "HTTP 404", false)
            .with_detail("status", "404");
        assert_eq!(err.numeric_code(), 404);

        let err = ActionError::new(ErrorCode::Timeout, "timed out", true);
        assert_eq!(err.numeric_code(), 1005);
    }

    #[test]
    fn error_to_json_includes_details() {
        let err = ActionError::new(ErrorCode::ActionFetch, "HTTP 500", true)
            .with_detail("status", "500")
            .with_detail("body", "oops");
        let json = err.to_json();
        assert_eq!(json["code"], "action_fetch");
        assert_eq!(json["numeric_code"], 500);
        assert_eq!(json["details"]["body"], "oops");
    }

    #[test]
    fn param_value_deserializes_untagged() {
        let n: ParamValue = serde_json::from_str("1.5").unwrap();
        assert!(matches!(n, ParamValue::Number(_)));
        let s: ParamValue = serde_json::from_str("\"1.5 SOL\"").unwrap();
        assert_eq!(s, ParamValue::Text("1.5 SOL".to_string()));
    }
}
