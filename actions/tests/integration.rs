//! Integration tests for the action pipeline: resolve → trust →
//! protocol exchange → simulate-or-submit, against mock endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use blink_actions::ports::{Ledger, Signer};
use blink_actions::registry::HostList;
use blink_actions::{
    ActionError, ActionsConfig, ErrorCode, ExecuteOutcome, ExecutionRequest, ParamValue, Pipeline,
    RegistrySource, SimulationOutcome, TrustStatus,
};

const ACCOUNT: &str = "Fh9yU7hDvjB7WsmCYEzmZGwitJjAXMjq1F2dwzYLaqAb";

struct StaticSource {
    list: HostList,
}

#[async_trait]
impl RegistrySource for StaticSource {
    async fn fetch_host_list(&self) -> Result<HostList, ActionError> {
        Ok(self.list.clone())
    }
}

fn test_config() -> ActionsConfig {
    ActionsConfig {
        user_agent: Some("blink-test/1.0".to_string()),
        timeout_seconds: Some(5),
        ..Default::default()
    }
}

/// Pipeline whose trust source marks the mock server's host trusted.
fn pipeline_trusting(host: &str) -> Pipeline {
    pipeline_trusting_with(host, &test_config())
}

fn pipeline_trusting_with(host: &str, config: &ActionsConfig) -> Pipeline {
    let source = StaticSource {
        list: HostList {
            trusted: vec![host.to_string()],
            malicious: vec![],
        },
    };
    Pipeline::with_registry_source(config, Arc::new(source)).expect("pipeline")
}

/// Pipeline whose trust source marks the mock server's host malicious.
fn pipeline_denying(host: &str) -> Pipeline {
    let source = StaticSource {
        list: HostList {
            trusted: vec![],
            malicious: vec![host.to_string()],
        },
    };
    Pipeline::with_registry_source(&test_config(), Arc::new(source)).expect("pipeline")
}

fn server_host(server: &MockServer) -> String {
    url::Url::parse(&server.uri())
        .expect("mock server URI")
        .host_str()
        .expect("mock server host")
        .to_string()
}

#[derive(Default)]
struct MockLedger {
    simulate_calls: AtomicUsize,
    submit_calls: AtomicUsize,
}

#[async_trait]
impl Ledger for MockLedger {
    async fn simulate(&self, _transaction: &str) -> Result<SimulationOutcome, ActionError> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SimulationOutcome {
            success: true,
            units_consumed: Some(5000),
            error: None,
        })
    }

    async fn submit(&self, _signed_transaction: &str) -> Result<String, ActionError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        Ok("5VERYrealSIGNATUREvalue111111111111111111111".to_string())
    }

    async fn health(&self) -> Result<(), ActionError> {
        Ok(())
    }
}

struct MockSigner;

impl Signer for MockSigner {
    fn sign(&self, transaction: &str) -> Result<String, ActionError> {
        Ok(format!("signed:{transaction}"))
    }

    fn address(&self) -> String {
        ACCOUNT.to_string()
    }
}

async fn mount_metadata(server: &MockServer, endpoint_path: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(endpoint_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_transaction(server: &MockServer, endpoint_path: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn inspect_returns_metadata_and_absolute_actions() {
    let server = MockServer::start().await;
    mount_metadata(
        &server,
        "/stake",
        serde_json::json!({
            "title": "Stake SOL",
            "description": "Stake with a validator",
            "icon": "https://example.com/icon.png",
            "label": "Stake",
            "links": {
                "actions": [
                    { "label": "Stake 1 SOL", "href": "/stake?amount=1" },
                    { "label": "Custom", "href": "/stake?amount={amount}",
                      "parameters": [{ "name": "amount", "required": true }] }
                ]
            }
        }),
    )
    .await;

    let pipeline = pipeline_trusting(&server_host(&server));
    let result = pipeline
        .inspect(&format!("{}/stake", server.uri()))
        .await
        .expect("inspect should succeed");

    assert_eq!(result.trust, TrustStatus::Trusted);
    assert_eq!(result.metadata.title, "Stake SOL");
    assert_eq!(result.actions.len(), 2);
    assert_eq!(
        result.actions[0].href,
        format!("{}/stake?amount=1", server.uri())
    );
    assert_eq!(result.actions[1].parameters[0].name, "amount");
}

#[tokio::test]
async fn inspect_reports_unknown_host_without_blocking() {
    let server = MockServer::start().await;
    mount_metadata(&server, "/a", serde_json::json!({ "title": "Action" })).await;

    // Source knows nothing about this host.
    let pipeline = pipeline_trusting("someone-else.example");
    let result = pipeline
        .inspect(&format!("{}/a", server.uri()))
        .await
        .expect("inspect should succeed");
    assert_eq!(result.trust, TrustStatus::Unknown);
}

#[tokio::test]
async fn inspect_is_allowed_for_malicious_hosts() {
    let server = MockServer::start().await;
    mount_metadata(&server, "/a", serde_json::json!({ "title": "Bait" })).await;

    let pipeline = pipeline_denying(&server_host(&server));
    let result = pipeline
        .inspect(&format!("{}/a", server.uri()))
        .await
        .expect("inspection is read-only and always allowed");
    assert_eq!(result.trust, TrustStatus::Malicious);
}

#[tokio::test]
async fn inspect_surfaces_http_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let pipeline = pipeline_trusting(&server_host(&server));
    let err = pipeline
        .inspect(&format!("{}/missing", server.uri()))
        .await
        .expect_err("404 must surface");

    assert_eq!(err.code, ErrorCode::ActionFetch);
    assert_eq!(err.detail("status"), Some("404"));
    assert_eq!(err.numeric_code(), 404);
}

#[tokio::test]
async fn inspect_rejects_metadata_without_title() {
    let server = MockServer::start().await;
    mount_metadata(&server, "/a", serde_json::json!({ "label": "No title" })).await;

    let pipeline = pipeline_trusting(&server_host(&server));
    let err = pipeline
        .inspect(&format!("{}/a", server.uri()))
        .await
        .expect_err("schema violation must surface");
    assert_eq!(err.code, ErrorCode::Schema);
}

#[tokio::test]
async fn execute_dry_run_simulates_and_never_submits() {
    let server = MockServer::start().await;
    mount_transaction(
        &server,
        "/stake",
        serde_json::json!({ "transaction": "AQIDBA==", "message": "Stake 1 SOL" }),
    )
    .await;

    let pipeline = pipeline_trusting(&server_host(&server));
    let ledger = MockLedger::default();
    let request = ExecutionRequest::new(format!("{}/stake", server.uri()), ACCOUNT)
        .with_param("amount", ParamValue::from(1u64))
        .with_dry_run(true);

    let outcome = pipeline
        .execute(&request, &ledger, &MockSigner)
        .await
        .expect("dry run should succeed");

    match outcome {
        ExecuteOutcome::Simulated { simulation, trust } => {
            assert!(simulation.success);
            assert_eq!(simulation.units_consumed, Some(5000));
            assert_eq!(trust, TrustStatus::Trusted);
        }
        ExecuteOutcome::Submitted { .. } => panic!("dry run must not submit"),
    }
    assert_eq!(ledger.simulate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn execute_signs_and_submits_when_not_dry_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stake"))
        .and(body_partial_json(
            serde_json::json!({ "account": ACCOUNT, "amount": 2 }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "transaction": "AQIDBA==" })),
        )
        .mount(&server)
        .await;

    let pipeline = pipeline_trusting(&server_host(&server));
    let ledger = MockLedger::default();
    let request = ExecutionRequest::new(format!("{}/stake", server.uri()), ACCOUNT)
        .with_param("amount", ParamValue::from(2u64));

    let outcome = pipeline
        .execute(&request, &ledger, &MockSigner)
        .await
        .expect("execute should succeed");

    match outcome {
        ExecuteOutcome::Submitted { signature, trust } => {
            assert!(!signature.is_empty());
            assert_eq!(trust, TrustStatus::Trusted);
        }
        ExecuteOutcome::Simulated { .. } => panic!("non-dry-run must submit"),
    }
    assert_eq!(ledger.simulate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn execute_blocks_malicious_host_before_any_protocol_call() {
    let server = MockServer::start().await;
    // Deliberately no mocks mounted: any request would 404 loudly, and
    // the received-request log must stay empty.

    let pipeline = pipeline_denying(&server_host(&server));
    let ledger = MockLedger::default();
    let request = ExecutionRequest::new(format!("{}/stake", server.uri()), ACCOUNT);

    let err = pipeline
        .execute(&request, &ledger, &MockSigner)
        .await
        .expect_err("malicious host must be blocked");

    assert_eq!(err.code, ErrorCode::UntrustedHostBlocked);
    assert_eq!(ledger.simulate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 0);

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty(), "no protocol call may be made");
}

#[tokio::test]
async fn execute_proceeds_on_unknown_host_marked_untrusted() {
    let server = MockServer::start().await;
    mount_transaction(&server, "/x", serde_json::json!({ "transaction": "AQ==" })).await;

    let pipeline = pipeline_trusting("someone-else.example");
    let ledger = MockLedger::default();
    let request =
        ExecutionRequest::new(format!("{}/x", server.uri()), ACCOUNT).with_dry_run(true);

    let outcome = pipeline
        .execute(&request, &ledger, &MockSigner)
        .await
        .expect("unknown trust is advisory");
    assert_eq!(outcome.trust(), TrustStatus::Unknown);
}

#[tokio::test]
async fn execute_rejects_invalid_account_before_any_network_call() {
    let server = MockServer::start().await;

    let pipeline = pipeline_trusting(&server_host(&server));
    let ledger = MockLedger::default();
    let request = ExecutionRequest::new(format!("{}/stake", server.uri()), "bogus!");

    let err = pipeline
        .execute(&request, &ledger, &MockSigner)
        .await
        .expect_err("invalid account must fail validation");
    assert_eq!(err.code, ErrorCode::BadArgs);

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn execute_surfaces_missing_transaction_payload() {
    let server = MockServer::start().await;
    mount_transaction(&server, "/x", serde_json::json!({ "message": "no tx here" })).await;

    let pipeline = pipeline_trusting(&server_host(&server));
    let ledger = MockLedger::default();
    let request =
        ExecutionRequest::new(format!("{}/x", server.uri()), ACCOUNT).with_dry_run(true);

    let err = pipeline
        .execute(&request, &ledger, &MockSigner)
        .await
        .expect_err("payload-less response must fail");
    assert_eq!(err.code, ErrorCode::MissingTransaction);
    assert_eq!(ledger.simulate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn inspect_times_out_as_retryable_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "title": "Slow" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = ActionsConfig {
        timeout_seconds: Some(1),
        ..test_config()
    };
    let pipeline = pipeline_trusting_with(&server_host(&server), &config);
    let err = pipeline
        .inspect(&format!("{}/slow", server.uri()))
        .await
        .expect_err("the bounded timeout must abort the fetch");

    assert_eq!(err.code, ErrorCode::Timeout);
    assert!(err.retryable, "a timeout is worth retrying");
}

#[tokio::test]
async fn execute_times_out_without_touching_the_ledger() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "transaction": "AQ==" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = ActionsConfig {
        timeout_seconds: Some(1),
        ..test_config()
    };
    let pipeline = pipeline_trusting_with(&server_host(&server), &config);
    let ledger = MockLedger::default();
    let request =
        ExecutionRequest::new(format!("{}/slow", server.uri()), ACCOUNT).with_dry_run(true);

    let err = pipeline
        .execute(&request, &ledger, &MockSigner)
        .await
        .expect_err("the bounded timeout must abort the exchange");

    assert_eq!(err.code, ErrorCode::Timeout);
    assert!(err.retryable);
    assert_eq!(ledger.simulate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn marker_encodings_reach_the_same_endpoint() {
    let server = MockServer::start().await;
    mount_metadata(&server, "/stake", serde_json::json!({ "title": "Stake" })).await;

    let pipeline = pipeline_trusting(&server_host(&server));
    let plain = format!("{}/stake", server.uri());
    let marked = format!("solana-action:{plain}");

    let a = pipeline.inspect(&plain).await.expect("plain form");
    let b = pipeline.inspect(&marked).await.expect("marker form");
    assert_eq!(a.canonical_url, b.canonical_url);
}
