//! Action URL resolution, trust, and execution.
//!
//! This crate turns an arbitrary, possibly-obfuscated Action URL into a
//! trust decision, a fetched action description, a signable transaction,
//! an optional pre-flight simulation, and a submitted result, while
//! guarding against malicious or malformed endpoints.
//!
//! # Pipeline
//!
//! Each operation runs a short, strictly-ordered chain:
//!
//! 1. **Resolve** - normalize any accepted URL encoding into one
//!    canonical HTTPS endpoint
//! 2. **Trust** - classify the endpoint host against a cached registry
//!    snapshot (advisory, except the execute-time deny-list gate)
//! 3. **Protocol exchange** - GET metadata / POST for an unsigned
//!    transaction
//! 4. **Simulate or sign-and-submit** - delegated to the external
//!    ledger/signer collaborators; exactly one of the two per call
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Data model, configuration, structured errors |
//! | [`resolver`] | Canonicalization of the accepted URL encodings |
//! | [`registry`] | TTL'd trust snapshot with single-flight refresh |
//! | [`pipeline`] | Inspect/execute orchestration |
//! | [`catalog`] | Service id → endpoint template table |
//! | [`ports`] | Ledger and signer collaborator contracts |
//!
//! # Errors
//!
//! Everything fails with [`ActionError`]: a stable [`ErrorCode`], a
//! human-readable message, a retryability hint, and key-value details
//! (HTTP status, body snippet). Errors surface to callers unmodified;
//! the registry's fallback-to-defaults behavior is the only local
//! recovery anywhere in the crate.

pub mod catalog;
mod client;
pub mod pipeline;
pub mod ports;
pub mod registry;
pub mod resolver;
mod resolved;
pub mod types;

pub use pipeline::Pipeline;
pub use registry::{HostList, RefreshMode, RegistrySource, TrustRegistry, TrustStatus};
pub use resolver::{CanonicalUrl, resolve};
pub use types::{
    ActionError, ActionMetadata, ActionTransaction, ActionsConfig, ErrorCode, ExecuteOutcome,
    ExecutionRequest, InspectResult, LinkedAction, ParamValue, SimulationOutcome,
};
