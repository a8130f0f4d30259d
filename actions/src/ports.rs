//! Collaborator contracts consumed by the execution pipeline.
//!
//! The pipeline orchestrates these but does not implement them: the
//! ledger is a remote, potentially-failing service under the same
//! timeout discipline as the protocol client; the signer is local and
//! offline. Concrete implementations live in the `blink-ledger` crate;
//! tests substitute counting mocks.

use async_trait::async_trait;

use crate::types::{ActionError, SimulationOutcome};

/// Remote ledger operations.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Pre-flight a transaction without submitting it.
    async fn simulate(&self, transaction: &str) -> Result<SimulationOutcome, ActionError>;

    /// Submit a signed transaction; returns its signature.
    async fn submit(&self, signed_transaction: &str) -> Result<String, ActionError>;

    /// Liveness query against the ledger node.
    async fn health(&self) -> Result<(), ActionError>;
}

/// Local, offline transaction signing.
pub trait Signer: Send + Sync {
    /// Sign an encoded transaction, returning the signed encoding.
    fn sign(&self, transaction: &str) -> Result<String, ActionError>;

    /// Address of the signing key, in ledger text form.
    fn address(&self) -> String;
}
