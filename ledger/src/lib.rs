//! Solana-backed implementations of the pipeline's collaborator ports.
//!
//! [`RpcLedger`] talks JSON-RPC 2.0 to a Solana node for simulation,
//! submission, and health checks. [`KeypairSigner`] loads a standard
//! 64-byte JSON keypair file and signs wire transactions locally; no
//! key material ever leaves the process.

mod rpc;
mod signer;

pub use rpc::RpcLedger;
pub use signer::KeypairSigner;
