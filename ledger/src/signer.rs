//! Local keypair signing of wire transactions.
//!
//! Loads the standard CLI keypair format: a JSON array of 64 bytes, the
//! 32-byte secret seed followed by the 32-byte public key. Signing
//! operates directly on the wire encoding: the signature table is a
//! compact-u16 count followed by 64-byte slots, and the message bytes
//! that follow are what gets signed. The fee payer's signature is the
//! first slot.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{Signer as _, SigningKey};

use blink_actions::ports::Signer;
use blink_actions::types::{ActionError, ErrorCode};

const SIGNATURE_LEN: usize = 64;
const SEED_LEN: usize = 32;
const KEYPAIR_LEN: usize = 64;

#[derive(Debug)]
pub struct KeypairSigner {
    key: SigningKey,
    address: String,
}

impl KeypairSigner {
    /// Load a keypair from a 64-byte JSON array file.
    pub fn from_file(path: &Path) -> Result<Self, ActionError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ActionError::new(
                ErrorCode::Signing,
                format!("failed to read keypair file {}: {e}", path.display()),
                false,
            )
        })?;
        let bytes: Vec<u8> = serde_json::from_str(&raw).map_err(|e| {
            ActionError::new(
                ErrorCode::Signing,
                format!("keypair file {} is not a JSON byte array: {e}", path.display()),
                false,
            )
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ActionError> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(ActionError::new(
                ErrorCode::Signing,
                format!("keypair must be {KEYPAIR_LEN} bytes, got {}", bytes.len()),
                false,
            ));
        }

        let mut seed = [0u8; SEED_LEN];
        seed.copy_from_slice(&bytes[..SEED_LEN]);
        let key = SigningKey::from_bytes(&seed);

        // The stored public half must match the derived one, or the file
        // is corrupt and signatures would never verify.
        if key.verifying_key().as_bytes() != &bytes[SEED_LEN..] {
            return Err(ActionError::new(
                ErrorCode::Signing,
                "keypair public key does not match its secret seed",
                false,
            ));
        }

        let address = bs58::encode(key.verifying_key().as_bytes()).into_string();
        Ok(Self { key, address })
    }
}

impl Signer for KeypairSigner {
    fn sign(&self, transaction: &str) -> Result<String, ActionError> {
        let mut wire = BASE64.decode(transaction).map_err(|e| {
            ActionError::new(
                ErrorCode::Signing,
                format!("transaction is not valid base64: {e}"),
                false,
            )
        })?;

        let (count, prefix_len) = decode_shortvec(&wire).ok_or_else(|| {
            ActionError::new(
                ErrorCode::Signing,
                "transaction is too short to carry a signature table",
                false,
            )
        })?;
        if count == 0 {
            return Err(ActionError::new(
                ErrorCode::Signing,
                "transaction declares zero signature slots",
                false,
            ));
        }

        let message_start = prefix_len + count * SIGNATURE_LEN;
        if wire.len() <= message_start {
            return Err(ActionError::new(
                ErrorCode::Signing,
                "transaction signature table overruns the wire bytes",
                false,
            ));
        }

        let signature = self.key.sign(&wire[message_start..]);
        wire[prefix_len..prefix_len + SIGNATURE_LEN].copy_from_slice(&signature.to_bytes());
        Ok(BASE64.encode(wire))
    }

    fn address(&self) -> String {
        self.address.clone()
    }
}

/// Decode a compact-u16 length prefix. Returns the value and the number
/// of prefix bytes consumed, or `None` if the input ends mid-prefix.
fn decode_shortvec(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut value: usize = 0;
    for (index, &byte) in bytes.iter().take(3).enumerate() {
        value |= usize::from(byte & 0x7f) << (index * 7);
        if byte & 0x80 == 0 {
            return Some((value, index + 1));
        }
    }
    None
}
