//! Ed25519 key generation, signing, and verification.
//!
//! Two byte domains are used throughout the gateway and must never be
//! confused: this module signs and verifies whatever bytes it is given. The
//! convention of signing the UTF-8 bytes of a *hex-encoded* hash string
//! (rather than the raw digest) lives at the call sites, not here — see
//! `quorumgate-consensus` for where that choice is made.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid signature encoding: {0}")]
    InvalidEncoding(String),
    #[error("signature verification failed")]
    VerificationFailed,
}

/// A process-local Ed25519 keypair. Private keys are never persisted.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a fresh keypair from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Signs `message` and returns the lowercase hex-encoded signature.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        let sig: Signature = self.signing_key.sign(message);
        hex_encode(&sig.to_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("verifying_key", &hex_encode(self.verifying_key().as_bytes()))
            .finish()
    }
}

/// Verifies a hex-encoded Ed25519 signature over `message` under `verify_key`.
pub fn verify_hex(
    verify_key: &VerifyingKey,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), SignerError> {
    let sig_bytes = hex_decode(signature_hex)
        .map_err(|e| SignerError::InvalidEncoding(e))?;
    let sig = Signature::from_slice(&sig_bytes)
        .map_err(|e| SignerError::InvalidEncoding(e.to_string()))?;
    verify_key
        .verify(message, &sig)
        .map_err(|_| SignerError::VerificationFailed)
}

pub fn verifying_key_from_hex(s: &str) -> Result<VerifyingKey, SignerError> {
    let bytes = hex_decode(s).map_err(SignerError::InvalidEncoding)?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| SignerError::InvalidEncoding("verify key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| SignerError::InvalidEncoding(e.to_string()))
}

pub fn verifying_key_to_hex(key: &VerifyingKey) -> String {
    hex_encode(key.as_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd-length hex string".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let kp = KeyPair::generate();
        let msg = b"request_hash_abc123";
        let sig = kp.sign_hex(msg);
        assert!(verify_hex(&kp.verifying_key(), msg, &sig).is_ok());
    }

    #[test]
    fn corrupted_message_fails_verification() {
        let kp = KeyPair::generate();
        let sig = kp.sign_hex(b"original");
        assert!(verify_hex(&kp.verifying_key(), b"tampered", &sig).is_err());
    }

    #[test]
    fn corrupted_signature_fails_verification() {
        let kp = KeyPair::generate();
        let msg = b"request_hash_abc123";
        let mut sig = kp.sign_hex(msg);
        let last = sig.pop().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        sig.push(flipped);
        assert!(verify_hex(&kp.verifying_key(), msg, &sig).is_err());
    }

    #[test]
    fn verifying_key_hex_round_trips() {
        let kp = KeyPair::generate();
        let hex = verifying_key_to_hex(&kp.verifying_key());
        let parsed = verifying_key_from_hex(&hex).unwrap();
        assert_eq!(parsed, kp.verifying_key());
    }
}
