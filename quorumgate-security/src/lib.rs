//! Cryptographic and schema foundations for the decision gateway.
//!
//! This crate carries no knowledge of PBFT rounds, workers, or policy — it
//! is the leaf layer every other gateway crate builds on: Ed25519 key
//! management, canonical JSON + SHA-256 hashing, and the fail-closed verdict
//! schema. Keeping it dependency-free (beyond crypto and serde) means it can
//! be unit-tested in isolation and audited as a single small surface.

pub mod canonical;
pub mod signer;
pub mod verdict;

pub use canonical::{canonical_json, hash_value, sha256_hex};
pub use signer::{verify_hex, verifying_key_from_hex, verifying_key_to_hex, KeyPair, SignerError};
pub use verdict::{Decision, ReasonCode, Verdict};
