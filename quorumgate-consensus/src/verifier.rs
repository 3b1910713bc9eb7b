//! Independent certificate verification.
//!
//! Deliberately decoupled from the engine: a verifier only needs the
//! certificate, the quorum size, and a map of worker verify-keys. It never
//! touches PBFT message logs, so a certificate can be checked by any party
//! holding the public key directory, long after the round that produced it.

use crate::types::Certificate;
use quorumgate_security::verifying_key_from_hex;
use std::collections::HashMap;

#[derive(Debug, Clone, serde::Serialize)]
pub struct VerificationReport {
    pub valid: bool,
    pub valid_prepares: usize,
    pub valid_commits: usize,
    pub errors: Vec<String>,
}

pub fn verify_certificate(
    certificate: &Certificate,
    verify_keys: &HashMap<String, String>,
    quorum_size: usize,
) -> VerificationReport {
    let mut errors = Vec::new();
    let mut valid_prepares = 0usize;
    let mut valid_commits = 0usize;

    for entry in &certificate.prepare_quorum {
        match check_entry(entry, &certificate.request_hash, verify_keys) {
            Ok(()) => valid_prepares += 1,
            Err(e) => errors.push(format!("prepare[{}]: {e}", entry.worker_id)),
        }
    }
    for entry in &certificate.commit_quorum {
        match check_entry(entry, &certificate.result_hash, verify_keys) {
            Ok(()) => valid_commits += 1,
            Err(e) => errors.push(format!("commit[{}]: {e}", entry.worker_id)),
        }
    }

    if valid_prepares < quorum_size {
        errors.push(format!(
            "prepare quorum too small: {valid_prepares} valid of {quorum_size} required"
        ));
    }
    if valid_commits < quorum_size {
        errors.push(format!(
            "commit quorum too small: {valid_commits} valid of {quorum_size} required"
        ));
    }

    VerificationReport {
        valid: errors.is_empty(),
        valid_prepares,
        valid_commits,
        errors,
    }
}

fn check_entry(
    entry: &crate::types::SignedEntry,
    hash: &str,
    verify_keys: &HashMap<String, String>,
) -> Result<(), String> {
    let key_hex = verify_keys
        .get(&entry.worker_id)
        .ok_or_else(|| "unknown worker".to_string())?;
    let verify_key = verifying_key_from_hex(key_hex).map_err(|e| e.to_string())?;
    quorumgate_security::verify_hex(&verify_key, hash.as_bytes(), &entry.signature)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignedEntry;
    use quorumgate_security::KeyPair;

    #[test]
    fn valid_certificate_verifies() {
        let k1 = KeyPair::generate();
        let k2 = KeyPair::generate();
        let k3 = KeyPair::generate();
        let request_hash = "abc123";
        let result_hash = "def456";
        let cert = Certificate {
            view: 0,
            seq: 1,
            request_hash: request_hash.to_string(),
            pre_prepare_signature: "x".into(),
            prepare_quorum: vec![
                SignedEntry { worker_id: "w1".into(), signature: k1.sign_hex(request_hash.as_bytes()) },
                SignedEntry { worker_id: "w2".into(), signature: k2.sign_hex(request_hash.as_bytes()) },
                SignedEntry { worker_id: "w3".into(), signature: k3.sign_hex(request_hash.as_bytes()) },
            ],
            commit_quorum: vec![
                SignedEntry { worker_id: "w1".into(), signature: k1.sign_hex(result_hash.as_bytes()) },
                SignedEntry { worker_id: "w2".into(), signature: k2.sign_hex(result_hash.as_bytes()) },
                SignedEntry { worker_id: "w3".into(), signature: k3.sign_hex(result_hash.as_bytes()) },
            ],
            result_hash: result_hash.to_string(),
            decision: quorumgate_security::Decision::Approve,
            timestamp: chrono::Utc::now(),
        };
        let mut keys = HashMap::new();
        keys.insert("w1".to_string(), quorumgate_security::verifying_key_to_hex(&k1.verifying_key()));
        keys.insert("w2".to_string(), quorumgate_security::verifying_key_to_hex(&k2.verifying_key()));
        keys.insert("w3".to_string(), quorumgate_security::verifying_key_to_hex(&k3.verifying_key()));

        let report = verify_certificate(&cert, &keys, 3);
        assert!(report.valid);
        assert_eq!(report.valid_prepares, 3);
        assert_eq!(report.valid_commits, 3);
    }

    #[test]
    fn flipped_signature_byte_invalidates() {
        let k1 = KeyPair::generate();
        let request_hash = "abc123";
        let mut sig = k1.sign_hex(request_hash.as_bytes());
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });

        let cert = Certificate {
            view: 0,
            seq: 1,
            request_hash: request_hash.to_string(),
            pre_prepare_signature: "x".into(),
            prepare_quorum: vec![SignedEntry { worker_id: "w1".into(), signature: sig }],
            commit_quorum: vec![],
            result_hash: "def456".into(),
            decision: quorumgate_security::Decision::Approve,
            timestamp: chrono::Utc::now(),
        };
        let mut keys = HashMap::new();
        keys.insert("w1".to_string(), quorumgate_security::verifying_key_to_hex(&k1.verifying_key()));

        let report = verify_certificate(&cert, &keys, 1);
        assert!(!report.valid);
        assert!(!report.errors.is_empty());
    }
}
