//! The verdict schema and its fail-closed validator.
//!
//! A verdict is the one structured artifact a worker is allowed to produce.
//! Anything that does not conform — wrong types, out-of-range confidence,
//! an unrecognized tag — is coerced to the safe default rather than
//! propagated, so a misbehaving or compromised worker can never smuggle an
//! ill-formed value into the quorum tally.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Safe,
    InvalidRequest,
    UnsafeOrUnknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub action_id: String,
    pub decision: Decision,
    pub reason_code: ReasonCode,
    pub confidence: f64,
}

impl Verdict {
    /// The fail-closed default: reject, unsafe-or-unknown, zero confidence.
    pub fn fail_closed(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            decision: Decision::Reject,
            reason_code: ReasonCode::UnsafeOrUnknown,
            confidence: 0.0,
        }
    }

    /// Validates shape and range; returns the fail-closed default verdict on
    /// any deviation rather than an error, per the gateway's fail-closed
    /// contract (a malformed verdict must never be silently dropped from the
    /// tally — it must count as a REJECT).
    pub fn validate_or_coerce(action_id: &str, candidate: Option<Verdict>) -> Verdict {
        match candidate {
            Some(v) if v.action_id == action_id && (0.0..=1.0).contains(&v.confidence) => v,
            _ => Verdict::fail_closed(action_id),
        }
    }

    /// Attempts to parse an untrusted JSON value into a verdict, coercing to
    /// the fail-closed default on any schema violation.
    pub fn from_json_or_coerce(action_id: &str, raw: &serde_json::Value) -> Verdict {
        let parsed: Option<Verdict> = serde_json::from_value(raw.clone()).ok();
        Self::validate_or_coerce(action_id, parsed)
    }
}
