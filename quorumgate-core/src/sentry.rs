//! Post-consensus drift check.
//!
//! A REJECT outcome is always aligned — there is nothing to drift into. An
//! APPROVE is only aligned if the approved result still targets what the
//! original intent targeted; a mismatch here would mean some stage between
//! intent construction and the committed verdict silently retargeted the
//! action, which must never be allowed through.

use quorumgate_consensus::Intent;
use quorumgate_security::{Decision, Verdict};

pub fn validate_consensus_alignment(intent: &Intent, result: &Verdict, result_target: Option<&str>) -> bool {
    if result.decision != Decision::Approve {
        return true;
    }
    match result_target {
        Some(target) => target == intent.target,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumgate_consensus::RiskLevel;
    use quorumgate_security::ReasonCode;

    fn verdict(decision: Decision) -> Verdict {
        Verdict {
            action_id: "a1".into(),
            decision,
            reason_code: ReasonCode::Safe,
            confidence: 0.9,
        }
    }

    #[test]
    fn reject_is_always_aligned() {
        let intent = Intent::new("DELETE", "db_a", "d", RiskLevel::Critical);
        assert!(validate_consensus_alignment(&intent, &verdict(Decision::Reject), Some("db_b")));
    }

    #[test]
    fn approve_with_matching_target_is_aligned() {
        let intent = Intent::new("PING", "svc", "d", RiskLevel::Low);
        assert!(validate_consensus_alignment(&intent, &verdict(Decision::Approve), Some("svc")));
    }

    #[test]
    fn approve_with_drifted_target_is_not_aligned() {
        let intent = Intent::new("PING", "svc_a", "d", RiskLevel::Low);
        assert!(!validate_consensus_alignment(&intent, &verdict(Decision::Approve), Some("svc_b")));
    }
}
