//! Intent classification and pre-execution guardrails.
//!
//! Risk classification is a deterministic table lookup, not a model call —
//! it exists to give the policy engine and the guardrail a stable signal
//! before any worker is invoked.

use quorumgate_consensus::RiskLevel;

pub fn classify_risk(action_type: &str, _target: &str) -> RiskLevel {
    match action_type.to_uppercase().as_str() {
        "DELETE" | "DROP" | "WIPE" | "TRANSFER_FUNDS" => RiskLevel::Critical,
        "UPDATE" | "MODIFY" | "GRANT_ACCESS" | "REBOOT" => RiskLevel::High,
        "CREATE" | "INSERT" | "UPLOAD" => RiskLevel::Medium,
        "READ" | "GET" | "PING" | "HEALTHCHECK" | "LIST" => RiskLevel::Low,
        _ => RiskLevel::Unknown,
    }
}

/// `(allowed, bypassed)`. A hard block (`allowed = false`) only ever occurs
/// for CRITICAL risk against a production target in strict mode — every
/// other combination defers the decision to consensus.
pub fn apply_pre_execution_guardrails(risk: RiskLevel, target: &str, strict: bool) -> (bool, bool) {
    let targets_production = target.to_uppercase().contains("PRODUCTION");
    if risk == RiskLevel::Critical && targets_production {
        if strict {
            (false, false)
        } else {
            (true, true)
        }
    } else {
        (true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_actions_case_insensitively() {
        assert_eq!(classify_risk("delete", "x"), RiskLevel::Critical);
        assert_eq!(classify_risk("REBOOT", "x"), RiskLevel::High);
        assert_eq!(classify_risk("Upload", "x"), RiskLevel::Medium);
        assert_eq!(classify_risk("ping", "x"), RiskLevel::Low);
        assert_eq!(classify_risk("frobnicate", "x"), RiskLevel::Unknown);
    }

    #[test]
    fn strict_mode_hard_blocks_critical_production() {
        let (allowed, bypassed) =
            apply_pre_execution_guardrails(RiskLevel::Critical, "production_db", true);
        assert!(!allowed);
        assert!(!bypassed);
    }

    #[test]
    fn non_strict_mode_bypasses_to_consensus() {
        let (allowed, bypassed) =
            apply_pre_execution_guardrails(RiskLevel::Critical, "production_db", false);
        assert!(allowed);
        assert!(bypassed);
    }

    #[test]
    fn non_critical_or_non_production_is_never_blocked() {
        let (allowed, bypassed) =
            apply_pre_execution_guardrails(RiskLevel::High, "production_db", true);
        assert!(allowed);
        assert!(!bypassed);
        let (allowed, bypassed) =
            apply_pre_execution_guardrails(RiskLevel::Critical, "staging_db", true);
        assert!(allowed);
        assert!(!bypassed);
    }
}
