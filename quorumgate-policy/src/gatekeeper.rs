//! The authorization filter between registry lookup and policy evaluation.
//!
//! A pure function over whatever the caller currently considers "active" —
//! it holds no state of its own, so the registry (owned by the audit crate)
//! stays the single source of truth for worker status.

use quorumgate_consensus::{GatewayError, WorkerId};

pub fn authorize_agents(
    active_workers: &[WorkerId],
    required_quorum: usize,
) -> Result<Vec<WorkerId>, GatewayError> {
    if active_workers.len() < required_quorum {
        return Err(GatewayError::PolicyInsufficientAgents {
            required: required_quorum,
            available: active_workers.len(),
        });
    }
    Ok(active_workers.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enough_active_workers_authorizes_all() {
        let active = vec!["w1".to_string(), "w2".to_string(), "w3".to_string()];
        let result = authorize_agents(&active, 3).unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn too_few_active_workers_fails() {
        let active = vec!["w1".to_string()];
        let err = authorize_agents(&active, 3).unwrap_err();
        assert!(matches!(err, GatewayError::PolicyInsufficientAgents { .. }));
    }
}
