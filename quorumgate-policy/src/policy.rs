//! YAML-driven policy evaluation: ordered rules, first match wins.

use quorumgate_consensus::Intent;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub target_pattern: String,
    pub action: String,
    pub min_quorum: usize,
    #[serde(default)]
    pub escalate_to_human: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PolicyFile {
    policies: Vec<Policy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyDecision {
    pub policy_id: String,
    pub required_quorum: usize,
    pub escalate_to_human: bool,
    pub description: String,
}

pub struct PolicyEngine {
    path: PathBuf,
    policies: tokio::sync::RwLock<Vec<Policy>>,
}

impl PolicyEngine {
    /// Loads policies from `path`, creating a default single-rule file if
    /// none exists yet.
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let policies = match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let file: PolicyFile = serde_yaml::from_str(&text)?;
                file.policies
            }
            Err(_) => {
                info!(path = %path.display(), "no policy file found, writing default");
                let default = default_policy_file();
                let text = serde_yaml::to_string(&default)?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.ok();
                }
                tokio::fs::write(&path, text).await?;
                default.policies
            }
        };
        Ok(Self {
            path,
            policies: tokio::sync::RwLock::new(policies),
        })
    }

    pub async fn evaluate(&self, intent: &Intent, default_quorum: usize) -> PolicyDecision {
        let policies = self.policies.read().await;
        for policy in policies.iter() {
            if matches_target(&policy.target_pattern, &intent.target)
                && matches_action(&policy.action, &intent.action_type)
            {
                return PolicyDecision {
                    policy_id: policy.id.clone(),
                    required_quorum: policy.min_quorum,
                    escalate_to_human: policy.escalate_to_human,
                    description: policy.description.clone(),
                };
            }
        }
        PolicyDecision {
            policy_id: "default".to_string(),
            required_quorum: default_quorum,
            escalate_to_human: false,
            description: "no matching policy; falling back to default quorum".to_string(),
        }
    }

    /// Validates that `yaml_text` parses into a policy list, then persists
    /// atomically (write-temp, rename-over) so a reader never observes a
    /// half-written file.
    pub async fn update_policies(&self, yaml_text: &str) -> anyhow::Result<bool> {
        let parsed: PolicyFile = match serde_yaml::from_str(yaml_text) {
            Ok(p) => p,
            Err(e) => {
                warn!(%e, "rejected policy update: invalid yaml");
                return Ok(false);
            }
        };

        let tmp_path = self.path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp_path, yaml_text).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        *self.policies.write().await = parsed.policies;
        Ok(true)
    }

    pub async fn current_policies(&self) -> Vec<Policy> {
        self.policies.read().await.clone()
    }
}

fn matches_target(pattern: &str, target: &str) -> bool {
    if pattern.eq_ignore_ascii_case("ANY") {
        return true;
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(target))
        .unwrap_or(false)
}

fn matches_action(policy_action: &str, intent_action: &str) -> bool {
    policy_action.eq_ignore_ascii_case("ANY") || policy_action.eq_ignore_ascii_case(intent_action)
}

fn default_policy_file() -> PolicyFile {
    PolicyFile {
        policies: vec![Policy {
            id: "critical-production".to_string(),
            target_pattern: "(?i)production".to_string(),
            action: "ANY".to_string(),
            min_quorum: 5,
            escalate_to_human: true,
            description: "any action against a production target requires an elevated quorum and human escalation".to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumgate_consensus::RiskLevel;

    #[tokio::test]
    async fn default_file_is_created_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.yaml");
        let engine = PolicyEngine::load(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(engine.current_policies().await.len(), 1);
    }

    #[tokio::test]
    async fn first_match_wins_and_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.yaml");
        let yaml = r#"
policies:
  - id: prod-any
    target_pattern: "(?i)production"
    action: "ANY"
    min_quorum: 5
    escalate_to_human: true
    description: "prod lockdown"
  - id: catch-all
    target_pattern: "ANY"
    action: "ANY"
    min_quorum: 3
    escalate_to_human: false
    description: "default"
"#;
        tokio::fs::write(&path, yaml).await.unwrap();
        let engine = PolicyEngine::load(&path).await.unwrap();

        let prod_intent = Intent::new("DELETE", "production_db", "d", RiskLevel::Critical);
        let decision = engine.evaluate(&prod_intent, 3).await;
        assert_eq!(decision.policy_id, "prod-any");
        assert_eq!(decision.required_quorum, 5);

        let other_intent = Intent::new("PING", "staging", "d", RiskLevel::Low);
        let decision = engine.evaluate(&other_intent, 3).await;
        assert_eq!(decision.policy_id, "catch-all");
    }

    #[tokio::test]
    async fn invalid_yaml_update_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.yaml");
        let engine = PolicyEngine::load(&path).await.unwrap();
        let ok = engine.update_policies("not: [valid, policies").await.unwrap();
        assert!(!ok);
    }
}
