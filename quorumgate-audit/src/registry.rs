//! In-memory worker catalog, updated on round completion.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quorumgate_consensus::WorkerId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Active,
    Quarantined,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub worker_id: WorkerId,
    pub model_label: String,
    pub status: WorkerStatus,
    pub last_active: Option<DateTime<Utc>>,
    pub successful_participations: u64,
    pub failed_participations: u64,
}

impl RegistryEntry {
    fn new(worker_id: WorkerId, model_label: String) -> Self {
        Self {
            worker_id,
            model_label,
            status: WorkerStatus::Active,
            last_active: None,
            successful_participations: 0,
            failed_participations: 0,
        }
    }
}

#[derive(Default)]
pub struct Registry {
    entries: DashMap<WorkerId, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, worker_id: WorkerId, model_label: impl Into<String>) {
        self.entries
            .entry(worker_id.clone())
            .or_insert_with(|| RegistryEntry::new(worker_id, model_label.into()));
    }

    pub fn record_success(&self, worker_id: &WorkerId) {
        if let Some(mut entry) = self.entries.get_mut(worker_id) {
            entry.successful_participations += 1;
            entry.last_active = Some(Utc::now());
            entry.status = WorkerStatus::Active;
        }
    }

    pub fn record_failure(&self, worker_id: &WorkerId) {
        if let Some(mut entry) = self.entries.get_mut(worker_id) {
            entry.failed_participations += 1;
        }
    }

    pub fn quarantine(&self, worker_id: &WorkerId) {
        if let Some(mut entry) = self.entries.get_mut(worker_id) {
            entry.status = WorkerStatus::Quarantined;
        }
    }

    pub fn reinstate(&self, worker_id: &WorkerId) {
        if let Some(mut entry) = self.entries.get_mut(worker_id) {
            entry.status = WorkerStatus::Active;
        }
    }

    pub fn active_worker_ids(&self) -> Vec<WorkerId> {
        self.entries
            .iter()
            .filter(|e| e.status == WorkerStatus::Active)
            .map(|e| e.worker_id.clone())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        self.entries.iter().map(|e| e.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarantined_worker_is_excluded_from_active_list() {
        let registry = Registry::new();
        registry.register("w1".to_string(), "simulated");
        registry.register("w2".to_string(), "simulated");
        registry.quarantine(&"w1".to_string());
        let active = registry.active_worker_ids();
        assert_eq!(active, vec!["w2".to_string()]);
    }

    #[test]
    fn reinstated_worker_becomes_active_again() {
        let registry = Registry::new();
        registry.register("w1".to_string(), "simulated");
        registry.quarantine(&"w1".to_string());
        registry.reinstate(&"w1".to_string());
        assert_eq!(registry.active_worker_ids(), vec!["w1".to_string()]);
    }
}
