//! Append-only audit log, backed by an embedded `sled` tree.
//!
//! Keys are big-endian-encoded autoincrement ids, so `sled`'s native
//! lexicographic key ordering gives insertion-ordered (and therefore
//! timestamp-ordered) scans without a secondary index — the same property
//! an autoincrement primary key gives a SQL table, here obtained from the
//! key encoding instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: u64,
    pub intent_id: String,
    pub timestamp: DateTime<Utc>,
    pub risk_level: String,
    pub action_type: String,
    pub target: String,
    pub consensus_reached: bool,
    pub consensus_cert_json: Option<String>,
    pub sentry_validation: bool,
}

pub struct Auditor {
    tree: sled::Tree,
    next_id: AtomicU64,
}

impl Auditor {
    pub fn open(db: &sled::Db, tree_name: &str) -> anyhow::Result<Self> {
        let tree = db.open_tree(tree_name)?;
        let next_id = tree
            .iter()
            .keys()
            .last()
            .transpose()?
            .map(|k| u64::from_be_bytes(k.as_ref().try_into().expect("8-byte key")) + 1)
            .unwrap_or(0);
        Ok(Self {
            tree,
            next_id: AtomicU64::new(next_id),
        })
    }

    /// Always appends a new row, even for a repeated `intent_id` — the audit
    /// log retains full history rather than deduplicating.
    pub fn log_execution(&self, mut record: AuditRecord) -> anyhow::Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.id = id;
        let value = serde_json::to_vec(&record)?;
        self.tree.insert(id.to_be_bytes(), value)?;
        self.tree.flush()?;
        Ok(id)
    }

    pub fn get_history(&self, limit: usize) -> anyhow::Result<Vec<AuditRecord>> {
        self.tree
            .iter()
            .values()
            .rev()
            .take(limit)
            .map(|v| serde_json::from_slice(&v?).map_err(anyhow::Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(intent_id: &str) -> AuditRecord {
        AuditRecord {
            id: 0,
            intent_id: intent_id.to_string(),
            timestamp: Utc::now(),
            risk_level: "LOW".into(),
            action_type: "PING".into(),
            target: "svc".into(),
            consensus_reached: true,
            consensus_cert_json: None,
            sentry_validation: true,
        }
    }

    #[test]
    fn repeated_intent_produces_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let auditor = Auditor::open(&db, "audit").unwrap();
        auditor.log_execution(sample_record("intent-1")).unwrap();
        auditor.log_execution(sample_record("intent-1")).unwrap();
        let history = auditor.get_history(10).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn history_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let auditor = Auditor::open(&db, "audit").unwrap();
        for i in 0..10 {
            auditor.log_execution(sample_record(&format!("intent-{i}"))).unwrap();
        }
        let history = auditor.get_history(3).unwrap();
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn reopening_continues_id_sequence() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = sled::open(dir.path()).unwrap();
            let auditor = Auditor::open(&db, "audit").unwrap();
            auditor.log_execution(sample_record("intent-1")).unwrap();
        }
        let db = sled::open(dir.path()).unwrap();
        let auditor = Auditor::open(&db, "audit").unwrap();
        let id = auditor.log_execution(sample_record("intent-2")).unwrap();
        assert_eq!(id, 1);
    }
}
