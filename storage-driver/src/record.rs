use chrono::{DateTime, Utc};
use release_types::{Labels, Release};
use serde::{Deserialize, Serialize};

use crate::labels::storage_labels;

/// On-store representation of one release, as written by
/// [`ObjectStoreDriver`](crate::ObjectStoreDriver).
///
/// Labels are stored next to the release so scans can filter without
/// recomputing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub labels: Labels,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub release: Release,
}

impl StoredRecord {
    pub fn new(key: impl Into<String>, release: &Release) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            labels: storage_labels(release),
            created_at: now,
            modified_at: now,
            release: release.clone(),
        }
    }

    /// Swaps in a new release, keeping the creation time.
    pub fn replace(&mut self, release: &Release) {
        self.labels = storage_labels(release);
        self.modified_at = Utc::now();
        self.release = release.clone();
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use release_types::ReleaseStatus;

    #[test]
    fn test_new_record() {
        let release = Release::new("web", "default", 1).with_label("env", "prod");
        let record = StoredRecord::new("web.v1", &release);

        assert_eq!(record.key, "web.v1");
        assert_eq!(record.created_at, record.modified_at);
        assert_eq!(record.labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(record.labels.get("name").map(String::as_str), Some("web"));
        assert_eq!(record.release, release);
    }

    #[test]
    fn test_replace_keeps_created_at() {
        let release = Release::new("web", "default", 1).with_status(ReleaseStatus::PendingInstall);
        let mut record = StoredRecord::new("web.v1", &release);
        let created_at = record.created_at;

        let updated = release.clone().with_status(ReleaseStatus::Deployed);
        record.replace(&updated);

        assert_eq!(record.created_at, created_at);
        assert!(record.modified_at >= created_at);
        assert_eq!(record.release.status, ReleaseStatus::Deployed);
        assert_eq!(
            record.labels.get("status").map(String::as_str),
            Some("deployed")
        );
    }

    #[test]
    fn test_json_layout() {
        let release =
            Release::new("web", "default", 2).with_payload(serde_json::json!({"replicas": 3}));
        let record = StoredRecord::new("web.v2", &release);

        let bytes = record.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["key"], "web.v2");
        assert_eq!(value["labels"]["version"], "2");
        assert_eq!(value["release"]["payload"]["replicas"], 3);

        let decoded = StoredRecord::from_json(&bytes).unwrap();
        assert_eq!(decoded.release, release);
    }
}
