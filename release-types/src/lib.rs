use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// String-to-string label set attached to a release
pub type Labels = BTreeMap<String, String>;

/// Lifecycle state of a single release revision
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStatus {
    #[default]
    Unknown,
    Deployed,
    Uninstalled,
    Superseded,
    Failed,
    Uninstalling,
    PendingInstall,
    PendingUpgrade,
    PendingRollback,
}

impl ReleaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Deployed => "deployed",
            Self::Uninstalled => "uninstalled",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
            Self::Uninstalling => "uninstalling",
            Self::PendingInstall => "pending-install",
            Self::PendingUpgrade => "pending-upgrade",
            Self::PendingRollback => "pending-rollback",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned deployment record.
///
/// Storage drivers only look at the name, revision, status and labels.
/// `payload` carries the rest of the release state and is passed through
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    pub name: String,
    pub namespace: String,
    pub version: u32,
    pub status: ReleaseStatus,
    #[serde(default)]
    pub labels: Labels,
    pub first_deployed: DateTime<Utc>,
    pub last_deployed: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Release {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, version: u32) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            namespace: namespace.into(),
            version,
            status: ReleaseStatus::Unknown,
            labels: Labels::new(),
            first_deployed: now,
            last_deployed: now,
            description: String::new(),
            payload: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: ReleaseStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} (v{})", self.namespace, self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&ReleaseStatus::PendingInstall).unwrap();
        assert_eq!(json, "\"pending-install\"");
        assert_eq!(ReleaseStatus::PendingInstall.to_string(), "pending-install");
    }

    #[test]
    fn test_release_builder() {
        let release = Release::new("web", "default", 3)
            .with_status(ReleaseStatus::Deployed)
            .with_label("env", "prod")
            .with_payload(serde_json::json!({"chart": "nginx"}));

        assert_eq!(release.version, 3);
        assert_eq!(release.status, ReleaseStatus::Deployed);
        assert_eq!(release.labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(release.payload["chart"], "nginx");
        assert_eq!(release.to_string(), "default/web (v3)");
    }

    #[test]
    fn test_release_missing_optional_fields_deserialize() {
        let now = Utc::now();
        let json = serde_json::json!({
            "name": "api",
            "namespace": "ops",
            "version": 1,
            "status": "deployed",
            "first_deployed": now,
            "last_deployed": now,
        });

        let release: Release = serde_json::from_value(json).unwrap();
        assert!(release.labels.is_empty());
        assert!(release.payload.is_null());
        assert!(release.description.is_empty());
    }
}
