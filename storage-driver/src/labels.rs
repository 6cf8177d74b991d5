use release_types::{Labels, Release};
use tracing::warn;

pub const NAME_LABEL: &str = "name";
pub const OWNER_LABEL: &str = "owner";
pub const STATUS_LABEL: &str = "status";
pub const VERSION_LABEL: &str = "version";

pub const OWNER: &str = "helm";

pub const SYSTEM_LABELS: [&str; 4] = [NAME_LABEL, OWNER_LABEL, STATUS_LABEL, VERSION_LABEL];

/// Labels a release is indexed by: its own label set overlaid with the
/// system labels. System labels win on conflict.
pub fn storage_labels(release: &Release) -> Labels {
    let mut labels = release.labels.clone();
    labels.insert(NAME_LABEL.to_string(), release.name.clone());
    labels.insert(OWNER_LABEL.to_string(), OWNER.to_string());
    labels.insert(STATUS_LABEL.to_string(), release.status.to_string());
    labels.insert(VERSION_LABEL.to_string(), release.version.to_string());
    labels
}

/// User label keys that a system label will replace in the index.
pub fn shadowed_labels(release: &Release) -> Vec<&str> {
    release
        .labels
        .keys()
        .map(String::as_str)
        .filter(|key| SYSTEM_LABELS.contains(key))
        .collect()
}

pub(crate) fn warn_shadowed_labels(key: &str, release: &Release) {
    let shadowed = shadowed_labels(release);
    if !shadowed.is_empty() {
        warn!(
            "Release {} sets reserved labels {:?}; the system values are indexed instead",
            key, shadowed
        );
    }
}

/// True when every pair in `filter` is present and equal in `labels`.
/// An empty filter matches everything.
pub fn matches(filter: &Labels, labels: &Labels) -> bool {
    filter
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

pub fn release_matches(filter: &Labels, release: &Release) -> bool {
    filter.is_empty() || matches(filter, &storage_labels(release))
}
