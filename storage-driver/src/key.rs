use std::fmt;
use std::str::FromStr;

use crate::error::DriverError;

const VERSION_SEPARATOR: &str = ".v";

/// Storage key of a single release revision, rendered as `<name>.v<revision>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseKey {
    pub name: String,
    pub version: u32,
}

impl ReleaseKey {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Splits a raw key into name and revision.
    ///
    /// The revision is taken after the last `.v`, so names that contain `.v`
    /// themselves still parse. Keys must be canonical: `web.v01` names the
    /// same revision as `web.v1` and is rejected.
    pub fn parse(key: &str) -> Result<Self, DriverError> {
        let (name, version) = key
            .rsplit_once(VERSION_SEPARATOR)
            .ok_or_else(|| DriverError::invalid_key(key))?;

        if name.is_empty() || version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DriverError::invalid_key(key));
        }

        let version = version
            .parse::<u32>()
            .map_err(|_| DriverError::invalid_key(key))?;

        let parsed = Self::new(name, version);
        if parsed.to_string() != key {
            return Err(DriverError::invalid_key(key));
        }

        Ok(parsed)
    }
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, VERSION_SEPARATOR, self.version)
    }
}

impl FromStr for ReleaseKey {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&release_types::Release> for ReleaseKey {
    fn from(release: &release_types::Release) -> Self {
        Self::new(release.name.clone(), release.version)
    }
}
