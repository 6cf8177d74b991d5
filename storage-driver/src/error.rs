use thiserror::Error;

/// Failure kinds every driver reports.
///
/// `NotFound`, `AlreadyExists` and `InvalidKey` are expected outcomes of
/// normal operation and carry the key that caused them. Anything else a
/// backend runs into is wrapped in `Backend` and passed through unchanged.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("release: {0:?} not found")]
    NotFound(String),

    #[error("release: {0:?} already exists")]
    AlreadyExists(String),

    #[error("release: {0:?} invalid key")]
    InvalidKey(String),

    #[error(transparent)]
    Backend(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidKey,
    Backend,
}

impl DriverError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists(key.into())
    }

    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }

    /// The release key the error refers to, if it is one of the keyed kinds.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::NotFound(key) | Self::AlreadyExists(key) | Self::InvalidKey(key) => {
                Some(key.as_str())
            }
            Self::Backend(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey(_))
    }
}

impl From<anyhow::Error> for DriverError {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(err)
    }
}

impl From<object_store::Error> for DriverError {
    fn from(err: object_store::Error) -> Self {
        Self::Backend(err.into())
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(err.into())
    }
}

pub type Result<T, E = DriverError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            DriverError::not_found("web.v1").to_string(),
            "release: \"web.v1\" not found"
        );
        assert_eq!(
            DriverError::already_exists("web.v1").to_string(),
            "release: \"web.v1\" already exists"
        );
        assert_eq!(
            DriverError::invalid_key("web").to_string(),
            "release: \"web\" invalid key"
        );
    }

    #[test]
    fn test_error_kind_and_key() {
        let err = DriverError::already_exists("api.v2");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(err.key(), Some("api.v2"));
        assert!(err.is_already_exists());
        assert!(!err.is_not_found());

        let err = DriverError::from(anyhow::anyhow!("connection reset"));
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(err.key(), None);
        assert!(err.to_string().contains("connection reset"));
    }
}
