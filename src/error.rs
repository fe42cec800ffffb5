//! Error types for homelink

use thiserror::Error;

/// Result type alias for homelink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving devices, bindings and homes
#[derive(Debug, Error)]
pub enum Error {
    /// No such device, binding, home or member
    #[error("entry not exist: {0}")]
    NotExist(String),

    /// Entry exists but is frozen or inactive
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// Identity row failed structural validation or type mismatch
    #[error("invalid device: {0}")]
    InvalidDevice(String),

    /// Caller input malformed
    #[error("invalid param: {0}")]
    InvalidParam(String),

    /// Empty or malformed name
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Natural key already bound to another did
    #[error("already binded: {0}")]
    AlreadyBinded(String),

    /// Device has no binding yet
    #[error("not yet binded: {0}")]
    NotYetBinded(String),

    /// User is not a member of the home
    #[error("no privilege: {0}")]
    NoPrivilege(String),

    /// User is a member but not allowed (frozen membership)
    #[error("not allowed: {0}")]
    NotAllowed(String),

    /// Data-integrity or uncategorized failure
    #[error("unknown error: {0}")]
    Unknown(String),

    /// Store rejected a write because of a uniqueness constraint
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection pool error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Single classification handed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotExist,
    InvalidStatus,
    InvalidDevice,
    InvalidParam,
    InvalidName,
    AlreadyBinded,
    NotYetBinded,
    NoPrivilege,
    NotAllowed,
    Unknown,
}

impl Error {
    /// Classify this error into the caller-facing taxonomy
    ///
    /// Store and ambient failures classify as [`ErrorKind::Unknown`]; the
    /// underlying cause stays available through `Display` for logging.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotExist(_) => ErrorKind::NotExist,
            Self::InvalidStatus(_) => ErrorKind::InvalidStatus,
            Self::InvalidDevice(_) => ErrorKind::InvalidDevice,
            Self::InvalidParam(_) | Self::Config(_) => ErrorKind::InvalidParam,
            Self::InvalidName(_) => ErrorKind::InvalidName,
            Self::AlreadyBinded(_) => ErrorKind::AlreadyBinded,
            Self::NotYetBinded(_) => ErrorKind::NotYetBinded,
            Self::NoPrivilege(_) => ErrorKind::NoPrivilege,
            Self::NotAllowed(_) => ErrorKind::NotAllowed,
            Self::Unknown(_)
            | Self::Constraint(_)
            | Self::Database(_)
            | Self::Sqlite(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Toml(_) => ErrorKind::Unknown,
        }
    }

    /// Map an insert failure, surfacing uniqueness violations as [`Error::Constraint`]
    #[must_use]
    pub fn from_insert(e: rusqlite::Error, what: &str) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(format!("{what}: {e}"))
            }
            other => Self::Sqlite(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_classify_as_unknown() {
        let err = Error::Database("pool timed out".to_string());
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.to_string().contains("pool timed out"));
    }

    #[test]
    fn taxonomy_is_preserved() {
        assert_eq!(Error::NoPrivilege("x".into()).kind(), ErrorKind::NoPrivilege);
        assert_eq!(Error::NotExist("x".into()).kind(), ErrorKind::NotExist);
        assert_eq!(Error::AlreadyBinded("x".into()).kind(), ErrorKind::AlreadyBinded);
    }
}
