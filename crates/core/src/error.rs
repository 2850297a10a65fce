//! Error types for s3kv-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for s3kv-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for s3kv-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Key or object is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Copy destination (or a no-overwrite put target) already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Any transport or storage failure reported by the backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Local file open/create/read/write failure
    #[error("Local I/O error on {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation aborted through its cancellation token
    #[error("Operation canceled")]
    Canceled,

    /// Configuration file or connection settings error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed argument (empty key, missing transfer endpoint, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Wrap an I/O error with the local path it happened on
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) | Error::Config(_) | Error::InvalidUrl(_) => 2, // UsageError
            Error::TomlParse(_) | Error::TomlSerialize(_) => 2,
            Error::Backend(_) => 3,       // BackendError
            Error::NotFound(_) => 5,      // NotFound
            Error::AlreadyExists(_) => 6, // Conflict
            Error::Canceled => 130,       // Interrupted
            Error::LocalIo { .. } => 1,   // GeneralError
        }
    }
}
