//! Transfer endpoint parsing
//!
//! An argument starting with `s3:` names a key in the Store, anything else is a local
//! path. Surrounding spaces and tabs are ignored.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Prefix marking an argument as a Store key
pub const REMOTE_PREFIX: &str = "s3:";

/// Source or target of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEndpoint {
    /// Local filesystem path
    Local(PathBuf),
    /// Key in the Store's bucket
    Remote(String),
}

impl TransferEndpoint {
    /// Check if this is a Store key
    pub fn is_remote(&self) -> bool {
        matches!(self, TransferEndpoint::Remote(_))
    }

    /// Check if this is a local path
    pub fn is_local(&self) -> bool {
        matches!(self, TransferEndpoint::Local(_))
    }

    /// Get the key if this is a Store key
    pub fn as_remote(&self) -> Option<&str> {
        match self {
            TransferEndpoint::Remote(key) => Some(key),
            TransferEndpoint::Local(_) => None,
        }
    }

    /// Get the path if this is a local path
    pub fn as_local(&self) -> Option<&PathBuf> {
        match self {
            TransferEndpoint::Local(path) => Some(path),
            TransferEndpoint::Remote(_) => None,
        }
    }
}

impl std::fmt::Display for TransferEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferEndpoint::Local(path) => write!(f, "{}", path.display()),
            TransferEndpoint::Remote(key) => write!(f, "{REMOTE_PREFIX}{key}"),
        }
    }
}

/// Parse an argument into a TransferEndpoint
pub fn parse_endpoint(arg: &str) -> Result<TransferEndpoint> {
    let arg = arg.trim_matches([' ', '\t']);

    let endpoint = match arg.strip_prefix(REMOTE_PREFIX) {
        Some(key) => TransferEndpoint::Remote(key.to_string()),
        None => TransferEndpoint::Local(PathBuf::from(arg)),
    };

    match &endpoint {
        TransferEndpoint::Remote(key) if key.is_empty() => Err(Error::InvalidArgument(format!(
            "'{arg}' does not name a key"
        ))),
        TransferEndpoint::Local(path) if path.as_os_str().is_empty() => {
            Err(Error::InvalidArgument("Path cannot be empty".into()))
        }
        _ => Ok(endpoint),
    }
}

/// Key named by an argument, with or without the `s3:` prefix
pub fn remote_key(arg: &str) -> Result<&str> {
    let arg = arg.trim_matches([' ', '\t']);
    let key = arg.strip_prefix(REMOTE_PREFIX).unwrap_or(arg);
    if key.is_empty() {
        return Err(Error::InvalidArgument("Key cannot be empty".into()));
    }
    Ok(key)
}
