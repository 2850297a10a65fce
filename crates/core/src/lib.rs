//! s3kv-core: key-value store over S3-compatible object storage
//!
//! This crate provides:
//! - [`Store`], a key-value view of one bucket (set/get, prefix listing, recursive delete,
//!   copy and move)
//! - the [`ObjectStore`] capability the Store is built on, with an in-memory backend
//! - the streaming [`transfer`] pipeline between local files and `s3:` keys
//! - configuration loading and layering
//!
//! The crate does not depend on any S3 SDK; see `s3kv-s3` for the network backend.

pub mod config;
pub mod error;
pub mod memory;
pub mod options;
pub mod path;
pub mod store;
pub mod traits;
pub mod transfer;

pub use config::{Config, ConfigManager, ConnectionConfig, ConnectionSettings};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use options::{
    CallOptions, CopyOptions, DelOptions, GetInfoOptions, GetOptions, ListOptions, SetOptions,
};
pub use path::{REMOTE_PREFIX, TransferEndpoint, parse_endpoint, remote_key};
pub use store::{DEFAULT_BUCKET, FOLDER_SEPARATOR, Listing, Record, Store};
pub use traits::{ByteReader, ObjectInfo, ObjectReader, ObjectStore};
pub use transfer::{LazyStore, transfer};
