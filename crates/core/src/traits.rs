//! ObjectStore trait definition
//!
//! This trait defines the object-storage capability the key-value layer is built on.
//! It only understands buckets, keys and byte streams; everything key-value shaped
//! lives in [`crate::store`]. Implemented by the S3 adapter and by [`crate::MemoryStore`].

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::BoxStream;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::Result;

/// Owned, sendable byte stream used for uploads and downloads
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata for an object or a common prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key or common prefix
    pub key: String,

    /// Size in bytes (None for prefixes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Storage class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Whether this is a common prefix rather than a stored object
    pub is_dir: bool,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for a stored object
    pub fn file(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size.max(0) as u64, humansize::BINARY)),
            last_modified: None,
            etag: None,
            storage_class: None,
            content_type: None,
            is_dir: false,
        }
    }

    /// Create a new ObjectInfo for a common prefix
    pub fn dir(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size_bytes: None,
            size_human: None,
            last_modified: None,
            etag: None,
            storage_class: None,
            content_type: None,
            is_dir: true,
        }
    }

    /// Size in bytes, zero for prefixes
    pub fn size(&self) -> u64 {
        self.size_bytes.unwrap_or(0).max(0) as u64
    }
}

/// A live object body together with its stat information
///
/// Dropping the reader releases the underlying connection.
pub struct ObjectReader {
    info: ObjectInfo,
    reader: ByteReader,
}

impl ObjectReader {
    pub fn new(info: ObjectInfo, reader: ByteReader) -> Self {
        Self { info, reader }
    }

    /// Stat information captured when the object was opened
    pub fn stat(&self) -> &ObjectInfo {
        &self.info
    }

    /// Declared size of the object body
    pub fn size(&self) -> u64 {
        self.info.size()
    }

    pub fn into_parts(self) -> (ObjectInfo, ByteReader) {
        (self.info, self.reader)
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.get_mut().reader.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Backend options for put requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutObjectOptions {
    /// Content type stored with the object
    pub content_type: Option<String>,

    /// Storage class for the object
    pub storage_class: Option<String>,

    /// User metadata
    pub metadata: HashMap<String, String>,

    /// Refuse to replace an existing object (conditional put)
    pub no_overwrite: bool,
}

/// Backend options for get requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetObjectOptions {
    /// Inclusive byte range: start offset and optional end offset
    pub range: Option<(u64, Option<u64>)>,

    /// Object version to read
    pub version_id: Option<String>,
}

impl GetObjectOptions {
    /// Limit the read to bytes `start..=end` (or `start..` when `end` is None)
    pub fn set_range(&mut self, start: u64, end: Option<u64>) -> &mut Self {
        self.range = Some((start, end));
        self
    }

    /// HTTP Range header value for the configured range
    pub fn range_header(&self) -> Option<String> {
        self.range.map(|(start, end)| match end {
            Some(end) => format!("bytes={start}-{end}"),
            None => format!("bytes={start}-"),
        })
    }
}

/// Backend options for stat requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatObjectOptions {
    /// Object version to stat
    pub version_id: Option<String>,
}

/// Backend options for remove requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveObjectOptions {
    /// Object version to remove
    pub version_id: Option<String>,
}

/// Backend options for list requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListObjectsOptions {
    /// Prefix to filter by
    pub prefix: String,

    /// List every key under the prefix instead of grouping on `/`
    pub recursive: bool,

    /// Maximum number of keys to return in total
    pub max_keys: Option<usize>,

    /// Only return keys lexicographically after this one
    pub start_after: Option<String>,
}

/// Backend options for server-side copy requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyObjectOptions {
    /// Replace the content type instead of copying the source's
    pub content_type: Option<String>,
}

/// Object-storage capability used by [`crate::Store`]
///
/// Implementations handle authentication and wire-level retries themselves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload exactly `size` bytes from `reader`
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: ByteReader,
        size: u64,
        options: &PutObjectOptions,
    ) -> Result<()>;

    /// Open an object for streaming read
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        options: &GetObjectOptions,
    ) -> Result<ObjectReader>;

    /// Get object metadata
    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
        options: &StatObjectOptions,
    ) -> Result<ObjectInfo>;

    /// Remove an object; removing an absent key is not an error
    async fn remove_object(
        &self,
        bucket: &str,
        key: &str,
        options: &RemoveObjectOptions,
    ) -> Result<()>;

    /// Lazily list objects in key order, paging through the backend as the stream is polled
    fn list_objects(
        &self,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> BoxStream<'static, Result<ObjectInfo>>;

    /// Server-side copy within one bucket
    async fn copy_object(
        &self,
        bucket: &str,
        source: &str,
        destination: &str,
        options: &CopyObjectOptions,
    ) -> Result<()>;
}
