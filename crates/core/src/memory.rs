//! In-memory ObjectStore backend
//!
//! Keeps objects in ordered maps per bucket and mimics the S3 behaviors the Store relies
//! on: lexicographic listing, `/` grouping for non-recursive lists, start-after, byte
//! ranges, conditional puts and idempotent removes. Faults can be injected per key.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use parking_lot::RwLock;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::traits::{
    ByteReader, CopyObjectOptions, GetObjectOptions, ListObjectsOptions, ObjectInfo,
    ObjectReader, ObjectStore, PutObjectOptions, RemoveObjectOptions, StatObjectOptions,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    info: ObjectInfo,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    failing_gets: HashSet<String>,
    failing_removes: HashSet<String>,
    failing_lists: HashSet<String>,
}

/// In-process object store, cloned handles share the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys stored in `bucket`, in order
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.inner
            .read()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Make every get of `key` fail with a backend error
    pub fn fail_get(&self, key: impl Into<String>) {
        self.inner.write().failing_gets.insert(key.into());
    }

    /// Make every remove of `key` fail with a backend error
    pub fn fail_remove(&self, key: impl Into<String>) {
        self.inner.write().failing_removes.insert(key.into());
    }

    /// Make listings of exactly `prefix` end with a backend error after their entries
    pub fn fail_list(&self, prefix: impl Into<String>) {
        self.inner.write().failing_lists.insert(prefix.into());
    }

    pub fn clear_faults(&self) {
        let mut inner = self.inner.write();
        inner.failing_gets.clear();
        inner.failing_removes.clear();
        inner.failing_lists.clear();
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        self.inner
            .read()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

/// Group keys below `prefix` on the next `/`, like a delimited S3 listing
fn list_entries(
    objects: &BTreeMap<String, StoredObject>,
    options: &ListObjectsOptions,
) -> Vec<ObjectInfo> {
    let mut entries: Vec<ObjectInfo> = Vec::new();

    let keys = objects
        .range(options.prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&options.prefix))
        .filter(|(key, _)| match &options.start_after {
            Some(after) => key.as_str() > after.as_str(),
            None => true,
        });

    for (key, object) in keys {
        let rest = &key[options.prefix.len()..];
        match rest.find('/') {
            Some(pos) if !options.recursive => {
                let dir = format!("{}{}", options.prefix, &rest[..=pos]);
                if entries.last().map(|e| e.key.as_str()) != Some(dir.as_str()) {
                    entries.push(ObjectInfo::dir(dir));
                }
            }
            _ => entries.push(object.info.clone()),
        }
    }

    if let Some(max) = options.max_keys {
        entries.truncate(max);
    }
    entries
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: ByteReader,
        size: u64,
        options: &PutObjectOptions,
    ) -> Result<()> {
        let mut data = Vec::with_capacity(size as usize);
        reader
            .take(size)
            .read_to_end(&mut data)
            .await
            .map_err(|e| Error::Backend(format!("read body for {key}: {e}")))?;

        if data.len() as u64 != size {
            return Err(Error::Backend(format!(
                "body for {key} ended after {} of {size} bytes",
                data.len()
            )));
        }

        let mut info = ObjectInfo::file(key, data.len() as i64);
        info.last_modified = Some(jiff::Timestamp::now());
        info.content_type = options.content_type.clone();
        info.storage_class = options.storage_class.clone();

        let mut inner = self.inner.write();
        let objects = inner.buckets.entry(bucket.to_string()).or_default();
        if options.no_overwrite && objects.contains_key(key) {
            return Err(Error::AlreadyExists(key.to_string()));
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                data: Bytes::from(data),
                info,
            },
        );
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        options: &GetObjectOptions,
    ) -> Result<ObjectReader> {
        if self.inner.read().failing_gets.contains(key) {
            return Err(Error::Backend(format!("injected get failure for {key}")));
        }
        let object = self.lookup(bucket, key)?;

        let data = match options.range {
            None => object.data,
            Some((start, end)) => {
                let len = object.data.len() as u64;
                if start >= len {
                    return Err(Error::Backend(format!("invalid range for {key}")));
                }
                let end = end.map_or(len - 1, |end| end.min(len - 1));
                object.data.slice(start as usize..=end as usize)
            }
        };

        let mut info = object.info;
        info.size_bytes = Some(data.len() as i64);
        Ok(ObjectReader::new(info, Box::pin(Cursor::new(data))))
    }

    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &StatObjectOptions,
    ) -> Result<ObjectInfo> {
        self.lookup(bucket, key).map(|object| object.info)
    }

    async fn remove_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &RemoveObjectOptions,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.failing_removes.contains(key) {
            return Err(Error::Backend(format!("injected remove failure for {key}")));
        }
        if let Some(objects) = inner.buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    fn list_objects(
        &self,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> BoxStream<'static, Result<ObjectInfo>> {
        let inner = self.inner.read();
        let entries = inner
            .buckets
            .get(bucket)
            .map(|objects| list_entries(objects, options))
            .unwrap_or_default();
        let fault = inner
            .failing_lists
            .contains(&options.prefix)
            .then(|| Err(Error::Backend(format!("injected list failure for {}", options.prefix))));

        stream::iter(entries.into_iter().map(Ok).chain(fault)).boxed()
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source: &str,
        destination: &str,
        options: &CopyObjectOptions,
    ) -> Result<()> {
        let mut object = self.lookup(bucket, source)?;
        object.info.key = destination.to_string();
        object.info.last_modified = Some(jiff::Timestamp::now());
        if let Some(content_type) = &options.content_type {
            object.info.content_type = Some(content_type.clone());
        }

        self.inner
            .write()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(destination.to_string(), object);
        Ok(())
    }
}
