//! Key-value Store over one bucket
//!
//! [`Store`] layers Set/Get/Del/List/Copy/Move on top of an [`ObjectStore`]. It is cheap to
//! clone and safe to share between tasks: the bucket and default cancellation token never
//! change once the Store is handed out, and the backend client is shared behind an `Arc`.
//!
//! Listing and fetching semantics differ on purpose:
//! - [`Store::del`] on a folder marker is fail-fast: the first failed child delete aborts.
//! - [`Store::list_body`] is best-effort: a key whose value cannot be fetched is logged and
//!   left out of the output, the rest of the listing continues.

use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::options::{
    self, CopyOptions, DelOptions, GetInfoOptions, GetOptions, ListOptions, Resolved, SetOptions,
};
use crate::traits::{
    ByteReader, GetObjectOptions, ListObjectsOptions, ObjectInfo, ObjectReader, ObjectStore,
    RemoveObjectOptions,
};

/// Bucket used by `connect` when the caller does not name one
pub const DEFAULT_BUCKET: &str = "s3kv";

/// Keys ending with this separator are folder markers
pub const FOLDER_SEPARATOR: char = '/';

/// Buffer size of the List/ListBody output channels
const LIST_CHANNEL_CAPACITY: usize = 1;

/// A key together with its value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    pub key: String,
    pub value: Vec<u8>,
}

/// Output of a listing running in a background task
///
/// Items arrive through [`Listing::recv`]; once the channel is drained,
/// [`Listing::finish`] reports whether the listing ended because of an error.
#[derive(Debug)]
pub struct Listing<T> {
    items: mpsc::Receiver<T>,
    task: JoinHandle<Result<()>>,
}

impl<T> Listing<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.items.recv().await
    }

    /// Wait for the producer and return its listing error, if any
    ///
    /// Items not yet received are dropped.
    pub async fn finish(self) -> Result<()> {
        drop(self.items);
        self.task
            .await
            .map_err(|e| Error::Backend(format!("listing task failed: {e}")))?
    }

    /// Drain every item, then [`Listing::finish`]
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = self.items.recv().await {
            out.push(item);
        }
        self.finish().await?;
        Ok(out)
    }

    /// Plain receiver; a listing error only shows up in the log
    pub fn into_receiver(self) -> mpsc::Receiver<T> {
        self.items
    }
}

/// Key-value view of one bucket
#[derive(Clone)]
pub struct Store {
    client: Arc<dyn ObjectStore>,
    bucket: String,
    cancel: CancellationToken,
    list_body_concurrency: Option<usize>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("bucket", &self.bucket)
            .field("list_body_concurrency", &self.list_body_concurrency)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Create a Store for `bucket` on a shared backend client
    pub fn new(client: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            cancel: CancellationToken::new(),
            list_body_concurrency: None,
        }
    }

    /// Cap the number of concurrent fetches started by [`Store::list_body`]
    ///
    /// Without a cap every listed key gets its own fetch task at once.
    pub fn with_list_body_concurrency(mut self, limit: usize) -> Self {
        self.list_body_concurrency = Some(limit.max(1));
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Default cancellation token used by calls that do not bring their own
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// Store `data` under `key`, replacing any previous value
    pub async fn set(
        &self,
        key: &str,
        data: impl Into<Vec<u8>>,
        options: Option<SetOptions>,
    ) -> Result<()> {
        let data = data.into();
        let size = data.len() as u64;
        self.set_object(key, Box::pin(Cursor::new(data)), size, options)
            .await
    }

    /// Stream exactly `size` bytes from `reader` into `key`
    pub async fn set_object(
        &self,
        key: &str,
        reader: ByteReader,
        size: u64,
        options: Option<SetOptions>,
    ) -> Result<()> {
        let resolved = options::resolve(&self.cancel, options);
        tracing::debug!(bucket = %self.bucket, key, size, "put object");
        cancellable(
            &resolved.cancel,
            self.client
                .put_object(&self.bucket, key, reader, size, &resolved.object),
        )
        .await
    }

    /// Fetch the whole value of `key` into memory
    pub async fn get(&self, key: &str, options: Option<GetOptions>) -> Result<Vec<u8>> {
        let resolved = options::resolve(&self.cancel, options);
        let mut object = self.open(key, &resolved).await?;

        let mut data = Vec::with_capacity(object.size() as usize);
        cancellable(&resolved.cancel, async {
            object
                .read_to_end(&mut data)
                .await
                .map_err(|e| Error::Backend(format!("read {key}: {e}")))
        })
        .await?;

        Ok(data)
    }

    /// Open `key` for streaming read; the caller owns the returned reader
    pub async fn get_object(&self, key: &str, options: Option<GetOptions>) -> Result<ObjectReader> {
        let resolved = options::resolve(&self.cancel, options);
        self.open(key, &resolved).await
    }

    async fn open(
        &self,
        key: &str,
        resolved: &Resolved<GetObjectOptions>,
    ) -> Result<ObjectReader> {
        tracing::debug!(bucket = %self.bucket, key, "get object");
        cancellable(
            &resolved.cancel,
            self.client.get_object(&self.bucket, key, &resolved.object),
        )
        .await
    }

    /// Stat `key` without transferring its data
    pub async fn get_info(&self, key: &str, options: Option<GetInfoOptions>) -> Result<ObjectInfo> {
        let resolved = options::resolve(&self.cancel, options);
        cancellable(
            &resolved.cancel,
            self.client.stat_object(&self.bucket, key, &resolved.object),
        )
        .await
    }

    /// Delete `key`; a key ending in `/` also deletes everything under it
    ///
    /// Children are deleted before the marker itself. The first failure is returned and
    /// nothing after it (including the marker) is touched.
    pub async fn del(&self, key: &str, options: Option<DelOptions>) -> Result<()> {
        let resolved = options::resolve(&self.cancel, options);
        self.remove(key, resolved).await
    }

    fn remove<'a>(
        &'a self,
        key: &'a str,
        resolved: Resolved<RemoveObjectOptions>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if key.ends_with(FOLDER_SEPARATOR) {
                let children = self.folder_children(key, &resolved.cancel).await?;
                tracing::debug!(bucket = %self.bucket, key, children = children.len(), "delete folder");

                for child in children {
                    self.remove(&child, resolved.clone()).await?;
                }
            }

            tracing::debug!(bucket = %self.bucket, key, "remove object");
            cancellable(
                &resolved.cancel,
                self.client
                    .remove_object(&self.bucket, key, &resolved.object),
            )
            .await
        }
        .boxed()
    }

    /// Direct children of a folder marker, nested folders reported by their prefix
    async fn folder_children(&self, marker: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        let options = ListObjectsOptions {
            prefix: marker.to_string(),
            ..Default::default()
        };

        let mut children = Vec::new();
        let mut objects = self.client.list_objects(&self.bucket, &options);
        while let Some(item) = cancellable(cancel, async { Ok(objects.next().await) }).await? {
            let info = item?;
            if info.key != marker {
                children.push(info.key);
            }
        }
        Ok(children)
    }

    /// Backend listing with the max-keys cap and cancellation applied
    fn listing(&self, resolved: &Resolved<ListObjectsOptions>) -> BoxStream<'static, Result<ObjectInfo>> {
        let objects = self
            .client
            .list_objects(&self.bucket, &resolved.object)
            .take_until(resolved.cancel.clone().cancelled_owned());

        match resolved.object.max_keys {
            Some(cap) => objects.take(cap).boxed(),
            None => objects.boxed(),
        }
    }

    /// Count keys under `prefix`, stopping at the max-keys cap
    ///
    /// A listing error ends the count early; use [`Store::try_list_len`] to see it.
    pub async fn list_len(&self, prefix: &str, options: Option<ListOptions>) -> usize {
        let (count, _) = self.count(prefix, options).await;
        count
    }

    /// Like [`Store::list_len`], but a listing error is returned instead of a short count
    pub async fn try_list_len(&self, prefix: &str, options: Option<ListOptions>) -> Result<usize> {
        let (count, outcome) = self.count(prefix, options).await;
        outcome.map(|()| count)
    }

    async fn count(&self, prefix: &str, options: Option<ListOptions>) -> (usize, Result<()>) {
        let resolved = options::resolve_list(&self.cancel, prefix, options);
        let mut objects = self.listing(&resolved);

        let mut count = 0;
        while let Some(item) = objects.next().await {
            match item {
                Ok(_) => count += 1,
                Err(e) => {
                    tracing::warn!(prefix, error = %e, "listing stopped early");
                    return (count, Err(e));
                }
            }
        }
        (count, Ok(()))
    }

    /// Stream keys under `prefix` in backend order
    ///
    /// A background task feeds the channel and closes it once the listing is exhausted,
    /// the cap is reached, the call is canceled or the receiver is dropped.
    pub fn list(&self, prefix: &str, options: Option<ListOptions>) -> mpsc::Receiver<String> {
        self.try_list(prefix, options).into_receiver()
    }

    /// Like [`Store::list`]; a listing error is reported by [`Listing::finish`]
    pub fn try_list(&self, prefix: &str, options: Option<ListOptions>) -> Listing<String> {
        let resolved = options::resolve_list(&self.cancel, prefix, options);
        let mut objects = self.listing(&resolved);
        let (tx, rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);

        let prefix = prefix.to_string();
        let task = tokio::spawn(async move {
            while let Some(item) = objects.next().await {
                let info = item.inspect_err(|e| {
                    tracing::warn!(prefix = %prefix, error = %e, "listing stopped early");
                })?;
                if tx.send(info.key).await.is_err() {
                    break;
                }
            }
            Ok::<_, Error>(())
        });

        Listing { items: rx, task }
    }

    /// Collect [`Store::list`] into a vector
    pub async fn list_ar(&self, prefix: &str, options: Option<ListOptions>) -> Vec<String> {
        let mut keys = self.list(prefix, options);
        let mut out = Vec::new();
        while let Some(key) = keys.recv().await {
            out.push(key);
        }
        out
    }

    /// Stream key/value records under `prefix`
    ///
    /// Values are fetched concurrently, so records arrive in completion order. Keys whose
    /// fetch fails are logged and skipped. Once cancellation is observed no further fetches
    /// are started; fetches already running see the same token. The channel closes after
    /// every started fetch has finished.
    pub fn list_body(&self, prefix: &str, options: Option<ListOptions>) -> mpsc::Receiver<Record> {
        self.try_list_body(prefix, options).into_receiver()
    }

    /// Like [`Store::list_body`]; a listing error is reported by [`Listing::finish`]
    ///
    /// Failed fetches of single values are still skipped, only the listing itself can fail.
    pub fn try_list_body(&self, prefix: &str, options: Option<ListOptions>) -> Listing<Record> {
        let resolved = options::resolve_list(&self.cancel, prefix, options);
        let mut objects = self.listing(&resolved);
        let (tx, rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);

        let store = self.clone();
        let limiter = self
            .list_body_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit)));
        let cancel = resolved.cancel;

        let task = tokio::spawn(async move {
            let mut fetches = JoinSet::new();
            let mut outcome: Result<()> = Ok(());

            while let Some(item) = objects.next().await {
                let key = match item {
                    Ok(info) => info.key,
                    Err(e) => {
                        tracing::warn!(error = %e, "listing stopped early");
                        outcome = Err(e);
                        break;
                    }
                };

                let permit = match &limiter {
                    Some(limiter) => match limiter.clone().acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                    None => None,
                };
                if cancel.is_cancelled() {
                    tracing::debug!("list body canceled, not starting further fetches");
                    break;
                }

                let store = store.clone();
                let tx = tx.clone();
                let get_options = GetOptions::new().with_cancellation(cancel.clone());
                fetches.spawn(async move {
                    let _permit = permit;
                    match store.get(&key, Some(get_options)).await {
                        Ok(value) => {
                            let _ = tx.send(Record { key, value }).await;
                        }
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "skipping record, fetch failed");
                        }
                    }
                });
            }

            while fetches.join_next().await.is_some() {}
            drop(tx);
            outcome
        });

        Listing { items: rx, task }
    }

    /// Collect [`Store::list_body`] into a vector (completion order, not key order)
    pub async fn list_body_ar(&self, prefix: &str, options: Option<ListOptions>) -> Vec<Record> {
        let mut records = self.list_body(prefix, options);
        let mut out = Vec::new();
        while let Some(record) = records.recv().await {
            out.push(record);
        }
        out
    }

    /// Server-side copy; fails with `AlreadyExists` when `destination` is present
    pub async fn copy(
        &self,
        source: &str,
        destination: &str,
        options: Option<CopyOptions>,
    ) -> Result<()> {
        let resolved = options::resolve(&self.cancel, options);

        let existing = cancellable(
            &resolved.cancel,
            self.client
                .stat_object(&self.bucket, destination, &Default::default()),
        )
        .await;
        match existing {
            Ok(_) => return Err(Error::AlreadyExists(destination.to_string())),
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        tracing::debug!(bucket = %self.bucket, source, destination, "copy object");
        cancellable(
            &resolved.cancel,
            self.client
                .copy_object(&self.bucket, source, destination, &resolved.object),
        )
        .await
    }

    /// Copy then delete the source
    ///
    /// Not atomic: if deleting the source fails the error is returned and the new copy stays.
    pub async fn move_object(
        &self,
        source: &str,
        destination: &str,
        options: Option<CopyOptions>,
    ) -> Result<()> {
        let resolved = options::resolve(&self.cancel, options);
        let cancel = resolved.cancel.clone();

        self.copy(
            source,
            destination,
            Some(CopyOptions {
                cancel: Some(cancel.clone()),
                object: resolved.object,
            }),
        )
        .await?;

        self.del(source, Some(DelOptions::new().with_cancellation(cancel)))
            .await
    }
}

/// Run `fut` unless `token` fires first
async fn cancellable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    if token.is_cancelled() {
        return Err(Error::Canceled);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Canceled),
        res = fut => res,
    }
}
