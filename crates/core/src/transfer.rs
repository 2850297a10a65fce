//! Streaming copy between local files and Store keys
//!
//! `transfer(["hello.txt", "s3:notes/a"], connect)` opens the source, captures its size and
//! streams it into the target without holding the payload in memory. The Store connection
//! is made at most once, the first time an `s3:` endpoint needs it.
//!
//! Any failure aborts the whole transfer. A partially written target is left as is.

use std::future::Future;
use std::io;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::options::SetOptions;
use crate::path::{TransferEndpoint, parse_endpoint};
use crate::store::Store;
use crate::traits::ByteReader;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Store connection made on first use and reused afterwards
pub struct LazyStore<F> {
    connect: F,
    cell: OnceCell<Store>,
}

impl<F, Fut> LazyStore<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Store>>,
{
    pub fn new(connect: F) -> Self {
        Self {
            connect,
            cell: OnceCell::new(),
        }
    }

    /// Get the Store, connecting if this is the first call
    pub async fn get(&self) -> Result<&Store> {
        self.cell
            .get_or_try_init(|| async {
                let store = (self.connect)().await?;
                tracing::info!(bucket = store.bucket(), "connected to object storage");
                Ok(store)
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}

/// Copy `args[0]` to `args[1]`, returning the number of bytes transferred
///
/// Arguments starting with `s3:` are Store keys, others are local paths.
/// Arguments after the first two are ignored.
pub async fn transfer<S, F, Fut>(args: &[S], connect: F) -> Result<u64>
where
    S: AsRef<str>,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Store>>,
{
    let [source, target, ..] = args else {
        return Err(Error::InvalidArgument(
            "transfer needs a source and a target".into(),
        ));
    };

    let store = LazyStore::new(connect);
    run(source.as_ref(), target.as_ref(), &store)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "transfer failed"))
}

async fn run<F, Fut>(source: &str, target: &str, store: &LazyStore<F>) -> Result<u64>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Store>>,
{
    let source = parse_endpoint(source)?;
    let target = parse_endpoint(target)?;

    let (reader, size) = open_source(&source, store).await?;
    tracing::info!(source = %source, size, "got data from");

    let written = write_target(&source, &target, reader, size, store).await?;
    tracing::info!(target = %target, bytes = written, "set data to");

    Ok(written)
}

async fn open_source<F, Fut>(
    source: &TransferEndpoint,
    store: &LazyStore<F>,
) -> Result<(ByteReader, u64)>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Store>>,
{
    match source {
        TransferEndpoint::Remote(key) => {
            let object = store.get().await?.get_object(key, None).await?;
            let size = object.size();
            Ok((Box::pin(object), size))
        }
        TransferEndpoint::Local(path) => {
            let file = File::open(path)
                .await
                .map_err(|e| Error::local_io(path, e))?;
            let size = file
                .metadata()
                .await
                .map_err(|e| Error::local_io(path, e))?
                .len();
            Ok((Box::pin(BufReader::new(file)), size))
        }
    }
}

async fn write_target<F, Fut>(
    source: &TransferEndpoint,
    target: &TransferEndpoint,
    reader: ByteReader,
    size: u64,
    store: &LazyStore<F>,
) -> Result<u64>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Store>>,
{
    match target {
        TransferEndpoint::Remote(key) => {
            let mut options = SetOptions::new();
            if let Some(mime) = mime_guess::from_path(key).first() {
                options = options.content_type(mime.essence_str());
            }
            store
                .get()
                .await?
                .set_object(key, reader, size, Some(options))
                .await?;
            Ok(size)
        }
        TransferEndpoint::Local(path) => write_file(path, reader, source).await,
    }
}

async fn write_file(path: &Path, mut reader: ByteReader, source: &TransferEndpoint) -> Result<u64> {
    let file = File::create(path)
        .await
        .map_err(|e| Error::local_io(path, e))?;
    let mut writer = BufWriter::new(file);

    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| read_error(source, e))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .await
            .map_err(|e| Error::local_io(path, e))?;
        written += n as u64;
    }
    writer.flush().await.map_err(|e| Error::local_io(path, e))?;

    Ok(written)
}

/// A failed read belongs to the source: the backend for keys, the file for local paths
fn read_error(source: &TransferEndpoint, err: io::Error) -> Error {
    match source {
        TransferEndpoint::Remote(key) => Error::Backend(format!("read {key}: {err}")),
        TransferEndpoint::Local(path) => Error::local_io(path, err),
    }
}
