//! Streaming request bodies
//!
//! PutObject needs a body with a known length. [`streaming_body`] turns any [`ByteReader`]
//! into a `ByteStream` backed by a channel: a pump task reads fixed-size chunks and the
//! SDK pulls them as frames, so uploads never buffer the whole object.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use futures::StreamExt;
use http_body::{Body, Frame, SizeHint};
use s3kv_core::ByteReader;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;

/// Bytes read from the source per frame
const CHUNK_SIZE: usize = 64 * 1024;

/// Frames buffered between the pump and the SDK
const BODY_CHANNEL_CAPACITY: usize = 4;

/// HTTP body fed by a channel, with an exact length
pub(crate) struct ChannelBody {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    size: u64,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|chunk| chunk.map(Frame::data)))
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.size)
    }
}

/// Body streaming exactly `size` bytes from `reader`
///
/// The returned handle is the pump task; abort it if the request finishes early.
/// A reader that ends before `size` bytes yields an `UnexpectedEof` frame error.
pub(crate) fn streaming_body(reader: ByteReader, size: u64) -> (ByteStream, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);

    let pump = tokio::spawn(async move {
        let mut chunks = ReaderStream::with_capacity(reader.take(size), CHUNK_SIZE);
        let mut sent = 0u64;

        while let Some(chunk) = chunks.next().await {
            let failed = chunk.is_err();
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
            }
            if tx.send(chunk).await.is_err() || failed {
                return;
            }
        }

        if sent < size {
            let err = io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("body ended after {sent} of {size} bytes"),
            );
            let _ = tx.send(Err(err)).await;
        }
    });

    let body = ChannelBody { rx, size };
    (ByteStream::from_body_1_x(body), pump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::poll_fn;

    async fn drain(body: &mut ChannelBody) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(frame) = poll_fn(|cx| Pin::new(&mut *body).poll_frame(cx)).await {
            if let Ok(data) = frame?.into_data() {
                out.extend_from_slice(&data);
            }
        }
        Ok(out)
    }

    fn channel_body(reader: ByteReader, size: u64) -> ChannelBody {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut chunks = ReaderStream::with_capacity(reader.take(size), 4);
            while let Some(chunk) = chunks.next().await {
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });
        ChannelBody { rx, size }
    }

    #[tokio::test]
    async fn test_channel_body_frames() {
        let mut body = channel_body(Box::pin(&b"0123456789"[..]), 10);
        assert_eq!(body.size_hint().exact(), Some(10));
        assert_eq!(drain(&mut body).await.unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_channel_body_stops_at_size() {
        let mut body = channel_body(Box::pin(&b"0123456789"[..]), 3);
        assert_eq!(drain(&mut body).await.unwrap(), b"012");
    }

    #[tokio::test]
    async fn test_streaming_body_collects() {
        let (stream, pump) = streaming_body(Box::pin(&b"payload"[..]), 7);
        let data = stream.collect().await.unwrap().into_bytes();
        assert_eq!(&data[..], b"payload");
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn test_streaming_body_short_reader_fails() {
        let (stream, _pump) = streaming_body(Box::pin(&b"abc"[..]), 10);
        assert!(stream.collect().await.is_err());
    }
}
