use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// Default number of bytes requested per transport pull: 8 KiB.
pub const DEFAULT_PULL_SIZE: usize = 8 * 1024;

/// A producer of response body chunks.
///
/// Chunk sizes are whatever the underlying transport delivers; [`Body`]
/// re-slices them to honour the caller's pull size. Dropping the source
/// cancels the underlying read and releases the connection.
#[async_trait]
pub trait ChunkSource: Send {
    /// Next chunk of body bytes, or `None` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// An incremental response body.
///
/// Supports repeated "give me up to N more bytes" pulls until end of stream.
pub struct Body {
    source: Option<Box<dyn ChunkSource>>,
    pending: Bytes,
}

impl Body {
    /// Wrap a chunk source.
    pub fn new(source: impl ChunkSource + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            pending: Bytes::new(),
        }
    }

    /// A body that is already at end of stream.
    pub fn empty() -> Self {
        Self {
            source: None,
            pending: Bytes::new(),
        }
    }

    /// A body holding a single buffer.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::from_chunks([bytes.into()])
    }

    /// A body delivering the given chunks in order, one per transport read.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        Self::new(ChunkList(chunks.into_iter().map(Into::into).collect()))
    }

    /// A body read incrementally from any async reader (e.g. an upgraded connection half).
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self::new(ReaderSource {
            reader,
            chunk_size: DEFAULT_PULL_SIZE,
        })
    }

    /// Pull up to `max` more bytes; `None` at end of stream.
    pub async fn pull(&mut self, max: usize) -> Result<Option<Bytes>> {
        if self.pending.is_empty() {
            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };
            loop {
                match source.next_chunk().await? {
                    Some(chunk) if chunk.is_empty() => continue,
                    Some(chunk) => {
                        self.pending = chunk;
                        break;
                    }
                    None => {
                        // Release the source (and its connection) as soon as it is drained.
                        self.source = None;
                        return Ok(None);
                    }
                }
            }
        }

        let take = max.max(1).min(self.pending.len());
        Ok(Some(self.pending.split_to(take)))
    }

    /// Buffer the entire remaining body.
    pub async fn collect(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.pull(DEFAULT_PULL_SIZE).await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Buffer at most `limit` bytes of the body, discarding the rest.
    pub async fn collect_limited(mut self, limit: usize) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while buf.len() < limit {
            let Some(chunk) = self.pull(limit - buf.len()).await? else {
                break;
            };
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("open", &self.source.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

struct ChunkList(VecDeque<Bytes>);

#[async_trait]
impl ChunkSource for ChunkList {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.0.pop_front())
    }
}

struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
}

#[async_trait]
impl<R> ChunkSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let read = self.reader.read_buf(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }
}
