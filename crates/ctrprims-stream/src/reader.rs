use std::time::Duration;

use bytes::{Bytes, BytesMut};
use ctrprims_transport::{Body, DEFAULT_PULL_SIZE};
use tokio::time::Instant;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::codec::{MuxCodec, MuxFrame, SegmentCodec, DEFAULT_MAX_LINE, DEFAULT_MAX_PAYLOAD};
use crate::error::{Result, StreamError};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Default number of decoded items buffered between producer and consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Limits and sizing for stream decoding.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum multiplexed frame payload in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Maximum NDJSON line length in bytes. Default: 8 MiB.
    pub max_line_length: usize,
    /// Bytes requested per transport pull. Default: 8 KiB.
    pub pull_size: usize,
    /// Items buffered between the decoding task and the consumer. Default: 8.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_line_length: DEFAULT_MAX_LINE,
            pull_size: DEFAULT_PULL_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Reads complete units from an incremental response body.
///
/// Handles partial reads internally: callers always get whole segments or
/// whole frames. More bytes are pulled from the body only when the backlog
/// cannot satisfy the current request.
pub struct StreamReader {
    body: Body,
    buf: BytesMut,
    config: StreamConfig,
    segments: SegmentCodec,
    frames: MuxCodec,
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
    eof: bool,
}

impl StreamReader {
    /// Create a reader with default configuration.
    pub fn new(body: Body) -> Self {
        Self::with_config(body, StreamConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(body: Body, config: StreamConfig) -> Self {
        Self {
            body,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            segments: SegmentCodec::new(b'\n', config.max_line_length),
            frames: MuxCodec::new(config.max_payload_size),
            config,
            cancel: CancellationToken::new(),
            deadline: None,
            eof: false,
        }
    }

    /// Abort in-flight and future pulls when `token` is cancelled.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fail pulls with [`StreamError::Timeout`] once `deadline` passes.
    ///
    /// `budget` is the total duration reported in the error.
    pub fn with_deadline(mut self, deadline: Instant, budget: Duration) -> Self {
        self.deadline = Some((deadline, budget));
        self
    }

    /// Like [`StreamReader::with_deadline`], starting the clock now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout, timeout)
    }

    /// Token that aborts this reader's pulls.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current reader configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Bytes received but not yet returned.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next segment bounded by `terminator` (terminator stripped).
    ///
    /// At end of stream an unterminated remainder is returned as a final
    /// segment, then `Ok(None)`.
    pub async fn next_segment(&mut self, terminator: u8) -> Result<Option<Bytes>> {
        if self.segments.terminator() != terminator {
            self.segments = SegmentCodec::new(terminator, self.config.max_line_length);
        }
        loop {
            if let Some(segment) = self.segments.decode(&mut self.buf)? {
                return Ok(Some(segment));
            }
            if self.eof {
                return self.segments.decode_eof(&mut self.buf);
            }
            self.fill().await?;
        }
    }

    /// Next multiplexed frame.
    ///
    /// Returns `Err(StreamError::Truncated)` if the body ends inside a frame.
    pub async fn next_frame(&mut self) -> Result<Option<MuxFrame>> {
        loop {
            if let Some(frame) = self.frames.decode(&mut self.buf)? {
                trace!(tag = frame.tag, len = frame.payload.len(), "decoded frame");
                return Ok(Some(frame));
            }
            if self.eof {
                return self.frames.decode_eof(&mut self.buf);
            }
            self.fill().await?;
        }
    }

    /// Next chunk of bytes exactly as received, with no framing applied.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if !self.buf.is_empty() {
            return Ok(Some(self.buf.split().freeze()));
        }
        if self.eof {
            return Ok(None);
        }
        match self.pull().await? {
            Some(chunk) => Ok(Some(chunk)),
            None => {
                self.eof = true;
                Ok(None)
            }
        }
    }

    async fn fill(&mut self) -> Result<()> {
        match self.pull().await? {
            Some(chunk) => self.buf.extend_from_slice(&chunk),
            None => self.eof = true,
        }
        Ok(())
    }

    async fn pull(&mut self) -> Result<Option<Bytes>> {
        let max = self.config.pull_size;
        let pull = self.body.pull(max);
        match self.deadline {
            Some((deadline, budget)) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(StreamError::Cancelled),
                res = tokio::time::timeout_at(deadline, pull) => match res {
                    Ok(chunk) => Ok(chunk?),
                    Err(_) => Err(StreamError::Timeout(budget)),
                },
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(StreamError::Cancelled),
                res = pull => Ok(res?),
            },
        }
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("buffered", &self.buf.len())
            .field("eof", &self.eof)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ctrprims_transport::ChunkSource;

    use super::*;
    use crate::codec::encode_frame;

    #[tokio::test]
    async fn read_segments_from_single_chunk() {
        let mut reader = StreamReader::new(Body::from_bytes(&b"one\ntwo\nthree\n"[..]));

        assert_eq!(reader.next_segment(b'\n').await.unwrap().unwrap().as_ref(), b"one");
        assert_eq!(reader.next_segment(b'\n').await.unwrap().unwrap().as_ref(), b"two");
        assert_eq!(reader.next_segment(b'\n').await.unwrap().unwrap().as_ref(), b"three");
        assert!(reader.next_segment(b'\n').await.unwrap().is_none());
    }

    #[tokio::test]
    async fn segment_spans_many_chunks() {
        let mut reader = StreamReader::new(Body::from_chunks([
            &b"{\"sta"[..],
            b"tus\":",
            b"\"ok\"}",
            b"\n",
        ]));

        assert_eq!(
            reader.next_segment(b'\n').await.unwrap().unwrap().as_ref(),
            b"{\"status\":\"ok\"}"
        );
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn unterminated_tail_is_flushed_once() {
        let mut reader = StreamReader::new(Body::from_chunks([&b"a\nb"[..]]));

        assert_eq!(reader.next_segment(b'\n').await.unwrap().unwrap().as_ref(), b"a");
        assert_eq!(reader.next_segment(b'\n').await.unwrap().unwrap().as_ref(), b"b");
        assert!(reader.next_segment(b'\n').await.unwrap().is_none());
        assert!(reader.next_segment(b'\n').await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_frame_byte_by_byte() {
        let mut wire = BytesMut::new();
        encode_frame(1, b"slow", &mut wire).unwrap();
        let chunks: Vec<Bytes> = wire.iter().map(|b| Bytes::copy_from_slice(&[*b])).collect();

        let mut reader = StreamReader::new(Body::from_chunks(chunks));
        let frame = reader.next_frame().await.unwrap().unwrap();

        assert_eq!(frame.tag, 1);
        assert_eq!(frame.payload.as_ref(), b"slow");
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_header_at_end_of_stream() {
        let mut reader = StreamReader::new(Body::from_bytes(&[1u8, 0, 0, 0][..]));
        let err = reader.next_frame().await.unwrap_err();
        assert!(matches!(err, StreamError::Truncated { unit: "header", .. }));
    }

    #[tokio::test]
    async fn truncated_payload_at_end_of_stream() {
        let mut wire = BytesMut::new();
        encode_frame(2, b"incomplete", &mut wire).unwrap();
        wire.truncate(wire.len() - 1);

        let mut reader = StreamReader::new(Body::from_bytes(wire.freeze()));
        let err = reader.next_frame().await.unwrap_err();
        assert!(matches!(err, StreamError::Truncated { unit: "payload", .. }));
    }

    #[tokio::test]
    async fn oversized_frame_in_stream() {
        let mut wire = BytesMut::new();
        encode_frame(1, &[0u8; 64], &mut wire).unwrap();

        let config = StreamConfig {
            max_payload_size: 16,
            ..StreamConfig::default()
        };
        let mut reader = StreamReader::with_config(Body::from_bytes(wire.freeze()), config);
        let err = reader.next_frame().await.unwrap_err();
        assert!(matches!(err, StreamError::PayloadTooLarge { size: 64, max: 16 }));
    }

    #[tokio::test]
    async fn next_chunk_passes_bytes_through() {
        let mut reader = StreamReader::new(Body::from_chunks([&b"\x01\x00raw"[..], b"tty"]));

        assert_eq!(reader.next_chunk().await.unwrap().unwrap().as_ref(), b"\x01\x00raw");
        assert_eq!(reader.next_chunk().await.unwrap().unwrap().as_ref(), b"tty");
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pull_size_bounds_each_read() {
        let config = StreamConfig {
            pull_size: 3,
            ..StreamConfig::default()
        };
        let mut reader = StreamReader::with_config(Body::from_bytes(&b"abcdefg"[..]), config);

        assert_eq!(reader.next_chunk().await.unwrap().unwrap().as_ref(), b"abc");
        assert_eq!(reader.next_chunk().await.unwrap().unwrap().as_ref(), b"def");
        assert_eq!(reader.next_chunk().await.unwrap().unwrap().as_ref(), b"g");
    }

    struct Stalled;

    #[async_trait]
    impl ChunkSource for Stalled {
        async fn next_chunk(&mut self) -> ctrprims_transport::Result<Option<Bytes>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_pull() {
        let token = CancellationToken::new();
        let mut reader = StreamReader::new(Body::new(Stalled)).with_cancel(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = reader.next_segment(b'\n').await.unwrap_err();
        assert!(matches!(err, StreamError::Cancelled));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn deadline_surfaces_timeout() {
        let budget = Duration::from_millis(30);
        let mut reader = StreamReader::new(Body::new(Stalled)).with_timeout(budget);

        let err = reader.next_frame().await.unwrap_err();
        assert!(matches!(err, StreamError::Timeout(d) if d == budget));
    }
}
