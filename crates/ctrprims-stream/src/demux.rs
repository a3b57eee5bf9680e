use std::fmt;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::channel::StreamChannel;
use crate::error::Result;
use crate::reader::StreamReader;
use crate::sequence::OutputStream;

/// Output format of a container's stdout/stderr stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Framed with 8-byte headers (container has no TTY).
    Multiplexed,
    /// Unframed bytes (container has a TTY).
    Raw,
}

impl StreamMode {
    /// Mode implied by a container's `Tty` setting.
    pub fn from_tty(tty: bool) -> Self {
        if tty {
            Self::Raw
        } else {
            Self::Multiplexed
        }
    }
}

/// One delivery of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    StdOut(Bytes),
    StdErr(Bytes),
    /// Raw TTY output, not attributed to a channel.
    Console(Bytes),
}

impl LogOutput {
    /// The payload bytes.
    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::StdOut(b) | Self::StdErr(b) | Self::Console(b) => b,
        }
    }

    /// Consume into the payload bytes.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::StdOut(b) | Self::StdErr(b) | Self::Console(b) => b,
        }
    }

    /// The originating channel; `None` for raw console output.
    pub fn channel(&self) -> Option<StreamChannel> {
        match self {
            Self::StdOut(_) => Some(StreamChannel::Stdout),
            Self::StdErr(_) => Some(StreamChannel::Stderr),
            Self::Console(_) => None,
        }
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.bytes()))
    }
}

/// Splits container output into stdout and stderr deliveries.
///
/// In [`StreamMode::Raw`] no header parsing happens; every chunk is passed
/// through as [`LogOutput::Console`].
pub struct Demuxer {
    reader: StreamReader,
    mode: StreamMode,
    done: bool,
}

impl Demuxer {
    /// Create a demultiplexer over `reader`.
    pub fn new(reader: StreamReader, mode: StreamMode) -> Self {
        Self {
            reader,
            mode,
            done: false,
        }
    }

    /// The mode this demultiplexer runs in.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// The next delivery, or `None` at end of stream or after an error.
    pub async fn next(&mut self) -> Option<Result<LogOutput>> {
        if self.done {
            return None;
        }
        let item = match self.mode {
            StreamMode::Raw => self.next_raw().await,
            StreamMode::Multiplexed => self.next_framed().await,
        };
        match item {
            Ok(Some(output)) => Some(Ok(output)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    async fn next_raw(&mut self) -> Result<Option<LogOutput>> {
        Ok(self.reader.next_chunk().await?.map(LogOutput::Console))
    }

    async fn next_framed(&mut self) -> Result<Option<LogOutput>> {
        loop {
            let Some(frame) = self.reader.next_frame().await? else {
                return Ok(None);
            };
            match frame.channel() {
                Some(StreamChannel::Stdout) => return Ok(Some(LogOutput::StdOut(frame.payload))),
                Some(StreamChannel::Stderr) => return Ok(Some(LogOutput::StdErr(frame.payload))),
                Some(StreamChannel::Stdin) => {
                    trace!(len = frame.payload.len(), "dropping stdin frame");
                }
                None => {
                    warn!(tag = frame.tag, len = frame.payload.len(), "dropping frame with unknown stream type");
                }
            }
        }
    }

    /// Copy all output into two sinks until end of stream.
    ///
    /// Console output goes to `stdout`. Returns the number of bytes written.
    pub async fn copy_to<O, E>(mut self, stdout: &mut O, stderr: &mut E) -> Result<u64>
    where
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(item) = self.next().await {
            match item? {
                LogOutput::StdErr(bytes) => {
                    stderr.write_all(&bytes).await?;
                    stderr.flush().await?;
                    written += bytes.len() as u64;
                }
                LogOutput::StdOut(bytes) | LogOutput::Console(bytes) => {
                    stdout.write_all(&bytes).await?;
                    stdout.flush().await?;
                    written += bytes.len() as u64;
                }
            }
        }
        Ok(written)
    }

    /// Move demultiplexing onto a producer task feeding a bounded queue.
    pub fn into_stream(mut self, capacity: usize) -> OutputStream {
        let (tx, stream) = OutputStream::channel(capacity, self.reader.cancel_token());
        tokio::spawn(async move {
            while let Some(item) = self.next().await {
                if tx.send(item).await.is_err() {
                    debug!("output consumer dropped; stopping");
                    break;
                }
            }
        });
        stream
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use ctrprims_transport::Body;

    use super::*;
    use crate::codec::encode_frame;
    use crate::error::StreamError;

    fn wire(frames: &[(u8, &[u8])]) -> Bytes {
        let mut buf = BytesMut::new();
        for (tag, payload) in frames {
            encode_frame(*tag, payload, &mut buf).unwrap();
        }
        buf.freeze()
    }

    fn chunked(bytes: &Bytes, size: usize) -> Body {
        Body::from_chunks(bytes.chunks(size).map(Bytes::copy_from_slice).collect::<Vec<_>>())
    }

    async fn drain(mut demux: Demuxer) -> Vec<LogOutput> {
        let mut out = Vec::new();
        while let Some(item) = demux.next().await {
            out.push(item.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn routes_frames_by_channel() {
        let bytes = wire(&[(1, b"out-1"), (2, b"err-1"), (1, b"out-2")]);
        let demux = Demuxer::new(StreamReader::new(Body::from_bytes(bytes)), StreamMode::Multiplexed);

        assert_eq!(
            drain(demux).await,
            vec![
                LogOutput::StdOut(Bytes::from_static(b"out-1")),
                LogOutput::StdErr(Bytes::from_static(b"err-1")),
                LogOutput::StdOut(Bytes::from_static(b"out-2")),
            ]
        );
    }

    #[tokio::test]
    async fn output_independent_of_chunk_boundaries() {
        let bytes = wire(&[
            (1, b"hello "),
            (2, b"warning: something"),
            (0, b"echoed stdin"),
            (1, b""),
            (1, &[0xAB; 300]),
            (2, b"x"),
        ]);

        let whole = drain(Demuxer::new(
            StreamReader::new(Body::from_bytes(bytes.clone())),
            StreamMode::Multiplexed,
        ))
        .await;
        assert_eq!(whole.len(), 5);

        for size in 1..=17 {
            let pieces = drain(Demuxer::new(
                StreamReader::new(chunked(&bytes, size)),
                StreamMode::Multiplexed,
            ))
            .await;
            assert_eq!(pieces, whole, "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn one_frame_per_header_under_fragmentation() {
        let payload = vec![b'z'; 1000];
        let bytes = wire(&[(1, &payload), (1, &payload)]);

        for size in [3, 7, 8, 9, 999, 1008, 1009] {
            let out = drain(Demuxer::new(
                StreamReader::new(chunked(&bytes, size)),
                StreamMode::Multiplexed,
            ))
            .await;
            assert_eq!(out.len(), 2, "chunk size {size}");
            assert!(out.iter().all(|o| o.bytes().len() == 1000));
        }
    }

    #[tokio::test]
    async fn unknown_stream_type_is_dropped() {
        let bytes = wire(&[(3, b"system error"), (1, b"kept")]);
        let out = drain(Demuxer::new(
            StreamReader::new(Body::from_bytes(bytes)),
            StreamMode::Multiplexed,
        ))
        .await;
        assert_eq!(out, vec![LogOutput::StdOut(Bytes::from_static(b"kept"))]);
    }

    #[tokio::test]
    async fn truncated_header_is_reported() {
        let mut bytes = BytesMut::from(wire(&[(1, b"complete")]).as_ref());
        bytes.extend_from_slice(&[2, 0, 0]);

        let mut demux = Demuxer::new(
            StreamReader::new(Body::from_bytes(bytes.freeze())),
            StreamMode::Multiplexed,
        );
        assert_eq!(
            demux.next().await.unwrap().unwrap(),
            LogOutput::StdOut(Bytes::from_static(b"complete"))
        );
        let err = demux.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::Truncated { unit: "header", pending: 3 }));
        assert!(demux.next().await.is_none());
    }

    #[tokio::test]
    async fn raw_mode_passes_bytes_unmodified() {
        // Looks like a frame header, but must not be parsed as one.
        let raw: &[u8] = &[1, 0, 0, 0, 0, 0, 0, 2, b'h', b'i', b'\r', b'\n', 0xFF];
        let body = Body::from_chunks([&raw[..5], &raw[5..]]);
        let out = drain(Demuxer::new(StreamReader::new(body), StreamMode::Raw)).await;

        let joined: Vec<u8> = out
            .iter()
            .inspect(|o| assert!(o.channel().is_none()))
            .flat_map(|o| o.bytes().to_vec())
            .collect();
        assert_eq!(joined, raw);
    }

    #[tokio::test]
    async fn copy_to_splits_sinks() {
        let bytes = wire(&[(1, b"a"), (2, b"bb"), (1, b"c")]);
        let demux = Demuxer::new(StreamReader::new(Body::from_bytes(bytes)), StreamMode::Multiplexed);

        let mut out = Vec::new();
        let mut err = Vec::new();
        let written = demux.copy_to(&mut out, &mut err).await.unwrap();

        assert_eq!(written, 4);
        assert_eq!(out, b"ac");
        assert_eq!(err, b"bb");
    }

    #[tokio::test]
    async fn into_stream_delivers_in_order() {
        let bytes = wire(&[(2, b"first"), (1, b"second")]);
        let mut stream = Demuxer::new(
            StreamReader::new(chunked(&bytes, 4)),
            StreamMode::Multiplexed,
        )
        .into_stream(1);

        assert_eq!(stream.next().await.unwrap().unwrap().to_string(), "first");
        assert_eq!(
            stream.next().await.unwrap().unwrap().channel(),
            Some(StreamChannel::Stdout)
        );
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn mode_from_tty() {
        assert_eq!(StreamMode::from_tty(true), StreamMode::Raw);
        assert_eq!(StreamMode::from_tty(false), StreamMode::Multiplexed);
    }
}
