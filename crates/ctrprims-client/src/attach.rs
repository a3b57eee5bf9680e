use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ctrprims_stream::{
    Demuxer, LogOutput, OutputStream, StreamConfig, StreamError, StreamMode, StreamReader,
};
use ctrprims_transport::{Body, Duplex, TransportError, Upgraded};
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Lifecycle of an attach session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The upgrade request is in flight. Sessions are handed out once it
    /// completes, so a live session never reports this state.
    Connecting,
    /// Input and output are both usable.
    Open,
    /// Close requested or the engine closed its side; input is rejected.
    Closing,
    /// The connection has been released.
    Closed,
}

struct Shared {
    state: Mutex<SessionState>,
    writer: tokio::sync::Mutex<Option<WriteHalf<Box<dyn Duplex>>>>,
    cancel: CancellationToken,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `Closing` unless already closed. Returns false once `Closed`.
    fn begin_close(&self) -> bool {
        let mut state = self.state();
        if *state == SessionState::Closed {
            return false;
        }
        *state = SessionState::Closing;
        true
    }

    /// Stop the output reader, shut down the write half and mark the
    /// session `Closed`. Pending writes are aborted before the writer lock
    /// is taken.
    async fn release(&self) {
        if !self.begin_close() {
            return;
        }
        self.cancel.cancel();

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(err) = writer.shutdown().await {
                debug!(%err, "attach input shutdown failed");
            }
            debug!("attach connection released");
        }
        *self.state() = SessionState::Closed;
    }
}

/// Write side of an attach session. Cheap to clone.
#[derive(Clone)]
pub struct AttachInput {
    shared: Arc<Shared>,
}

impl AttachInput {
    /// Forward bytes verbatim to the container's stdin.
    ///
    /// Fails with [`ClientError::SessionClosed`] once the session is closing.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        if *self.shared.state() != SessionState::Open {
            return Err(ClientError::SessionClosed);
        }
        let shared = &self.shared;
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => Err(ClientError::SessionClosed),
            result = async {
                let mut guard = shared.writer.lock().await;
                let writer = guard.as_mut().ok_or(ClientError::SessionClosed)?;
                writer.write_all(data).await.map_err(TransportError::Io)?;
                writer.flush().await.map_err(TransportError::Io)?;
                Ok::<_, ClientError>(())
            } => result,
        }
    }

    /// Close the session. Safe to call more than once.
    ///
    /// Aborts any write in flight, stops the output reader, shuts down the
    /// write direction and releases the connection. Output already queued
    /// can still be drained.
    pub async fn close(&self) -> Result<()> {
        self.shared.release().await;
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state()
    }
}

impl std::fmt::Debug for AttachInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachInput")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// A bidirectional session over an upgraded engine connection.
///
/// The connection is split into independently owned halves: a producer
/// task owns the read half and demultiplexes output, while the write half
/// sits behind an async mutex. Input and output can be used concurrently.
pub struct AttachSession {
    input: AttachInput,
    output: OutputStream,
    mode: StreamMode,
}

impl AttachSession {
    /// Take ownership of an upgraded connection.
    pub fn open(upgraded: Upgraded, mode: StreamMode, config: &StreamConfig) -> Self {
        let (read, write) = tokio::io::split(upgraded.io);
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::Open),
            writer: tokio::sync::Mutex::new(Some(write)),
            cancel: CancellationToken::new(),
        });

        // Dropping the output only stops the reader; input stays usable.
        let output_cancel = shared.cancel.child_token();
        let reader = StreamReader::with_config(Body::from_reader(read), config.clone())
            .with_cancel(output_cancel.clone());
        let mut demux = Demuxer::new(reader, mode);
        let (tx, output) = OutputStream::channel(config.channel_capacity, output_cancel);

        let remote = Arc::clone(&shared);
        tokio::spawn(async move {
            loop {
                let Some(item) = demux.next().await else {
                    if *remote.state() == SessionState::Open {
                        debug!("engine closed attach stream");
                    }
                    remote.release().await;
                    break;
                };
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        debug!(?mode, "attach session open");
        Self {
            input: AttachInput { shared },
            output,
            mode,
        }
    }

    /// Forward bytes to the container's stdin.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        self.input.write(data).await
    }

    /// Next output delivery; `None` once the stream has ended.
    pub async fn next_output(&mut self) -> Option<std::result::Result<LogOutput, StreamError>> {
        self.output.next().await
    }

    /// Close the session. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        self.input.close().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.input.state()
    }

    /// The output format in use.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// A handle for writing from another task.
    pub fn input(&self) -> AttachInput {
        self.input.clone()
    }

    /// Separate the write handle from the output sequence.
    pub fn split(self) -> (AttachInput, OutputStream) {
        (self.input, self.output)
    }
}

impl std::fmt::Debug for AttachSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachSession")
            .field("state", &self.state())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::{Bytes, BytesMut};
    use ctrprims_stream::encode_frame;
    use ctrprims_transport::{HttpRequest, MemoryTransport, Transport, UpgradeOutcome};
    use http::{HeaderMap, Method};
    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;

    async fn session(mode: StreamMode) -> (AttachSession, DuplexStream) {
        let transport = MemoryTransport::new();
        let engine = transport.push_upgrade(HeaderMap::new());
        let outcome = transport
            .upgrade(HttpRequest::new(Method::POST, "/containers/c1/attach"))
            .await
            .unwrap();
        let UpgradeOutcome::Switched(upgraded) = outcome else {
            panic!("expected upgrade");
        };
        (
            AttachSession::open(upgraded, mode, &StreamConfig::default()),
            engine,
        )
    }

    fn frame(tag: u8, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::new();
        encode_frame(tag, payload, &mut buf).unwrap();
        buf.freeze()
    }

    #[tokio::test]
    async fn input_is_forwarded_verbatim() {
        let (session, mut engine) = session(StreamMode::Multiplexed).await;
        assert_eq!(session.state(), SessionState::Open);

        session.write(b"echo hi\n").await.unwrap();
        let mut buf = [0u8; 8];
        engine.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"echo hi\n");
    }

    #[tokio::test]
    async fn output_is_demultiplexed() {
        let (mut session, mut engine) = session(StreamMode::Multiplexed).await;

        engine.write_all(&frame(1, b"out")).await.unwrap();
        engine.write_all(&frame(2, b"err")).await.unwrap();

        assert_eq!(
            session.next_output().await.unwrap().unwrap(),
            LogOutput::StdOut(Bytes::from_static(b"out"))
        );
        assert_eq!(
            session.next_output().await.unwrap().unwrap(),
            LogOutput::StdErr(Bytes::from_static(b"err"))
        );
    }

    #[tokio::test]
    async fn tty_output_is_raw() {
        let (mut session, mut engine) = session(StreamMode::Raw).await;
        engine.write_all(b"\x1b[1mprompt$ ").await.unwrap();

        let item = session.next_output().await.unwrap().unwrap();
        assert_eq!(item, LogOutput::Console(Bytes::from_static(b"\x1b[1mprompt$ ")));
    }

    #[tokio::test]
    async fn halves_work_concurrently() {
        let (session, mut engine) = session(StreamMode::Multiplexed).await;
        let (input, mut output) = session.split();

        // Echo every input chunk back as stdout.
        let echo = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            for _ in 0..3 {
                let n = engine.read(&mut buf).await.unwrap();
                engine.write_all(&frame(1, &buf[..n])).await.unwrap();
            }
            engine
        });

        for line in ["one", "two", "three"] {
            input.write(line.as_bytes()).await.unwrap();
            let item = output.next().await.unwrap().unwrap();
            assert_eq!(item.to_string(), line);
        }
        let _engine = echo.await.unwrap();
    }

    #[tokio::test]
    async fn remote_close_releases_connection() {
        let (mut session, mut engine) = session(StreamMode::Multiplexed).await;
        engine.write_all(&frame(1, b"bye")).await.unwrap();
        engine.shutdown().await.unwrap();

        assert!(session.next_output().await.unwrap().is_ok());
        assert!(session.next_output().await.is_none());
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.write(b"late").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionClosed));

        // Our write half was shut down without an explicit close.
        let mut buf = Vec::new();
        let n = tokio::time::timeout(Duration::from_millis(300), engine.read_to_end(&mut buf))
            .await
            .expect("engine should see end of input")
            .unwrap();
        assert_eq!(n, 0);

        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn dropping_output_keeps_input_open() {
        let (session, mut engine) = session(StreamMode::Multiplexed).await;
        let (input, output) = session.split();
        drop(output);

        input.write(b"still here").await.unwrap();
        let mut buf = [0u8; 10];
        engine.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"still here");
        assert_eq!(input.state(), SessionState::Open);
    }

    #[tokio::test]
    async fn close_aborts_write_blocked_on_backpressure() {
        let (session, _engine) = session(StreamMode::Multiplexed).await;
        let input = session.input();

        let blocked = tokio::spawn(async move { input.write(&vec![0u8; 4 * 1024 * 1024]).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        tokio::time::timeout(Duration::from_millis(500), session.close())
            .await
            .expect("close should not wait for the blocked write")
            .unwrap();
        assert_eq!(session.state(), SessionState::Closed);

        let result = tokio::time::timeout(Duration::from_millis(500), blocked)
            .await
            .expect("blocked write should return")
            .unwrap();
        assert!(matches!(result, Err(ClientError::SessionClosed)));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_writes() {
        let (mut session, mut engine) = session(StreamMode::Multiplexed).await;

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.write(b"after close").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionClosed));

        // The engine sees end of input.
        let mut buf = Vec::new();
        let n = tokio::time::timeout(Duration::from_secs(1), engine.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);

        // Output ends without further deliveries.
        let end = tokio::time::timeout(Duration::from_secs(1), async {
            while let Some(item) = session.next_output().await {
                assert!(item.is_err());
            }
        })
        .await;
        assert!(end.is_ok());
    }
}
