use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ctrprims_stream::{
    envelope_message, Demuxer, NdjsonDecoder, NdjsonMode, OutputStream, RecordStream, StreamMode,
    StreamReader,
};
use ctrprims_transport::{
    Body, EngineHost, HttpResponse, HyperTransport, Transport, UpgradeOutcome,
};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::debug;

use crate::attach::AttachSession;
use crate::config::ClientConfig;
use crate::endpoint::{Endpoint, MapsRawResponse, RawResponse, ResponseShape};
use crate::error::{ClientError, Result};

/// A call's deadline and the budget it was derived from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    fn after(budget: Option<Duration>) -> Option<Self> {
        budget.map(|budget| Self {
            at: Instant::now() + budget,
            budget,
        })
    }
}

/// Run `fut` under an optional deadline, surfacing expiry as [`ClientError::Timeout`].
pub(crate) async fn within<F, T, E>(deadline: Option<Deadline>, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    ClientError: From<E>,
{
    match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline.at, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ClientError::Timeout(deadline.budget)),
        },
        None => Ok(fut.await?),
    }
}

/// A response whose body is still open.
#[derive(Debug)]
pub struct StreamingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Reader over the open body, already carrying the call's deadline.
    pub reader: StreamReader,
}

/// What [`Client::execute`] produced for a successful call.
#[derive(Debug)]
pub enum Dispatch {
    /// Body fully buffered (single-value shape).
    Buffered(RawResponse),
    /// Body left open for NDJSON decoding.
    Ndjson(StreamingResponse, NdjsonMode),
    /// Body left open for demultiplexing.
    Demuxed(StreamingResponse, StreamMode),
}

/// Typed client for a container engine API.
///
/// Cheap to clone; clones share the transport. Each call owns its own
/// reader and decoder, so no state crosses calls.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl Client {
    /// Create a client over any transport.
    pub fn new(transport: impl Transport + 'static, config: ClientConfig) -> Self {
        Self::from_arc(Arc::new(transport), config)
    }

    /// Create a client over a shared transport.
    pub fn from_arc(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// Create a client speaking HTTP/1.1 to `host`. No connection is opened yet.
    pub fn for_host(host: EngineHost, config: ClientConfig) -> Self {
        Self::new(HyperTransport::new(host), config)
    }

    /// Create a client for the host named by the environment (or the default socket).
    pub fn from_env(config: ClientConfig) -> Result<Self> {
        Ok(Self::for_host(EngineHost::resolve(None)?, config))
    }

    /// Current client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Endpoint description for diagnostics.
    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    /// Execute one call.
    ///
    /// Transport failures are returned as-is, never retried. Non-2xx
    /// responses become [`ClientError::Api`]. Streaming shapes return as soon
    /// as headers arrive, with the body still open.
    pub async fn execute(&self, endpoint: &Endpoint) -> Result<Dispatch> {
        let deadline = Deadline::after(self.config.timeout_for(endpoint));
        let request = endpoint.to_request(self.config.api_version.as_deref());
        debug!(
            method = %request.method,
            target = %request.path_and_query,
            shape = ?endpoint.response_shape(),
            "dispatching engine call"
        );

        let response = within(deadline, self.transport.send(request)).await?;
        if !response.status.is_success() {
            return Err(self.api_error(response.status, response.body, deadline).await);
        }

        match endpoint.response_shape() {
            ResponseShape::Single => {
                let body = within(deadline, response.body.collect()).await?;
                Ok(Dispatch::Buffered(RawResponse {
                    status: response.status,
                    headers: response.headers,
                    body,
                }))
            }
            ResponseShape::Ndjson(mode) => Ok(Dispatch::Ndjson(self.open_stream(response, deadline), mode)),
            ResponseShape::Demuxed(mode) => {
                Ok(Dispatch::Demuxed(self.open_stream(response, deadline), mode))
            }
        }
    }

    fn open_stream(&self, response: HttpResponse, deadline: Option<Deadline>) -> StreamingResponse {
        let mut reader = StreamReader::with_config(response.body, self.config.stream.clone());
        if let Some(deadline) = deadline {
            reader = reader.with_deadline(deadline.at, deadline.budget);
        }
        StreamingResponse {
            status: response.status,
            headers: response.headers,
            reader,
        }
    }

    /// Execute and decode a single JSON value.
    pub async fn call_json<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        let raw = self.buffered(endpoint).await?;
        raw.json(endpoint.path())
    }

    /// Execute and map the buffered body without JSON decoding.
    pub async fn call_raw<T: MapsRawResponse>(&self, endpoint: &Endpoint) -> Result<T> {
        T::from_raw(self.buffered(endpoint).await?)
    }

    /// Execute and decode the body as a stream of NDJSON records.
    pub async fn call_records<T>(&self, endpoint: &Endpoint) -> Result<RecordStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let capacity = self.config.stream.channel_capacity;
        match self.execute(endpoint).await? {
            Dispatch::Ndjson(open, mode) => Ok(NdjsonDecoder::new(open.reader, mode).into_stream(capacity)),
            // A buffered body is still a valid (finite) record stream.
            Dispatch::Buffered(raw) => {
                let reader = StreamReader::with_config(Body::from_bytes(raw.body), self.config.stream.clone());
                Ok(NdjsonDecoder::new(reader, NdjsonMode::Plain).into_stream(capacity))
            }
            Dispatch::Demuxed(..) => Err(ClientError::InvalidRequest(format!(
                "{} streams container output, not records",
                endpoint.path()
            ))),
        }
    }

    /// Execute and demultiplex the body as container output.
    pub async fn call_output(&self, endpoint: &Endpoint) -> Result<OutputStream> {
        let capacity = self.config.stream.channel_capacity;
        match self.execute(endpoint).await? {
            Dispatch::Demuxed(open, mode) => Ok(Demuxer::new(open.reader, mode).into_stream(capacity)),
            Dispatch::Buffered(raw) => {
                let reader = StreamReader::with_config(Body::from_bytes(raw.body), self.config.stream.clone());
                Ok(Demuxer::new(reader, StreamMode::Multiplexed).into_stream(capacity))
            }
            Dispatch::Ndjson(..) => Err(ClientError::InvalidRequest(format!(
                "{} streams records, not container output",
                endpoint.path()
            ))),
        }
    }

    /// Execute with a connection upgrade and open a bidirectional session.
    ///
    /// Only establishing the session is bounded by `request_timeout` (or the
    /// endpoint override); the open session has no deadline.
    pub async fn upgrade(&self, endpoint: &Endpoint, mode: StreamMode) -> Result<AttachSession> {
        let budget = endpoint
            .timeout_override()
            .unwrap_or(self.config.request_timeout);
        let deadline = Deadline::after(Some(budget));
        let request = endpoint.to_request(self.config.api_version.as_deref());
        debug!(target = %request.path_and_query, ?mode, "opening attach session");

        match within(deadline, self.transport.upgrade(request)).await? {
            UpgradeOutcome::Switched(upgraded) => {
                Ok(AttachSession::open(upgraded, mode, &self.config.stream))
            }
            UpgradeOutcome::Refused(response) if !response.status.is_success() => {
                Err(self.api_error(response.status, response.body, deadline).await)
            }
            UpgradeOutcome::Refused(response) => Err(ClientError::UnknownResponse {
                raw: format!(
                    "expected 101 Switching Protocols, got {}",
                    response.status
                ),
            }),
        }
    }

    async fn buffered(&self, endpoint: &Endpoint) -> Result<RawResponse> {
        match self.execute(endpoint).await? {
            Dispatch::Buffered(raw) => Ok(raw),
            Dispatch::Ndjson(open, _) | Dispatch::Demuxed(open, _) => {
                let body = drain(open.reader).await?;
                Ok(RawResponse {
                    status: open.status,
                    headers: open.headers,
                    body,
                })
            }
        }
    }

    async fn api_error(&self, status: StatusCode, body: Body, deadline: Option<Deadline>) -> ClientError {
        let raw = match within(deadline, body.collect_limited(self.config.max_error_body)).await {
            Ok(raw) => raw,
            Err(err) => return err,
        };
        let message = api_message(status, &raw);
        debug!(%status, %message, "engine returned error");
        ClientError::Api { status, message }
    }
}

async fn drain(mut reader: StreamReader) -> Result<Bytes> {
    let mut buf = Vec::new();
    while let Some(chunk) = reader.next_chunk().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// Message for a non-2xx body: the envelope message, else the raw text,
/// else the status reason.
fn api_message(status: StatusCode, raw: &[u8]) -> String {
    if let Some(message) = envelope_message(raw) {
        return message;
    }
    let text = String::from_utf8_lossy(raw).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport.describe())
            .field("config", &self.config)
            .finish()
    }
}
