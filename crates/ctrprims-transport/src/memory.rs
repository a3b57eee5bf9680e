use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tokio::io::DuplexStream;

use crate::body::Body;
use crate::error::{Result, TransportError};
use crate::traits::{HttpRequest, HttpResponse, Transport, UpgradeOutcome, Upgraded};

/// A request observed by [`MemoryTransport`].
pub type RecordedRequest = HttpRequest;

const UPGRADE_BUFFER: usize = 64 * 1024;

enum Scripted {
    Response {
        status: StatusCode,
        headers: HeaderMap,
        body: Body,
    },
    Upgrade {
        headers: HeaderMap,
        io: DuplexStream,
    },
    Error(TransportError),
    Stall,
}

#[derive(Default)]
struct MemoryState {
    script: VecDeque<Scripted>,
    requests: Vec<RecordedRequest>,
}

/// In-memory transport that replays scripted responses in order.
///
/// Every request is recorded; calls beyond the script fail with
/// [`TransportError::Shutdown`].
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with a fully buffered body.
    pub fn push_response(&self, status: StatusCode, body: impl Into<Bytes>) {
        self.push_body(status, HeaderMap::new(), Body::from_bytes(body));
    }

    /// Queue a response with explicit headers and an arbitrary body.
    pub fn push_body(&self, status: StatusCode, headers: HeaderMap, body: Body) {
        self.lock().script.push_back(Scripted::Response {
            status,
            headers,
            body,
        });
    }

    /// Queue a transport-level failure.
    pub fn push_error(&self, err: TransportError) {
        self.lock().script.push_back(Scripted::Error(err));
    }

    /// Queue a call that never completes (for timeout handling).
    pub fn push_stall(&self) {
        self.lock().script.push_back(Scripted::Stall);
    }

    /// Queue a successful upgrade; returns the engine side of the connection.
    pub fn push_upgrade(&self, headers: HeaderMap) -> DuplexStream {
        let (client, engine) = tokio::io::duplex(UPGRADE_BUFFER);
        self.lock().script.push_back(Scripted::Upgrade {
            headers,
            io: client,
        });
        engine
    }

    /// All requests seen so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.lock().requests.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&self, request: HttpRequest) -> Option<Scripted> {
        let mut state = self.lock();
        state.requests.push(request);
        state.script.pop_front()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        match self.next(request) {
            Some(Scripted::Response {
                status,
                headers,
                body,
            }) => Ok(HttpResponse {
                status,
                headers,
                body,
            }),
            Some(Scripted::Upgrade { .. }) => Err(TransportError::InvalidRequest(
                "scripted upgrade answered an ordinary request".to_string(),
            )),
            Some(Scripted::Error(err)) => Err(err),
            Some(Scripted::Stall) => std::future::pending().await,
            None => Err(TransportError::Shutdown),
        }
    }

    async fn upgrade(&self, request: HttpRequest) -> Result<UpgradeOutcome> {
        match self.next(request) {
            Some(Scripted::Upgrade { headers, io }) => Ok(UpgradeOutcome::Switched(Upgraded {
                headers,
                io: Box::new(io),
            })),
            Some(Scripted::Response {
                status,
                headers,
                body,
            }) => Ok(UpgradeOutcome::Refused(HttpResponse {
                status,
                headers,
                body,
            })),
            Some(Scripted::Error(err)) => Err(err),
            Some(Scripted::Stall) => std::future::pending().await,
            None => Err(TransportError::Shutdown),
        }
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn replays_responses_in_order() {
        let transport = MemoryTransport::new();
        transport.push_response(StatusCode::OK, "first");
        transport.push_response(StatusCode::NOT_FOUND, "second");

        let one = transport
            .send(HttpRequest::new(Method::GET, "/one"))
            .await
            .unwrap();
        let two = transport
            .send(HttpRequest::new(Method::GET, "/two"))
            .await
            .unwrap();

        assert_eq!(one.status, StatusCode::OK);
        assert_eq!(one.body.collect().await.unwrap().as_ref(), b"first");
        assert_eq!(two.status, StatusCode::NOT_FOUND);

        let paths: Vec<_> = transport
            .requests()
            .into_iter()
            .map(|r| r.path_and_query)
            .collect();
        assert_eq!(paths, vec!["/one", "/two"]);
    }

    #[tokio::test]
    async fn exhausted_script_shuts_down() {
        let transport = MemoryTransport::new();
        let err = transport
            .send(HttpRequest::new(Method::GET, "/_ping"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Shutdown));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn scripted_error_is_returned() {
        let transport = MemoryTransport::new();
        transport.push_error(TransportError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )));
        let err = transport
            .send(HttpRequest::new(Method::GET, "/_ping"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn upgrade_yields_connected_duplex() {
        let transport = MemoryTransport::new();
        let mut engine = transport.push_upgrade(HeaderMap::new());

        let outcome = transport
            .upgrade(HttpRequest::new(Method::POST, "/containers/c1/attach"))
            .await
            .unwrap();
        let UpgradeOutcome::Switched(mut upgraded) = outcome else {
            panic!("expected switched connection");
        };

        upgraded.io.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        engine.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn upgrade_refused_with_response() {
        let transport = MemoryTransport::new();
        transport.push_response(StatusCode::CONFLICT, r#"{"message":"not running"}"#);

        let outcome = transport
            .upgrade(HttpRequest::new(Method::POST, "/containers/c1/attach"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            UpgradeOutcome::Refused(HttpResponse {
                status: StatusCode::CONFLICT,
                ..
            })
        ));
    }
}
