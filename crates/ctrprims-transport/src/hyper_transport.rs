use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONNECTION, HOST, UPGRADE};
use http::{HeaderValue, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tracing::debug;

use crate::body::{Body, ChunkSource};
use crate::connect::connect;
use crate::error::{Result, TransportError};
use crate::host::EngineHost;
use crate::traits::{HttpRequest, HttpResponse, Transport, UpgradeOutcome, Upgraded};

/// HTTP/1.1 transport over a Unix socket or TCP connection.
///
/// Opens a new connection per call. Response bodies are streamed lazily, so
/// this works for both fixed-length and chunked (streaming) responses like
/// logs and events; dropping the body closes the connection.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    host: EngineHost,
}

impl HyperTransport {
    /// Create a transport for the given engine endpoint.
    pub fn new(host: EngineHost) -> Self {
        Self { host }
    }

    /// The engine endpoint this transport connects to.
    pub fn host(&self) -> &EngineHost {
        &self.host
    }

    fn build_request(&self, request: HttpRequest) -> Result<hyper::Request<Full<Bytes>>> {
        let mut req = hyper::Request::builder()
            .method(request.method)
            .uri(request.path_and_query)
            .body(Full::new(request.body.unwrap_or_default()))?;

        *req.headers_mut() = request.headers;
        if !req.headers().contains_key(HOST) {
            let authority = HeaderValue::from_str(&self.host.authority())
                .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
            req.headers_mut().insert(HOST, authority);
        }
        Ok(req)
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let io = connect(&self.host).await?;
        let (mut sender, conn) = http1::handshake(TokioIo::new(io)).await?;

        tokio::spawn(async move {
            if let Err(err) = conn.await {
                let msg = err.to_string().to_lowercase();
                if !msg.contains("canceled") && !msg.contains("incomplete") {
                    debug!(%err, "engine connection ended");
                }
            }
        });

        let req = self.build_request(request)?;
        debug!(method = %req.method(), uri = %req.uri(), "sending engine request");
        let response = sender.send_request(req).await?;

        let (parts, incoming) = response.into_parts();
        Ok(HttpResponse {
            status: parts.status,
            headers: parts.headers,
            body: Body::new(IncomingSource(incoming)),
        })
    }

    async fn upgrade(&self, request: HttpRequest) -> Result<UpgradeOutcome> {
        let io = connect(&self.host).await?;
        let (mut sender, conn) = http1::handshake(TokioIo::new(io)).await?;

        // The connection task must keep running for the upgrade to complete.
        tokio::spawn(async move {
            if let Err(err) = conn.with_upgrades().await {
                debug!(%err, "engine upgrade connection ended");
            }
        });

        let mut req = self.build_request(request)?;
        req.headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        req.headers_mut()
            .insert(UPGRADE, HeaderValue::from_static("tcp"));

        debug!(method = %req.method(), uri = %req.uri(), "requesting connection upgrade");
        let mut response = sender.send_request(req).await?;

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            let (parts, incoming) = response.into_parts();
            return Ok(UpgradeOutcome::Refused(HttpResponse {
                status: parts.status,
                headers: parts.headers,
                body: Body::new(IncomingSource(incoming)),
            }));
        }

        let headers = response.headers().clone();
        let upgraded = hyper::upgrade::on(&mut response)
            .await
            .map_err(|err| TransportError::Upgrade(err.to_string()))?;

        Ok(UpgradeOutcome::Switched(Upgraded {
            headers,
            io: Box::new(TokioIo::new(upgraded)),
        }))
    }

    fn describe(&self) -> String {
        self.host.to_string()
    }
}

struct IncomingSource(Incoming);

#[async_trait]
impl ChunkSource for IncomingSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.0.frame().await {
                None => return Ok(None),
                Some(Err(err)) => return Err(err.into()),
                Some(Ok(frame)) => {
                    // Trailers carry no body bytes.
                    if let Ok(data) = frame.into_data() {
                        return Ok(Some(data));
                    }
                }
            }
        }
    }
}
