use ctrprims_stream::StreamMode;

use crate::attach::AttachSession;
use crate::dispatch::Client;
use crate::endpoint::{segment, Endpoint};
use crate::error::Result;
use crate::models::{ExecCreateBody, ExecInspect, ExecStartBody, IdResponse};

/// Exec endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Exec<'a> {
    client: &'a Client,
}

impl<'a> Exec<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Create an exec instance in `container`; returns its id.
    pub async fn create(&self, container: &str, body: &ExecCreateBody) -> Result<IdResponse> {
        let endpoint =
            Endpoint::post(format!("/containers/{}/exec", segment(container)?)).with_body(body)?;
        self.client.call_json(&endpoint).await
    }

    /// Start an exec instance and attach to it.
    ///
    /// The output format follows the exec's own `Tty` setting.
    pub async fn start(&self, id: &str, tty: bool) -> Result<AttachSession> {
        let body = ExecStartBody { detach: false, tty };
        let endpoint = Endpoint::post(format!("/exec/{}/start", segment(id)?)).with_body(&body)?;
        self.client.upgrade(&endpoint, StreamMode::from_tty(tty)).await
    }

    pub async fn inspect(&self, id: &str) -> Result<ExecInspect> {
        let endpoint = Endpoint::get(format!("/exec/{}/json", segment(id)?));
        self.client.call_json(&endpoint).await
    }
}
