use crate::api::ListOptions;
use crate::dispatch::Client;
use crate::endpoint::{segment, Endpoint};
use crate::error::Result;
use crate::models::{IdResponse, Network, NetworkConnectBody, NetworkCreateBody, NetworkDisconnectBody};

/// Network endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Networks<'a> {
    client: &'a Client,
}

impl<'a> Networks<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Network>> {
        let endpoint = Endpoint::get("/networks").with_query(options);
        self.client.call_json(&endpoint).await
    }

    pub async fn inspect(&self, id: &str) -> Result<Network> {
        let endpoint = Endpoint::get(format!("/networks/{}", segment(id)?));
        self.client.call_json(&endpoint).await
    }

    pub async fn create(&self, body: &NetworkCreateBody) -> Result<IdResponse> {
        let endpoint = Endpoint::post("/networks/create").with_body(body)?;
        self.client.call_json(&endpoint).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let endpoint = Endpoint::delete(format!("/networks/{}", segment(id)?));
        self.client.call_raw(&endpoint).await
    }

    pub async fn connect(&self, id: &str, body: &NetworkConnectBody) -> Result<()> {
        let endpoint =
            Endpoint::post(format!("/networks/{}/connect", segment(id)?)).with_body(body)?;
        self.client.call_raw(&endpoint).await
    }

    pub async fn disconnect(&self, id: &str, body: &NetworkDisconnectBody) -> Result<()> {
        let endpoint =
            Endpoint::post(format!("/networks/{}/disconnect", segment(id)?)).with_body(body)?;
        self.client.call_raw(&endpoint).await
    }
}
