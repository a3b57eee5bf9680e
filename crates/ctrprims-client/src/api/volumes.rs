use crate::api::ListOptions;
use crate::dispatch::Client;
use crate::endpoint::{segment, Endpoint};
use crate::error::Result;
use crate::models::{Volume, VolumeCreateBody, VolumeList};

/// Volume endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Volumes<'a> {
    client: &'a Client,
}

impl<'a> Volumes<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, options: &ListOptions) -> Result<VolumeList> {
        let endpoint = Endpoint::get("/volumes").with_query(options);
        self.client.call_json(&endpoint).await
    }

    pub async fn inspect(&self, name: &str) -> Result<Volume> {
        let endpoint = Endpoint::get(format!("/volumes/{}", segment(name)?));
        self.client.call_json(&endpoint).await
    }

    pub async fn create(&self, body: &VolumeCreateBody) -> Result<Volume> {
        let endpoint = Endpoint::post("/volumes/create").with_body(body)?;
        self.client.call_json(&endpoint).await
    }

    pub async fn remove(&self, name: &str, force: bool) -> Result<()> {
        let mut endpoint = Endpoint::delete(format!("/volumes/{}", segment(name)?));
        if force {
            endpoint = endpoint.query("force", true);
        }
        self.client.call_raw(&endpoint).await
    }
}
