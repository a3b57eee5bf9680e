use std::fmt;

use ctrprims_stream::{NdjsonMode, RecordStream};
use http::{HeaderName, HeaderValue};

use crate::dispatch::Client;
use crate::endpoint::{segment, Endpoint, Filters, HasQuery, Query, ResponseShape};
use crate::error::{ClientError, Result};
use crate::models::{ImageDeleteItem, ImageHistoryItem, ImageInspect, ImageSummary};
use crate::pull::{ProgressMessage, PullResult, PullStream};

const REGISTRY_AUTH: HeaderName = HeaderName::from_static("x-registry-auth");

/// Opaque value for the `X-Registry-Auth` header.
///
/// Produced by the caller (usually base64 JSON credentials); sent as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryAuth(String);

impl RegistryAuth {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn header_value(&self) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&self.0).map_err(|_| {
            ClientError::InvalidRequest("registry auth is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegistryAuth")
            .field(&format_args!("<redacted:{} bytes>", self.0.len()))
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageListOptions {
    /// Include intermediate images.
    pub all: bool,
    pub digests: bool,
    pub filters: Filters,
}

impl HasQuery for ImageListOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_flag("all", self.all);
        query.push_flag("digests", self.digests);
        query.push_filters(&self.filters);
    }
}

/// Options for `POST /images/create`.
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    /// Defaults to `latest` on the engine side when the image has no tag.
    pub tag: Option<String>,
    /// `os[/arch[/variant]]`.
    pub platform: Option<String>,
    pub auth: Option<RegistryAuth>,
}

impl HasQuery for PullOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_opt("tag", self.tag.as_deref());
        query.push_opt("platform", self.platform.as_deref());
    }
}

#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    pub tag: Option<String>,
    pub auth: Option<RegistryAuth>,
}

impl HasQuery for PushOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_opt("tag", self.tag.as_deref());
    }
}

#[derive(Debug, Clone)]
pub struct TagOptions {
    pub repo: String,
    pub tag: Option<String>,
}

impl HasQuery for TagOptions {
    fn append_query(&self, query: &mut Query) {
        query.push("repo", &self.repo);
        query.push_opt("tag", self.tag.as_deref());
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoveImageOptions {
    pub force: bool,
    pub no_prune: bool,
}

impl HasQuery for RemoveImageOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_flag("force", self.force);
        query.push_flag("noprune", self.no_prune);
    }
}

/// Image endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Images<'a> {
    client: &'a Client,
}

impl<'a> Images<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, options: &ImageListOptions) -> Result<Vec<ImageSummary>> {
        let endpoint = Endpoint::get("/images/json").with_query(options);
        self.client.call_json(&endpoint).await
    }

    pub async fn inspect(&self, name: &str) -> Result<ImageInspect> {
        let endpoint = Endpoint::get(format!("/images/{}/json", segment(name)?));
        self.client.call_json(&endpoint).await
    }

    pub async fn history(&self, name: &str) -> Result<Vec<ImageHistoryItem>> {
        let endpoint = Endpoint::get(format!("/images/{}/history", segment(name)?));
        self.client.call_json(&endpoint).await
    }

    /// Start pulling `image`; progress is observable on the returned stream.
    pub async fn pull(&self, image: &str, options: &PullOptions) -> Result<PullStream> {
        segment(image)?;
        let mut endpoint = Endpoint::post("/images/create")
            .query("fromImage", image)
            .with_query(options)
            .shape(ResponseShape::Ndjson(NdjsonMode::ErrorEnvelope));
        if let Some(auth) = &options.auth {
            endpoint = endpoint.header(REGISTRY_AUTH, auth.header_value()?);
        }
        let records = self.client.call_records(&endpoint).await?;
        Ok(PullStream::new(records))
    }

    /// Pull `image` to completion and report what was pulled.
    pub async fn pull_and_wait(&self, image: &str, options: &PullOptions) -> Result<PullResult> {
        self.pull(image, options).await?.finish().await
    }

    /// Push `name` to its registry. An error envelope ends the stream.
    pub async fn push(
        &self,
        name: &str,
        options: &PushOptions,
    ) -> Result<RecordStream<ProgressMessage>> {
        let mut endpoint = Endpoint::post(format!("/images/{}/push", segment(name)?))
            .with_query(options)
            .shape(ResponseShape::Ndjson(NdjsonMode::ErrorEnvelope));
        if let Some(auth) = &options.auth {
            endpoint = endpoint.header(REGISTRY_AUTH, auth.header_value()?);
        }
        self.client.call_records(&endpoint).await
    }

    pub async fn tag(&self, name: &str, options: &TagOptions) -> Result<()> {
        let endpoint =
            Endpoint::post(format!("/images/{}/tag", segment(name)?)).with_query(options);
        self.client.call_raw(&endpoint).await
    }

    pub async fn remove(
        &self,
        name: &str,
        options: &RemoveImageOptions,
    ) -> Result<Vec<ImageDeleteItem>> {
        let endpoint = Endpoint::delete(format!("/images/{}", segment(name)?)).with_query(options);
        self.client.call_json(&endpoint).await
    }
}
