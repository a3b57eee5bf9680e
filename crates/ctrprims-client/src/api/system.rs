use ctrprims_stream::{NdjsonMode, RecordStream};

use crate::dispatch::Client;
use crate::endpoint::{Endpoint, Filters, HasQuery, Query, ResponseShape};
use crate::error::Result;
use crate::models::{DiskUsage, EventMessage, SystemInfo, SystemVersion};

/// Options for `GET /events`.
#[derive(Debug, Clone, Default)]
pub struct EventsOptions {
    /// Unix timestamp or duration string accepted by the engine.
    pub since: Option<String>,
    pub until: Option<String>,
    pub filters: Filters,
}

impl HasQuery for EventsOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_opt("since", self.since.as_deref());
        query.push_opt("until", self.until.as_deref());
        query.push_filters(&self.filters);
    }
}

/// Engine-wide endpoints.
#[derive(Debug, Clone, Copy)]
pub struct System<'a> {
    client: &'a Client,
}

impl<'a> System<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// `GET /_ping`; the engine answers `OK`.
    pub async fn ping(&self) -> Result<String> {
        self.client.call_raw(&Endpoint::get("/_ping")).await
    }

    pub async fn version(&self) -> Result<SystemVersion> {
        self.client.call_json(&Endpoint::get("/version")).await
    }

    pub async fn info(&self) -> Result<SystemInfo> {
        self.client.call_json(&Endpoint::get("/info")).await
    }

    /// Live engine events. Without `until` the stream never ends on its own.
    pub async fn events(&self, options: &EventsOptions) -> Result<RecordStream<EventMessage>> {
        let endpoint = Endpoint::get("/events")
            .with_query(options)
            .shape(ResponseShape::Ndjson(NdjsonMode::Plain));
        self.client.call_records(&endpoint).await
    }

    pub async fn disk_usage(&self) -> Result<DiskUsage> {
        self.client.call_json(&Endpoint::get("/system/df")).await
    }
}
