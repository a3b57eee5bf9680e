use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use ctrprims_stream::{NdjsonMode, StreamMode};
use ctrprims_transport::HttpRequest;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ClientError, Result};

/// How a successful response body is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    /// Buffer the whole body, then decode it once.
    #[default]
    Single,
    /// Newline-delimited JSON records, decoded as they arrive.
    Ndjson(NdjsonMode),
    /// Container output, demultiplexed (or raw) as it arrives.
    Demuxed(StreamMode),
}

impl ResponseShape {
    /// Whether the body is handed off open instead of buffered.
    pub fn is_streaming(self) -> bool {
        !matches!(self, Self::Single)
    }
}

/// Ordered query parameters. Names may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    /// Append a parameter.
    pub fn push(&mut self, name: &str, value: impl ToString) {
        self.0.push((name.to_string(), value.to_string()));
    }

    /// Append a parameter only when a value is present.
    pub fn push_opt<V: ToString>(&mut self, name: &str, value: Option<V>) {
        if let Some(value) = value {
            self.push(name, value);
        }
    }

    /// Append `name=true` only when `flag` is set.
    pub fn push_flag(&mut self, name: &str, flag: bool) {
        if flag {
            self.push(name, "true");
        }
    }

    /// Append engine filters as a JSON-encoded `filters` parameter.
    pub fn push_filters(&mut self, filters: &Filters) {
        if !filters.is_empty() {
            self.push("filters", filters.to_json());
        }
    }

    /// The parameters in insertion order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

/// Engine-side list filters (`{"label":["a=b"],"status":["running"]}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filters(BTreeMap<String, Vec<String>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value for `key`.
    pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Parse `key=value` (value may itself contain `=`).
    pub fn parse_pair(self, pair: &str) -> Result<Self> {
        let (key, value) = pair
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| ClientError::InvalidRequest(format!("invalid filter '{pair}'")))?;
        Ok(self.add(key, value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn to_json(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|(key, values)| {
                let values = values.iter().cloned().map(serde_json::Value::String).collect();
                (key.clone(), serde_json::Value::Array(values))
            })
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

/// Option types that contribute query parameters.
pub trait HasQuery {
    fn append_query(&self, query: &mut Query);
}

/// Request payloads.
///
/// The default encoding is JSON; implementors only need `Serialize`.
pub trait HasBody: Serialize {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode_body(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

impl HasBody for serde_json::Value {}

/// A fully buffered successful response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Decode the body as JSON, naming `context` on failure.
    pub fn json<T: DeserializeOwned>(&self, context: &str) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|source| ClientError::Decode {
            context: context.to_string(),
            source,
        })
    }
}

/// Result types built from a buffered response without JSON decoding.
pub trait MapsRawResponse: Sized {
    fn from_raw(raw: RawResponse) -> Result<Self>;
}

impl MapsRawResponse for () {
    fn from_raw(_raw: RawResponse) -> Result<Self> {
        Ok(())
    }
}

impl MapsRawResponse for Bytes {
    fn from_raw(raw: RawResponse) -> Result<Self> {
        Ok(raw.body)
    }
}

impl MapsRawResponse for String {
    fn from_raw(raw: RawResponse) -> Result<Self> {
        String::from_utf8(raw.body.to_vec())
            .map_err(|err| ClientError::UnknownResponse {
                raw: format!("non-UTF-8 body ({err})"),
            })
    }
}

impl MapsRawResponse for RawResponse {
    fn from_raw(raw: RawResponse) -> Result<Self> {
        Ok(raw)
    }
}

/// Immutable description of one API call.
///
/// Built with consuming `with`-style methods and never changed once handed
/// to the dispatcher.
#[derive(Debug, Clone)]
pub struct Endpoint {
    method: Method,
    path: String,
    query: Query,
    headers: HeaderMap,
    body: Option<Bytes>,
    shape: ResponseShape,
    timeout: Option<Duration>,
}

impl Endpoint {
    /// Create a descriptor for `method` on `path` (leading `/`, unversioned).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::default(),
            headers: HeaderMap::new(),
            body: None,
            shape: ResponseShape::Single,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Append one query parameter.
    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push(name, value);
        self
    }

    /// Append a query parameter when present.
    pub fn query_opt<V: ToString>(mut self, name: &str, value: Option<V>) -> Self {
        self.query.push_opt(name, value);
        self
    }

    /// Append the parameters of an options value.
    pub fn with_query(mut self, options: &impl HasQuery) -> Self {
        options.append_query(&mut self.query);
        self
    }

    /// Attach an encoded request body.
    pub fn with_body(mut self, body: &impl HasBody) -> Result<Self> {
        let encoded = body.encode_body().map_err(|source| ClientError::Decode {
            context: "request body".to_string(),
            source,
        })?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
        self.body = Some(encoded);
        Ok(self)
    }

    /// Attach pre-encoded bytes with an explicit content type.
    pub fn with_raw_body(mut self, body: impl Into<Bytes>, content_type: &'static str) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = Some(body.into());
        self
    }

    /// Append a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set how the response body is consumed.
    pub fn shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    /// Override the configured deadline for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        self.query.pairs()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn response_shape(&self) -> ResponseShape {
        self.shape
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Origin-form request target, with an optional `/v{version}` prefix.
    pub fn path_and_query(&self, api_version: Option<&str>) -> String {
        let mut target = match api_version {
            Some(version) => format!("/v{version}{}", self.path),
            None => self.path.clone(),
        };
        if !self.query.is_empty() {
            target.push('?');
            target.push_str(&self.query.encode());
        }
        target
    }

    /// Build the transport request.
    pub fn to_request(&self, api_version: Option<&str>) -> HttpRequest {
        HttpRequest {
            method: self.method.clone(),
            path_and_query: self.path_and_query(api_version),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// Percent-encode one path segment (an id, name, or image reference).
///
/// Image references keep `/`, `:` and `@` so the engine can route them.
pub fn segment(value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(ClientError::InvalidRequest(
            "empty identifier in request path".to_string(),
        ));
    }
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':'
            | b'@' | b'+' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    Ok(out)
}
