//! Image pull progress and completion detection.
//!
//! Engines disagree on how a finished pull is reported. Docker emits a
//! status line prefixed `Digest: `; Podman emits a line whose `id` is the
//! pulled image. Both shapes are checked by a fixed list of detectors with
//! a fixed precedence instead of a per-engine flag.

use std::io;

use bytes::Bytes;
use ctrprims_stream::{RecordStream, StreamError};
use ctrprims_transport::TransportError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result};

const DIGEST_PREFIX: &str = "Digest: ";

/// One progress record from a pull or push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(rename = "progressDetail", skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
    /// Build-style output line, emitted by some engines during pulls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aux: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Which record shape identified the pulled image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMarker {
    /// A `Digest: <digest>` status line.
    DigestStatus,
    /// A record carrying the image id with no digest status.
    BareId,
}

/// Outcome of a completed pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    /// Content digest, or the image id when only that was reported.
    pub digest: String,
    pub marker: CompletionMarker,
}

type Detector = fn(&ProgressMessage) -> Option<String>;

/// Detectors in precedence order.
const DETECTORS: &[(CompletionMarker, Detector)] = &[
    (CompletionMarker::DigestStatus, digest_status),
    (CompletionMarker::BareId, bare_id),
];

fn digest_status(message: &ProgressMessage) -> Option<String> {
    let digest = message.status.as_deref()?.strip_prefix(DIGEST_PREFIX)?.trim();
    (!digest.is_empty()).then(|| digest.to_string())
}

fn bare_id(message: &ProgressMessage) -> Option<String> {
    if message
        .status
        .as_deref()
        .is_some_and(|status| status.starts_with(DIGEST_PREFIX))
    {
        return None;
    }
    message
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Pick the authoritative result from a full record sequence.
///
/// The first detector with any match wins; within it, the last matching
/// record is used.
pub fn detect_completion(messages: &[ProgressMessage]) -> Option<PullResult> {
    DETECTORS.iter().find_map(|(marker, detect)| {
        messages.iter().rev().find_map(detect).map(|digest| PullResult {
            digest,
            marker: *marker,
        })
    })
}

/// Live pull progress.
///
/// Iterate with [`PullStream::next`] to observe progress, then call
/// [`PullStream::finish`] to drain the rest and resolve the result.
#[derive(Debug)]
pub struct PullStream {
    records: RecordStream<ProgressMessage>,
    seen: Vec<ProgressMessage>,
    raw: Vec<Bytes>,
    failure: Option<ClientError>,
}

impl PullStream {
    pub fn new(records: RecordStream<ProgressMessage>) -> Self {
        Self {
            records,
            seen: Vec::new(),
            raw: Vec::new(),
            failure: None,
        }
    }

    /// Next progress record.
    ///
    /// Undecodable records are reported and kept for diagnostics; an
    /// error envelope ends the pull with [`ClientError::Api`]. A terminal
    /// failure is remembered and returned again by [`PullStream::finish`].
    pub async fn next(&mut self) -> Option<Result<ProgressMessage>> {
        if self.failure.is_some() {
            return None;
        }
        let item = self.records.next().await?;
        Some(match item {
            Ok(message) => {
                self.seen.push(message.clone());
                Ok(message)
            }
            Err(StreamError::Decode { raw, source }) => {
                self.raw.push(raw.clone());
                Err(StreamError::Decode { raw, source }.into())
            }
            Err(err) => {
                let err = ClientError::from(err);
                self.failure = Some(replay(&err));
                Err(err)
            }
        })
    }

    /// Records observed so far.
    pub fn messages(&self) -> &[ProgressMessage] {
        &self.seen
    }

    /// Drain the remaining progress and resolve the pulled digest.
    ///
    /// Per-record decode failures are tolerated. Any other failure is
    /// returned. A stream matching neither completion shape yields
    /// [`ClientError::UnknownResponse`] carrying the records received.
    pub async fn finish(mut self) -> Result<PullResult> {
        while let Some(item) = self.next().await {
            match item {
                Ok(_) | Err(ClientError::Decode { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        if let Some(err) = self.failure.take() {
            return Err(err);
        }

        if let Some(result) = detect_completion(&self.seen) {
            debug!(digest = %result.digest, marker = ?result.marker, "pull complete");
            return Ok(result);
        }
        Err(ClientError::UnknownResponse {
            raw: self.raw_payload(),
        })
    }

    fn raw_payload(&self) -> String {
        let decoded = self
            .seen
            .iter()
            .filter_map(|message| serde_json::to_string(message).ok());
        let undecoded = self
            .raw
            .iter()
            .map(|raw| String::from_utf8_lossy(raw).into_owned());
        decoded.chain(undecoded).collect::<Vec<_>>().join("\n")
    }
}

/// Rebuild a terminal stream failure so it can be reported twice.
///
/// Failures that carry only plain data are reproduced exactly; the rest keep
/// their message and I/O kind.
fn replay(err: &ClientError) -> ClientError {
    match err {
        ClientError::Api { status, message } => ClientError::Api {
            status: *status,
            message: message.clone(),
        },
        ClientError::Timeout(budget) => ClientError::Timeout(*budget),
        ClientError::TruncatedStream { unit, pending } => ClientError::TruncatedStream {
            unit: *unit,
            pending: *pending,
        },
        ClientError::Stream(StreamError::PayloadTooLarge { size, max }) => {
            ClientError::Stream(StreamError::PayloadTooLarge {
                size: *size,
                max: *max,
            })
        }
        ClientError::Stream(StreamError::LineTooLong { max }) => {
            ClientError::Stream(StreamError::LineTooLong { max: *max })
        }
        ClientError::Stream(StreamError::Cancelled) => ClientError::Stream(StreamError::Cancelled),
        ClientError::Transport(TransportError::Io(source)) => ClientError::Transport(
            TransportError::Io(io::Error::new(source.kind(), source.to_string())),
        ),
        other => ClientError::Stream(StreamError::Io(io::Error::other(other.to_string()))),
    }
}
