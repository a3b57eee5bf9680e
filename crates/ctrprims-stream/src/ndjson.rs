use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, StreamError};
use crate::reader::StreamReader;
use crate::sequence::RecordStream;

/// How in-band error objects are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NdjsonMode {
    /// Every segment is decoded as a record.
    #[default]
    Plain,
    /// A segment shaped like an error envelope ends the sequence with
    /// [`StreamError::Remote`]. Used by image pull/push progress.
    ErrorEnvelope,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "errorDetail")]
    error_detail: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Extract the message of an engine error envelope.
///
/// Recognises `{"message": ...}` and the progress form
/// `{"error": ..., "errorDetail": {"message": ...}}`, preferring
/// `errorDetail.message`, then `error`, then `message`. Returns `None` when
/// the text is not a JSON object carrying any of them.
pub fn envelope_message(raw: &[u8]) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_slice(raw).ok()?;
    envelope
        .error_detail
        .and_then(|detail| detail.message)
        .or(envelope.error)
        .or(envelope.message)
        .filter(|message| !message.is_empty())
}

/// Decodes newline-delimited JSON records from a [`StreamReader`].
///
/// Blank lines are skipped. A record that fails to decode is reported as a
/// [`StreamError::Decode`] item and decoding continues with the next line.
pub struct NdjsonDecoder<T> {
    reader: StreamReader,
    mode: NdjsonMode,
    done: bool,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> NdjsonDecoder<T> {
    /// Create a decoder over `reader`.
    pub fn new(reader: StreamReader, mode: NdjsonMode) -> Self {
        Self {
            reader,
            mode,
            done: false,
            _record: PhantomData,
        }
    }

    /// The next record, decode failure, or terminal error.
    ///
    /// Returns `None` after end of stream or after a fatal error.
    pub async fn next(&mut self) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        loop {
            let segment = match self.reader.next_segment(b'\n').await {
                Ok(Some(segment)) => segment,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };

            let line = segment.trim_ascii();
            if line.is_empty() {
                continue;
            }

            if self.mode == NdjsonMode::ErrorEnvelope {
                if let Some(message) = envelope_message(line) {
                    debug!(%message, "error envelope ends stream");
                    self.done = true;
                    return Some(Err(StreamError::Remote { message }));
                }
            }

            return Some(match serde_json::from_slice::<T>(line) {
                Ok(record) => Ok(record),
                Err(source) => {
                    warn!(%source, len = line.len(), "undecodable stream record");
                    Err(StreamError::Decode {
                        raw: segment.slice_ref(line),
                        source,
                    })
                }
            });
        }
    }

    /// Borrow the underlying reader.
    pub fn reader(&self) -> &StreamReader {
        &self.reader
    }
}

impl<T> NdjsonDecoder<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Move decoding onto a producer task feeding a bounded queue.
    pub fn into_stream(mut self, capacity: usize) -> RecordStream<T> {
        let (tx, stream) = RecordStream::<T>::channel(capacity, self.reader.cancel_token());
        tokio::spawn(async move {
            while let Some(item) = self.next().await {
                if tx.send(item).await.is_err() {
                    debug!("record consumer dropped; stopping");
                    break;
                }
            }
        });
        stream
    }
}
