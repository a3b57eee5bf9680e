//! Incremental stream decoding for container engine HTTP bodies.
//!
//! Engine responses that never end on their own (logs, events, pull
//! progress, stats) are decoded here:
//! - [`StreamReader`] buffers partial transport reads and yields whole
//!   units: newline-terminated segments, 8-byte-header frames, or raw chunks
//! - [`NdjsonDecoder`] turns segments into typed records
//! - [`Demuxer`] splits the multiplexed stdout/stderr format (or passes raw
//!   TTY output through)
//!
//! Both decoders can be handed to a producer task with `into_stream`, giving
//! the caller a bounded, cancel-on-drop [`ItemStream`].

pub mod channel;
pub mod codec;
pub mod demux;
pub mod error;
pub mod ndjson;
pub mod reader;
pub mod sequence;

pub use channel::StreamChannel;
pub use codec::{
    decode_frame, encode_frame, MuxCodec, MuxFrame, SegmentCodec, DEFAULT_MAX_LINE,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use demux::{Demuxer, LogOutput, StreamMode};
pub use error::{Result, StreamError};
pub use ndjson::{envelope_message, NdjsonDecoder, NdjsonMode};
pub use reader::{StreamConfig, StreamReader, DEFAULT_CHANNEL_CAPACITY};
pub use sequence::{ItemStream, OutputStream, RecordStream};
