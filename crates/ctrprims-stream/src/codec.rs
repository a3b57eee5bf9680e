use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::channel::StreamChannel;
use crate::error::{Result, StreamError};

/// Multiplexed frame header: type (1) + reserved (3) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Default maximum frame payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Default maximum NDJSON line length: 8 MiB.
pub const DEFAULT_MAX_LINE: usize = 8 * 1024 * 1024;

/// One frame of multiplexed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxFrame {
    /// Raw stream-type tag from header byte 0.
    pub tag: u8,
    /// The frame payload.
    pub payload: Bytes,
}

impl MuxFrame {
    /// Create a frame for a known channel.
    pub fn new(channel: StreamChannel, payload: impl Into<Bytes>) -> Self {
        Self {
            tag: channel.tag(),
            payload: payload.into(),
        }
    }

    /// The channel named by the tag, if the tag is defined.
    pub fn channel(&self) -> Option<StreamChannel> {
        StreamChannel::from_tag(self.tag)
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬────────────────┬─────────────┬─────────────────┐
/// │ Type (1B) │ Reserved (3B)  │ Length      │ Payload         │
/// │ 0/1/2     │ 0x00 0x00 0x00 │ (4B BE)     │ (Length bytes)  │
/// └───────────┴────────────────┴─────────────┴─────────────────┘
/// ```
pub fn encode_frame(tag: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| StreamError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(tag);
    dst.put_slice(&[0, 0, 0]);
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. Reserved header
/// bytes are not validated.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<MuxFrame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let tag = src[0];
    let payload_len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;

    if payload_len > max_payload {
        return Err(StreamError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(MuxFrame { tag, payload }))
}

/// Splits a byte stream into terminator-bounded segments.
///
/// Segments are returned without their terminator. At end of stream an
/// unterminated remainder is flushed as a final segment.
#[derive(Debug, Clone)]
pub struct SegmentCodec {
    terminator: u8,
    max_length: usize,
    next_index: usize,
}

impl SegmentCodec {
    /// Create a codec splitting on `terminator`.
    pub fn new(terminator: u8, max_length: usize) -> Self {
        Self {
            terminator,
            max_length,
            next_index: 0,
        }
    }

    /// Newline-delimited segments with the default line limit.
    pub fn lines() -> Self {
        Self::new(b'\n', DEFAULT_MAX_LINE)
    }

    /// The byte this codec splits on.
    pub fn terminator(&self) -> u8 {
        self.terminator
    }
}

impl Decoder for SegmentCodec {
    type Item = Bytes;
    type Error = StreamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        // Only scan bytes that arrived since the last attempt.
        let start = self.next_index.min(src.len());
        match src[start..].iter().position(|b| *b == self.terminator) {
            Some(offset) => {
                let end = start + offset;
                self.next_index = 0;
                if end > self.max_length {
                    return Err(StreamError::LineTooLong {
                        max: self.max_length,
                    });
                }
                let mut segment = src.split_to(end + 1);
                segment.truncate(end);
                Ok(Some(segment.freeze()))
            }
            None if src.len() > self.max_length => Err(StreamError::LineTooLong {
                max: self.max_length,
            }),
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(segment) = self.decode(src)? {
            return Ok(Some(segment));
        }
        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }
        Ok(Some(src.split().freeze()))
    }
}

/// Decodes multiplexed stdout/stderr frames.
#[derive(Debug, Clone)]
pub struct MuxCodec {
    max_payload: usize,
}

impl MuxCodec {
    /// Create a codec with an explicit payload limit.
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for MuxCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decoder for MuxCodec {
    type Item = MuxFrame;
    type Error = StreamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<MuxFrame>> {
        decode_frame(src, self.max_payload)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<MuxFrame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        Err(StreamError::Truncated {
            unit: if src.len() < HEADER_SIZE {
                "header"
            } else {
                "payload"
            },
            pending: src.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio_util::codec::FramedRead;

    use super::*;

    #[test]
    fn encode_matches_wire_layout() {
        let mut buf = BytesMut::new();
        encode_frame(2, b"err", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[2, 0, 0, 0, 0, 0, 0, 3, b'e', b'r', b'r']);
    }

    #[test]
    fn decode_reads_big_endian_length() {
        let mut buf = BytesMut::from(&[1u8, 0, 0, 0, 0, 0, 1, 0][..]);
        buf.extend_from_slice(&[b'x'; 256]);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.channel(), Some(StreamChannel::Stdout));
        assert_eq!(frame.payload.len(), 256);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_ignores_reserved_bytes() {
        let mut buf = BytesMut::from(&[1u8, 0xAA, 0xBB, 0xCC, 0, 0, 0, 2, b'o', b'k'][..]);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[1u8, 0, 0][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(1, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2);
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u8(1);
        buf.put_slice(&[0, 0, 0]);
        buf.put_u32(1024);

        let result = decode_frame(&mut buf, 16);
        assert!(matches!(
            result,
            Err(StreamError::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn empty_payload_is_a_frame() {
        let mut buf = BytesMut::new();
        encode_frame(1, b"", &mut buf).unwrap();
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(frame.wire_size(), HEADER_SIZE);
    }

    #[test]
    fn mux_eof_reports_truncated_header() {
        let mut codec = MuxCodec::default();
        let mut buf = BytesMut::from(&[1u8, 0, 0, 0, 0][..]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            StreamError::Truncated {
                unit: "header",
                pending: 5
            }
        ));
    }

    #[test]
    fn mux_eof_reports_truncated_payload() {
        let mut codec = MuxCodec::default();
        let mut buf = BytesMut::new();
        encode_frame(2, b"cut short", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 3);

        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, StreamError::Truncated { unit: "payload", .. }));
    }

    #[test]
    fn segment_split_across_decodes() {
        let mut codec = SegmentCodec::lines();
        let mut buf = BytesMut::from(&b"{\"a\":"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"1}\n{\"b\":2}\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"{\"a\":1}");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"{\"b\":2}");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn segment_eof_flushes_remainder() {
        let mut codec = SegmentCodec::lines();
        let mut buf = BytesMut::from(&b"first\nlast"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().unwrap().as_ref(), b"first");
        assert_eq!(codec.decode_eof(&mut buf).unwrap().unwrap().as_ref(), b"last");
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn segment_custom_terminator() {
        let mut codec = SegmentCodec::new(0, DEFAULT_MAX_LINE);
        let mut buf = BytesMut::from(&b"a\0b\0"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"a");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"b");
    }

    #[test]
    fn segment_too_long() {
        let mut codec = SegmentCodec::new(b'\n', 4);
        let mut buf = BytesMut::from(&b"abcdefgh"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(StreamError::LineTooLong { max: 4 })
        ));
    }

    #[tokio::test]
    async fn framed_read_over_async_reader() {
        let mut wire = BytesMut::new();
        encode_frame(1, b"out", &mut wire).unwrap();
        encode_frame(2, b"err", &mut wire).unwrap();

        let frames: Vec<_> = FramedRead::new(&wire[..], MuxCodec::default())
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        assert_eq!(
            frames,
            vec![
                MuxFrame::new(StreamChannel::Stdout, &b"out"[..]),
                MuxFrame::new(StreamChannel::Stderr, &b"err"[..]),
            ]
        );
    }
}
