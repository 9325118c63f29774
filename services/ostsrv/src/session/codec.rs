//! Line-delimited JSON frame codec
//!
//! A malformed line is surfaced as [`Inbound::Malformed`] instead of a
//! decoder error: `Framed` stops yielding after the first error, and one bad
//! request must not end the session.

use bytes::BytesMut;
use errors::SimError;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use super::frame::Frame;

/// Longest accepted line; a full snapshot of the default database is ~4 KiB
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// A decoded inbound line
#[derive(Debug)]
pub enum Inbound {
    Frame(Frame),
    /// Line that is not a valid frame, with the parse error
    Malformed(String),
}

#[derive(Debug)]
pub struct FrameCodec {
    lines: LinesCodec,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_FRAME_LEN),
        }
    }

    fn parse(line: String) -> Option<Inbound> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(match serde_json::from_str::<Frame>(line) {
            Ok(frame) => Inbound::Frame(frame),
            Err(e) => Inbound::Malformed(e.to_string()),
        })
    }
}

fn lines_error(err: LinesCodecError) -> SimError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            SimError::transport(format!("frame exceeds {} bytes", MAX_FRAME_LEN))
        },
        LinesCodecError::Io(e) => SimError::Io(e),
    }
}

impl Decoder for FrameCodec {
    type Item = Inbound;
    type Error = SimError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Blank keep-alive lines are skipped without yielding
        while let Some(line) = self.lines.decode(src).map_err(lines_error)? {
            if let Some(inbound) = Self::parse(line) {
                return Ok(Some(inbound));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.lines.decode_eof(src).map_err(lines_error)? {
            if let Some(inbound) = Self::parse(line) {
                return Ok(Some(inbound));
            }
        }
        Ok(None)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = SimError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = serde_json::to_string(&frame)?;
        self.lines.encode(line, dst).map_err(lines_error)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::session::frame::Body;

    #[test]
    fn test_decode_skips_blank_lines_and_waits_for_newline() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("\n\n{\"src\":1,\"dest\":10,\"body\":{\"fc\":\"link_status\"}}");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\n");
        match codec.decode(&mut buf).unwrap() {
            Some(Inbound::Frame(frame)) => assert_eq!(frame.body, Body::LinkStatus),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_line_is_an_item() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("not json\n{\"src\":1,\"dest\":10,\"body\":{\"fc\":\"event_poll\",\"seq\":1}}\n");
        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(Inbound::Malformed(_))
        ));
        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(Inbound::Frame(_))
        ));
    }

    #[test]
    fn test_encode_appends_newline() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(
                Frame {
                    src: 10,
                    dest: 1,
                    body: Body::LinkStatus,
                },
                &mut buf,
            )
            .unwrap();
        assert!(buf.ends_with(b"\n"));
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn test_oversized_line_is_transport_failure() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(vec![b'x'; MAX_FRAME_LEN + 10].as_slice());
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, SimError::TransportFailure(_)));
    }
}
