//! Request tag framing
//!
//! Every request carries its sequence tag and every response is expected to
//! echo it back, so out-of-order replies can be matched to their request.

use crate::channel::error::{ChannelError, ChannelResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Fixed datagram template `{"c":0}`; the tag digit sits at [`BINARY_TAG_OFFSET`]
const BINARY_TEMPLATE: [u8; 7] = [b'{', b'"', b'c', b'"', b':', b'0', b'}'];
pub const BINARY_TAG_OFFSET: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Text frame `{"c":<tag>}`; replies may add fields such as `"ts"`
    Json,
    /// 7-byte frame with the ASCII digit of the tag at offset 5 (tags 0-9 only)
    Binary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaggedFrame {
    pub c: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

impl WireFormat {
    pub fn encode_request(self, tag: usize) -> ChannelResult<Bytes> {
        match self {
            WireFormat::Json => {
                let frame = TaggedFrame { c: tag, ts: None };
                serde_json::to_vec(&frame)
                    .map(Bytes::from)
                    .map_err(|_| ChannelError::TagUnencodable(tag))
            }
            WireFormat::Binary => {
                if tag > 9 {
                    return Err(ChannelError::TagUnencodable(tag));
                }
                let mut frame = BINARY_TEMPLATE;
                frame[BINARY_TAG_OFFSET] = b'0' + tag as u8;
                Ok(Bytes::copy_from_slice(&frame))
            }
        }
    }

    /// Extract the echoed tag, `None` when the frame carries no usable tag
    pub fn decode_tag(self, frame: &[u8]) -> Option<usize> {
        match self {
            WireFormat::Json => serde_json::from_slice::<TaggedFrame>(frame)
                .ok()
                .map(|f| f.c),
            WireFormat::Binary => match frame.get(BINARY_TAG_OFFSET) {
                Some(digit) if digit.is_ascii_digit() => Some((digit - b'0') as usize),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_request_shape() {
        let frame = WireFormat::Json.encode_request(42).unwrap();
        assert_eq!(&frame[..], br#"{"c":42}"#);
    }

    #[test]
    fn test_json_reply_with_server_timestamp() {
        let tag = WireFormat::Json.decode_tag(br#"{"c":7,"ts":1700000000000}"#);
        assert_eq!(tag, Some(7));
        assert_eq!(WireFormat::Json.decode_tag(b"not json"), None);
        assert_eq!(WireFormat::Json.decode_tag(br#"{"x":1}"#), None);
    }

    #[test]
    fn test_binary_frame_layout() {
        let frame = WireFormat::Binary.encode_request(3).unwrap();
        assert_eq!(&frame[..], &[123, 34, 99, 34, 58, 51, 125]);
        assert_eq!(WireFormat::Binary.decode_tag(&frame), Some(3));
    }

    #[test]
    fn test_binary_rejects_multi_digit_tags() {
        assert!(WireFormat::Binary.encode_request(9).is_ok());
        assert!(matches!(
            WireFormat::Binary.encode_request(10),
            Err(ChannelError::TagUnencodable(10))
        ));
    }

    #[test]
    fn test_binary_short_or_garbled_frame() {
        assert_eq!(WireFormat::Binary.decode_tag(b"{\"c\""), None);
        assert_eq!(WireFormat::Binary.decode_tag(b"{\"c\":x}"), None);
    }
}
