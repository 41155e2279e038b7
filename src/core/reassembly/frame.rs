//! Wire-level frame parsing for the out-of-band data channel.
//!
//! Each frame is UTF-8 text with four pipe-delimited fields:
//!
//! ```text
//! <message_id>|<part_index>|<total_parts-or-"???">|<content>
//! ```
//!
//! `content` is a contiguous slice of a larger base64 string; slice
//! boundaries are arbitrary and need not align to base64 quanta, so a single
//! fragment is not independently decodable.

use thiserror::Error;

/// Literal token a sender uses when it does not know the part count.
pub const UNKNOWN_TOTAL_PARTS: &str = "???";

/// Number of pipe-delimited fields in a well-formed frame.
const FRAME_FIELD_COUNT: usize = 4;

/// One parsed fragment of a larger message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFragment {
    /// Opaque message id, scoped to the sending participant.
    pub message_id: String,
    /// 0-based position of this fragment within the message.
    pub part_index: u32,
    /// Total number of fragments in the message (always >= 1).
    pub total_parts: u32,
    /// Base64 slice carried by this fragment.
    pub content: String,
}

/// Errors raised while parsing a raw frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame did not split into exactly four fields.
    #[error("malformed frame: expected {FRAME_FIELD_COUNT} fields, got {fields}")]
    MalformedFrame {
        /// Number of fields actually present.
        fields: usize,
    },

    /// `part_index` or `total_parts` was not a parseable non-negative integer.
    #[error("malformed frame: {field} is not a valid index: {value:?}")]
    InvalidIndex {
        /// Which field failed to parse.
        field: &'static str,
        /// The offending raw value.
        value: String,
    },

    /// `total_parts` was zero; a message always has at least one part.
    #[error("malformed frame: total_parts must be >= 1")]
    ZeroTotalParts,

    /// The sender used the unknown-total sentinel. Completion can never be
    /// detected without a target count, so such fragments are unbufferable.
    #[error("unknown total parts for message {message_id:?}; fragment dropped")]
    UnknownTotalParts {
        /// Message id the dropped fragment belonged to.
        message_id: String,
    },
}

/// Parse one raw frame into a [`FrameFragment`].
///
/// Fails closed: any shape problem yields a [`FrameError`] and the caller
/// drops the frame without buffering anything.
pub fn parse_frame(raw: &str) -> Result<FrameFragment, FrameError> {
    let fields: Vec<&str> = raw.split('|').collect();
    if fields.len() != FRAME_FIELD_COUNT {
        return Err(FrameError::MalformedFrame {
            fields: fields.len(),
        });
    }

    let message_id = fields[0];
    let part_index: u32 = fields[1].parse().map_err(|_| FrameError::InvalidIndex {
        field: "part_index",
        value: fields[1].to_string(),
    })?;

    if fields[2] == UNKNOWN_TOTAL_PARTS {
        return Err(FrameError::UnknownTotalParts {
            message_id: message_id.to_string(),
        });
    }
    let total_parts: u32 = fields[2].parse().map_err(|_| FrameError::InvalidIndex {
        field: "total_parts",
        value: fields[2].to_string(),
    })?;
    if total_parts == 0 {
        return Err(FrameError::ZeroTotalParts);
    }

    Ok(FrameFragment {
        message_id: message_id.to_string(),
        part_index,
        total_parts,
        content: fields[3].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_frame() {
        let frag = parse_frame("msg-1|0|2|QUJD").unwrap();
        assert_eq!(frag.message_id, "msg-1");
        assert_eq!(frag.part_index, 0);
        assert_eq!(frag.total_parts, 2);
        assert_eq!(frag.content, "QUJD");
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!(matches!(
            parse_frame("msg-1|0|2"),
            Err(FrameError::MalformedFrame { fields: 3 })
        ));
        assert!(matches!(
            parse_frame("msg-1|0|2|abc|extra"),
            Err(FrameError::MalformedFrame { fields: 5 })
        ));
        assert!(matches!(
            parse_frame(""),
            Err(FrameError::MalformedFrame { fields: 1 })
        ));
    }

    #[test]
    fn test_parse_rejects_non_numeric_indices() {
        assert!(matches!(
            parse_frame("msg-1|x|2|abc"),
            Err(FrameError::InvalidIndex {
                field: "part_index",
                ..
            })
        ));
        assert!(matches!(
            parse_frame("msg-1|0|-2|abc"),
            Err(FrameError::InvalidIndex {
                field: "total_parts",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_rejects_zero_total_parts() {
        assert!(matches!(
            parse_frame("msg-1|0|0|abc"),
            Err(FrameError::ZeroTotalParts)
        ));
    }

    #[test]
    fn test_parse_detects_unknown_total_sentinel() {
        match parse_frame("m2|0|???|abc") {
            Err(FrameError::UnknownTotalParts { message_id }) => {
                assert_eq!(message_id, "m2");
            }
            other => panic!("expected UnknownTotalParts, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_allows_empty_content_field() {
        // An empty slice is shape-valid; emptiness is handled downstream by
        // the emission gate, not the wire parser.
        let frag = parse_frame("msg-1|0|1|").unwrap();
        assert_eq!(frag.content, "");
    }
}
