use super::FrameDecodeError;
use crate::chunker::{FrameKind, RawFrame};

/// Returns the frame text after checking the kind and ASCII encoding.
pub(crate) fn frame_text(frame: &RawFrame, expected: FrameKind) -> Result<&str, FrameDecodeError> {
    if frame.kind() != expected {
        return Err(FrameDecodeError::UnexpectedKind {
            expected,
            actual: frame.kind(),
        });
    }
    frame
        .text()
        .ok_or(FrameDecodeError::NonAscii { kind: expected })
}

/// Strips a one-character sigil and checks the remaining body length.
pub(crate) fn sigil_body<'a>(
    text: &'a str,
    kind: FrameKind,
    allowed_lengths: &[usize],
) -> Result<&'a str, FrameDecodeError> {
    let body = text.get(1..).unwrap_or_default();
    if allowed_lengths.contains(&body.len()) {
        Ok(body)
    } else {
        Err(FrameDecodeError::LengthMismatch {
            kind,
            expected: allowed_lengths.iter().copied().max().unwrap_or_default(),
            actual: body.len(),
        })
    }
}

/// Reads `width` hex characters at `offset` as an unsigned integer.
pub(crate) fn hex_u32(
    text: &str,
    field: &'static str,
    offset: usize,
    width: usize,
) -> Result<u32, FrameDecodeError> {
    let malformed = FrameDecodeError::MalformedField { field, offset };
    let digits = hex_slice(text, offset, width).ok_or(malformed.clone())?;
    u32::from_str_radix(digits, 16).map_err(|_error| malformed)
}

pub(crate) fn hex_u16(
    text: &str,
    field: &'static str,
    offset: usize,
) -> Result<u16, FrameDecodeError> {
    let value = hex_u32(text, field, offset, 4)?;
    u16::try_from(value).map_err(|_error| FrameDecodeError::MalformedField { field, offset })
}

pub(crate) fn hex_u8(text: &str, field: &'static str, offset: usize) -> Result<u8, FrameDecodeError> {
    let value = hex_u32(text, field, offset, 2)?;
    u8::try_from(value).map_err(|_error| FrameDecodeError::MalformedField { field, offset })
}

/// Returns the `width` characters at `offset` when they are all hex digits.
pub(crate) fn hex_slice(text: &str, offset: usize, width: usize) -> Option<&str> {
    text.get(offset..offset + width)
        .filter(|digits| digits.bytes().all(|byte| byte.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn hex_fields_read_at_offsets() {
        assert_eq!(0xC8EF_9FC9, hex_u32("04C8EF9FC9", "time", 2, 8).expect("hex"));
        assert_eq!(0x0FE6, hex_u16("xx0FE6", "light", 2).expect("hex"));
        assert_eq!(0x27, hex_u8("27", "length", 0).expect("hex"));
    }

    #[test]
    fn sign_prefixed_digits_are_malformed() {
        assert_matches!(
            hex_u16("+FE6", "light", 0),
            Err(FrameDecodeError::MalformedField {
                field: "light",
                offset: 0
            })
        );
    }

    #[test]
    fn short_text_is_malformed() {
        assert_matches!(
            hex_u32("0F", "time", 0, 8),
            Err(FrameDecodeError::MalformedField { .. })
        );
    }

    #[test]
    fn frame_text_checks_kind() {
        let frame = RawFrame::new(FrameKind::Error, b"?01".to_vec());
        assert_matches!(
            frame_text(&frame, FrameKind::Record),
            Err(FrameDecodeError::UnexpectedKind {
                expected: FrameKind::Record,
                actual: FrameKind::Error
            })
        );
    }
}
