use std::fmt::Write as _;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Renders serial bytes as a single printable line for logs.
///
/// Printable ASCII passes through; the terminator and any other byte are
/// escaped.
pub(crate) fn printable(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }

    let mut rendered = String::with_capacity(bytes.len());
    for byte in bytes {
        match byte {
            b'\r' => rendered.push_str("\\r"),
            b'\n' => rendered.push_str("\\n"),
            0x20..=0x7E => rendered.push(char::from(*byte)),
            other => {
                let _ = write!(rendered, "\\x{other:02X}");
            }
        }
    }
    rendered
}

/// Formats an instrument timestamp as RFC 3339.
pub(crate) fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_error| at.to_string())
}
