mod matchers;

use std::collections::VecDeque;

use serde::Serialize;
use strum_macros::{Display, EnumIter};
use tracing::{instrument, trace};

use crate::utils::printable;

pub(crate) use self::matchers::{CONFIG_FRAME_LEN, is_bare_config};

/// Retained tail when the buffer holds no frame at all; longer than any frame.
const MAX_UNMATCHED_BUFFER: usize = 4 * 1024;
const RETAINED_TAIL: usize = 1024;

/// Recognised frame shapes on the instrument serial link.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// `*` data or control record.
    #[strum(to_string = "record")]
    Record,
    /// `:` device status.
    #[strum(to_string = "device_status")]
    DeviceStatus,
    /// `C` positional configuration dump.
    #[strum(to_string = "config")]
    Config,
    /// `!` immediate status byte.
    #[strum(to_string = "immediate_status")]
    ImmediateStatus,
    /// `?` instrument error code.
    #[strum(to_string = "error")]
    Error,
    /// Terminated line carrying no frame sigil.
    #[strum(to_string = "prompt")]
    Prompt,
}

/// One complete frame cut from the byte stream, terminator excluded.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawFrame {
    kind: FrameKind,
    bytes: Vec<u8>,
}

impl RawFrame {
    /// Creates a frame of `kind` from its text bytes.
    ///
    /// ```
    /// use sami::{FrameKind, RawFrame};
    ///
    /// let frame = RawFrame::new(FrameKind::Error, b"?01".to_vec());
    /// assert_eq!(FrameKind::Error, frame.kind());
    /// assert_eq!(Some("?01"), frame.text());
    /// ```
    #[must_use]
    pub fn new(kind: FrameKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    /// Frame shape.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Frame bytes without the terminator.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame bytes as text, when they are ASCII.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        if self.bytes.is_ascii() {
            std::str::from_utf8(&self.bytes).ok()
        } else {
            None
        }
    }
}

/// Segments an unbounded byte stream into complete frames.
///
/// Every `feed` re-runs all matchers over the whole buffer. Bytes in front of
/// and between matches are discarded; bytes after the last match stay buffered
/// for the next `feed`.
///
/// ```
/// use sami::{Chunker, FrameKind};
///
/// let mut chunker = Chunker::new();
/// chunker.feed(b"noise:003F91BE");
/// assert!(chunker.next_frame().is_none());
///
/// chunker.feed(b"\r?01\r");
/// assert_eq!(Some(FrameKind::DeviceStatus), chunker.next_frame().map(|frame| frame.kind()));
/// assert_eq!(Some(FrameKind::Error), chunker.next_frame().map(|frame| frame.kind()));
/// assert!(chunker.next_frame().is_none());
/// ```
#[derive(Debug, Default)]
pub struct Chunker {
    buffer: Vec<u8>,
    ready: VecDeque<RawFrame>,
}

impl Chunker {
    /// Creates an empty chunker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw input and extracts every frame it completes.
    #[instrument(skip_all, level = "trace", fields(input_len = bytes.len()))]
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        let mut consumed = 0;
        for found in matchers::find_all_kinds(&self.buffer) {
            if found.span.start < consumed {
                continue;
            }
            if found.span.start > consumed {
                trace!(
                    noise = %printable(&self.buffer[consumed..found.span.start]),
                    "discarding unframed bytes"
                );
            }
            let body = found.body();
            self.ready
                .push_back(RawFrame::new(found.kind, self.buffer[body].to_vec()));
            consumed = found.span.end;
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        } else if self.buffer.len() > MAX_UNMATCHED_BUFFER {
            let excess = self.buffer.len() - RETAINED_TAIL;
            trace!(dropped = excess, "unmatched buffer exceeded cap");
            self.buffer.drain(..excess);
        }
    }

    /// Pops the oldest complete frame.
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        self.ready.pop_front()
    }

    /// Bytes still waiting for a frame to complete.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drops buffered bytes and queued frames.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.ready.clear();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::protocol::TERMINATOR;
    use crate::test_fixtures::{CONFIG_FRAME, RECORD_FRAME, STATUS_FRAME};

    fn framed(text: &str) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(TERMINATOR);
        bytes
    }

    fn drain(chunker: &mut Chunker) -> Vec<RawFrame> {
        std::iter::from_fn(|| chunker.next_frame()).collect()
    }

    #[test]
    fn whole_frame_is_emitted_once() {
        let mut chunker = Chunker::new();
        chunker.feed(&framed(RECORD_FRAME));

        let frames = drain(&mut chunker);
        assert_eq!(
            vec![RawFrame::new(FrameKind::Record, RECORD_FRAME.as_bytes().to_vec())],
            frames
        );
        assert!(chunker.pending().is_empty());
    }

    #[test]
    fn distinct_shapes_with_noise_are_emitted_in_order() {
        let mut input = b"zz#".to_vec();
        input.extend(framed(STATUS_FRAME));
        input.extend(b"~~noise~~");
        input.extend(framed(RECORD_FRAME));

        let mut chunker = Chunker::new();
        chunker.feed(&input);

        let kinds: Vec<FrameKind> = drain(&mut chunker).iter().map(RawFrame::kind).collect();
        assert_eq!(vec![FrameKind::DeviceStatus, FrameKind::Record], kinds);
        assert!(chunker.pending().is_empty());
    }

    #[test]
    fn trailing_partial_frame_stays_buffered() {
        let mut input = framed(STATUS_FRAME);
        input.extend(&CONFIG_FRAME.as_bytes()[..40]);

        let mut chunker = Chunker::new();
        chunker.feed(&input);
        assert_eq!(1, drain(&mut chunker).len());
        assert_eq!(&CONFIG_FRAME.as_bytes()[..40], chunker.pending());

        chunker.feed(&framed(&CONFIG_FRAME[40..]));
        let frames = drain(&mut chunker);
        assert_eq!(1, frames.len());
        assert_eq!(FrameKind::Config, frames[0].kind());
        assert_eq!(CONFIG_FRAME.as_bytes(), frames[0].bytes());
    }

    #[test]
    fn bare_terminator_after_frame_is_an_empty_prompt() {
        let mut input = framed(STATUS_FRAME);
        input.push(TERMINATOR);

        let mut chunker = Chunker::new();
        chunker.feed(&input);

        let frames = drain(&mut chunker);
        assert_eq!(2, frames.len());
        assert_eq!(RawFrame::new(FrameKind::Prompt, Vec::new()), frames[1]);
    }

    #[test]
    fn garbage_without_frames_is_capped() {
        let mut chunker = Chunker::new();
        chunker.feed(&vec![b'#'; MAX_UNMATCHED_BUFFER + 10]);
        assert_eq!(RETAINED_TAIL, chunker.pending().len());
    }

    #[test]
    fn reset_clears_state() {
        let mut chunker = Chunker::new();
        chunker.feed(&framed(STATUS_FRAME));
        chunker.feed(b":00");
        chunker.reset();
        assert!(chunker.next_frame().is_none());
        assert!(chunker.pending().is_empty());
    }

    proptest! {
        #[test]
        fn split_feed_matches_whole_feed(split in 0usize..=81) {
            let input = framed(RECORD_FRAME);
            let mut whole = Chunker::new();
            whole.feed(&input);

            let mut parts = Chunker::new();
            parts.feed(&input[..split]);
            parts.feed(&input[split..]);

            let expected = drain(&mut whole);
            let actual = drain(&mut parts);
            prop_assert_eq!(1, actual.len());
            prop_assert_eq!(expected, actual);
        }

        #[test]
        fn split_config_feed_emits_one_frame(split in 0usize..=233) {
            let input = framed(CONFIG_FRAME);
            let mut chunker = Chunker::new();
            chunker.feed(&input[..split]);
            chunker.feed(&input[split..]);

            let frames = drain(&mut chunker);
            prop_assert_eq!(1, frames.len());
            prop_assert_eq!(FrameKind::Config, frames[0].kind());
        }
    }
}
