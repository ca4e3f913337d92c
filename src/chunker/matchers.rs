use std::ops::Range;

use strum::IntoEnumIterator;

use super::FrameKind;
use crate::protocol::TERMINATOR;

/// Total characters in a configuration frame, sigil included.
pub(crate) const CONFIG_FRAME_LEN: usize = 232;

const RECORD_SIGIL: u8 = b'*';
const STATUS_SIGIL: u8 = b':';
const ERROR_SIGIL: u8 = b'?';
const IMMEDIATE_SIGIL: u8 = b'!';
const CONFIG_SIGIL: u8 = b'C';
const SIGILS: [u8; 4] = [RECORD_SIGIL, STATUS_SIGIL, ERROR_SIGIL, IMMEDIATE_SIGIL];

/// Accepted device-status body lengths: time only, time plus status word, full.
const STATUS_BODY_LENS: [usize; 3] = [8, 12, 32];

/// One located frame inside a buffer.
///
/// `span` covers the frame text and its terminator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct FrameMatch {
    pub(crate) kind: FrameKind,
    pub(crate) span: Range<usize>,
}

impl FrameMatch {
    /// Byte range of the frame text without the terminator.
    pub(crate) fn body(&self) -> Range<usize> {
        self.span.start..self.span.end - 1
    }
}

/// Returns every non-overlapping, leftmost-first match of `kind` in `buffer`.
pub(crate) fn find_all(kind: FrameKind, buffer: &[u8]) -> Vec<FrameMatch> {
    let mut matches = Vec::new();
    let mut cursor = 0;
    while cursor < buffer.len() {
        match match_at(kind, buffer, cursor) {
            Some(end) => {
                matches.push(FrameMatch {
                    kind,
                    span: cursor..end,
                });
                cursor = end;
            }
            None => cursor += 1,
        }
    }
    matches
}

/// Runs every matcher over `buffer` and pools the results by start offset.
///
/// Matches sharing a start offset are ordered longest first.
pub(crate) fn find_all_kinds(buffer: &[u8]) -> Vec<FrameMatch> {
    let mut pooled: Vec<FrameMatch> = FrameKind::iter()
        .flat_map(|kind| find_all(kind, buffer))
        .collect();
    pooled.sort_by(|left, right| {
        left.span
            .start
            .cmp(&right.span.start)
            .then(right.span.end.cmp(&left.span.end))
    });
    pooled
}

/// Attempts to match one frame of `kind` starting exactly at `start`.
///
/// Returns the exclusive end offset (past the terminator) on success. A frame
/// whose terminator has not arrived yet never matches.
pub(crate) fn match_at(kind: FrameKind, buffer: &[u8], start: usize) -> Option<usize> {
    match kind {
        FrameKind::Record => match_record(buffer, start),
        FrameKind::DeviceStatus => match_device_status(buffer, start),
        FrameKind::Config => match_config(buffer, start),
        FrameKind::ImmediateStatus => match_sigil_hex(buffer, start, IMMEDIATE_SIGIL, 2),
        FrameKind::Error => match_sigil_hex(buffer, start, ERROR_SIGIL, 2),
        FrameKind::Prompt => match_prompt(buffer, start),
    }
}

/// Returns whether `line` is a configuration body without its `C` sigil
/// requirement: exactly 232 hexadecimal characters.
pub(crate) fn is_bare_config(line: &[u8]) -> bool {
    line.len() == CONFIG_FRAME_LEN && line.iter().all(u8::is_ascii_hexdigit)
}

fn hex_run(buffer: &[u8], start: usize) -> usize {
    buffer
        .get(start..)
        .map_or(0, |rest| rest.iter().take_while(|byte| byte.is_ascii_hexdigit()).count())
}

fn terminator_at(buffer: &[u8], index: usize) -> bool {
    buffer.get(index) == Some(&TERMINATOR)
}

fn match_record(buffer: &[u8], start: usize) -> Option<usize> {
    if buffer.get(start) != Some(&RECORD_SIGIL) {
        return None;
    }
    let body_start = start + 1;
    let run = hex_run(buffer, body_start);
    if run < 6 {
        return None;
    }
    let length_text = std::str::from_utf8(&buffer[body_start + 2..body_start + 4]).ok()?;
    let record_length = usize::from_str_radix(length_text, 16).ok()?;
    let body_len = 2 + 2 * record_length;
    if run != body_len || !terminator_at(buffer, body_start + body_len) {
        return None;
    }
    Some(body_start + body_len + 1)
}

fn match_device_status(buffer: &[u8], start: usize) -> Option<usize> {
    if buffer.get(start) != Some(&STATUS_SIGIL) {
        return None;
    }
    let run = hex_run(buffer, start + 1);
    if !STATUS_BODY_LENS.contains(&run) || !terminator_at(buffer, start + 1 + run) {
        return None;
    }
    Some(start + run + 2)
}

fn match_config(buffer: &[u8], start: usize) -> Option<usize> {
    if buffer.get(start) != Some(&CONFIG_SIGIL) {
        return None;
    }
    if start > 0 && buffer[start - 1].is_ascii_hexdigit() {
        return None;
    }
    if hex_run(buffer, start) != CONFIG_FRAME_LEN || !terminator_at(buffer, start + CONFIG_FRAME_LEN)
    {
        return None;
    }
    Some(start + CONFIG_FRAME_LEN + 1)
}

fn match_sigil_hex(buffer: &[u8], start: usize, sigil: u8, digits: usize) -> Option<usize> {
    if buffer.get(start) != Some(&sigil) {
        return None;
    }
    if hex_run(buffer, start + 1) != digits || !terminator_at(buffer, start + 1 + digits) {
        return None;
    }
    Some(start + digits + 2)
}

fn match_prompt(buffer: &[u8], start: usize) -> Option<usize> {
    if start > 0 && buffer[start - 1] != TERMINATOR {
        return None;
    }
    let line_len = buffer
        .get(start..)?
        .iter()
        .position(|byte| *byte == TERMINATOR)?;
    let line = &buffer[start..start + line_len];
    if line.iter().any(|byte| SIGILS.contains(byte)) {
        return None;
    }
    if line.first() == Some(&CONFIG_SIGIL) && is_bare_config(line) {
        return None;
    }
    Some(start + line_len + 1)
}
