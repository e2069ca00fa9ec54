//! Operator diagnostics.
//!
//! Log sinks of monitoring cores accept one line per message and cut long
//! messages at 4 KiB. Diagnostics are shaped to fit before they are emitted.

use std::borrow::Cow;

/// Largest diagnostic line in bytes, excluding any terminator.
pub const MAX_DIAGNOSTIC_BYTES: usize = 4095;

/// Render `msg` as a single line of at most [`MAX_DIAGNOSTIC_BYTES`] bytes.
///
/// Line breaks become spaces and overlong messages are cut at a character
/// boundary. Messages that already fit are returned unchanged.
#[must_use]
pub fn bounded_line(msg: &str) -> Cow<'_, str> {
    let single_line = if msg.contains(['\n', '\r']) {
        Cow::Owned(msg.replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(msg)
    };

    if single_line.len() <= MAX_DIAGNOSTIC_BYTES {
        return single_line;
    }

    let mut end = MAX_DIAGNOSTIC_BYTES;
    while !single_line.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(single_line[..end].to_string())
}
