//! Escaping for Telegram MarkdownV2 message bodies.
//!
//! Any text that is not part of a fixed message template (file paths, error
//! messages) must pass through [`escape_markdown_v2`] exactly once before it is
//! embedded in an outgoing message. Escaping twice produces doubled markers.

/// Characters that carry meaning in MarkdownV2 and must be prefixed with `\`.
pub const RESERVED_CHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// The escape marker inserted before each reserved character.
pub const ESCAPE_MARKER: char = '\\';

/// Returns true if `c` must be escaped.
#[must_use]
pub fn is_reserved(c: char) -> bool {
    RESERVED_CHARS.contains(&c)
}

/// Escapes every reserved character in `text` with a preceding backslash.
///
/// All other characters are preserved in order, so the output length in chars
/// is always `text.chars().count()` plus the number of reserved characters.
///
/// # Example
///
/// ```
/// use tripwire_monitor::escape::escape_markdown_v2;
///
/// assert_eq!(escape_markdown_v2("report_v1.exe"), r"report\_v1\.exe");
/// ```
#[must_use]
pub fn escape_markdown_v2(text: &str) -> String {
    let reserved = text.chars().filter(|c| is_reserved(*c)).count();
    let mut escaped = String::with_capacity(text.len() + reserved);

    for c in text.chars() {
        if is_reserved(c) {
            escaped.push(ESCAPE_MARKER);
        }
        escaped.push(c);
    }

    escaped
}
