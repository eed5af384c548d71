//! Query normalization and the substring matcher.
//!
//! A query is one client line with its terminator stripped, truncated to
//! [`MAX_KEY_LENGTH`] bytes. Matching is case-sensitive byte containment
//! against a record's name or message field; there is no regex, case
//! folding, or ranking.

use crate::store::Record;

/// Maximum length of a search key in bytes. Longer queries are silently
/// truncated, never rejected.
pub const MAX_KEY_LENGTH: usize = 5;

/// Normalize one raw client line into a search key.
///
/// Strips a single trailing `\n` (and a `\r` directly before it, so
/// CRLF clients behave the same), then truncates to [`MAX_KEY_LENGTH`].
pub fn normalize(line: &[u8]) -> &[u8] {
    let mut key = line;
    if key.last() == Some(&b'\n') {
        key = &key[..key.len() - 1];
    }
    if key.last() == Some(&b'\r') {
        key = &key[..key.len() - 1];
    }
    &key[..key.len().min(MAX_KEY_LENGTH)]
}

/// Whether `record` matches `key`: the key occurs as a substring of the
/// name or the message field. The empty key matches every record.
pub fn matches(record: &Record, key: &[u8]) -> bool {
    contains(record.name(), key) || contains(record.message(), key)
}

/// Case-sensitive byte substring containment.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
