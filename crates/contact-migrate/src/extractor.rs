//! Extension identifier extraction
//!
//! A feature value holds one or more hex-encoded tokens separated by any of
//! [`EXTENSION_DELIMITERS`]. Each token decodes to UTF-8 text of the form
//! `<prefix>.<identifier>[.<rest>]`; the identifier is the second
//! `.`-separated segment.
//!
//! ```text
//! 48656c6c6f2e343432  ->  "Hello.442"  ->  442
//! ```
//!
//! The same rule ships as the `extract_extension_ids(text)` SQL function in
//! `migrations/`, and both must agree on every input. Tokens that cannot be
//! decoded are skipped with a warning; nothing in here is fatal.

use tracing::warn;

use crate::config::{EXTENSION_DELIMITERS, FEATURE_SEGMENT_SEPARATOR, SIGNED_TOKEN_PREFIX};

/// What became of a single token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOutcome {
    /// Decoded to an identifier
    Extracted(i64),
    /// Starts with `+`, a different encoding
    SignedPrefix,
    /// Not an even-length run of hex digits
    InvalidHex,
    /// Bytes are not UTF-8 text PostgreSQL can hold (invalid sequence or NUL)
    InvalidUtf8,
    /// Decoded text has no second `.` segment
    MissingSegment,
    /// Second segment is not a 64-bit integer
    InvalidInteger,
}

impl TokenOutcome {
    pub fn identifier(self) -> Option<i64> {
        match self {
            TokenOutcome::Extracted(id) => Some(id),
            _ => None,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            TokenOutcome::Extracted(_) => "extracted",
            TokenOutcome::SignedPrefix => "signed token uses another encoding",
            TokenOutcome::InvalidHex => "invalid hex",
            TokenOutcome::InvalidUtf8 => "decoded bytes are not valid UTF-8 text",
            TokenOutcome::MissingSegment => "decoded text has fewer than two segments",
            TokenOutcome::InvalidInteger => "second segment is not an integer",
        }
    }
}

/// Split a raw feature value into non-empty tokens trimmed of ASCII whitespace.
///
/// Delimiters are applied one after another, each to every fragment the
/// previous one produced, so token order follows the input.
pub fn tokenize(raw: &str) -> Vec<&str> {
    let mut fragments = vec![raw];
    for delimiter in EXTENSION_DELIMITERS {
        fragments = fragments
            .into_iter()
            .flat_map(|fragment| fragment.split(delimiter))
            .collect();
    }

    fragments
        .into_iter()
        .map(|token| token.trim_matches(|c: char| c.is_ascii_whitespace()))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Decode one already-trimmed token
pub fn decode_token(token: &str) -> TokenOutcome {
    if token.starts_with(SIGNED_TOKEN_PREFIX) {
        return TokenOutcome::SignedPrefix;
    }

    let bytes = match hex::decode(token) {
        Ok(bytes) => bytes,
        Err(_) => return TokenOutcome::InvalidHex,
    };

    let text = match String::from_utf8(bytes) {
        Ok(text) if !text.contains('\0') => text,
        _ => return TokenOutcome::InvalidUtf8,
    };

    let Some(segment) = text.split(FEATURE_SEGMENT_SEPARATOR).nth(1) else {
        return TokenOutcome::MissingSegment;
    };

    match segment.parse::<i64>() {
        Ok(id) => TokenOutcome::Extracted(id),
        Err(_) => TokenOutcome::InvalidInteger,
    }
}

/// Tokenize and decode, keeping every token alongside its outcome
pub fn decode_tokens(raw: &str) -> Vec<(&str, TokenOutcome)> {
    tokenize(raw)
        .into_iter()
        .map(|token| (token, decode_token(token)))
        .collect()
}

/// Extract every identifier embedded in a feature value, in token order.
///
/// Absent or empty input yields an empty vector. Duplicates are kept.
pub fn extract_extension_ids(raw: Option<&str>) -> Vec<i64> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };

    let mut ids = Vec::new();
    for (token, outcome) in decode_tokens(raw) {
        match outcome {
            TokenOutcome::Extracted(id) => ids.push(id),
            _ => warn!(token, reason = outcome.reason(), "Skipping feature value token"),
        }
    }

    ids
}
