//! Cursor codec.
//!
//! A cursor is the lowercase hex encoding of `cursor:<decimal row id>`. Callers
//! must treat it as opaque; only this module knows the format.

use crate::error::{FeedError, Result};
use crate::types::RowId;
use serde::{Deserialize, Serialize};
use std::fmt;

const CURSOR_PREFIX: &str = "cursor:";

// Decode bound for untrusted cursor input.
const MAX_CURSOR_TOKEN_LEN: usize = 256;

/// Opaque pagination cursor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encode a row id.
    pub fn encode(id: RowId) -> Self {
        Cursor(hex::encode(format!("{}{}", CURSOR_PREFIX, id.0)))
    }

    /// Decode back to the row id this cursor was made from.
    pub fn decode(&self) -> Result<RowId> {
        decode(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}

/// Encode a row id as an opaque cursor.
pub fn encode(id: RowId) -> Cursor {
    Cursor::encode(id)
}

/// Decode a caller-supplied cursor token.
///
/// Fails with [`FeedError::InvalidCursor`] for anything [`encode`] could not
/// have produced. Surrounding whitespace is trimmed.
pub fn decode(token: &str) -> Result<RowId> {
    let token = token.trim();

    if token.is_empty() {
        return Err(FeedError::InvalidCursor("cursor is empty".into()));
    }
    if token.len() > MAX_CURSOR_TOKEN_LEN {
        return Err(FeedError::InvalidCursor(format!(
            "cursor exceeds max length: {} chars (max {})",
            token.len(),
            MAX_CURSOR_TOKEN_LEN
        )));
    }

    let bytes = hex::decode(token)
        .map_err(|e| FeedError::InvalidCursor(format!("cursor is not valid hex: {}", e)))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|_| FeedError::InvalidCursor("cursor is not valid UTF-8".into()))?;
    let digits = text
        .strip_prefix(CURSOR_PREFIX)
        .ok_or_else(|| FeedError::InvalidCursor("cursor has an unknown format".into()))?;

    // Canonical decimal only: no sign, no leading zeros.
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !canonical {
        return Err(FeedError::InvalidCursor("cursor does not hold a row id".into()));
    }

    digits
        .parse::<u64>()
        .map(RowId)
        .map_err(|_| FeedError::InvalidCursor("cursor row id is out of range".into()))
}
