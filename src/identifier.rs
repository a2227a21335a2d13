//! Identifier codec
//!
//! Raw protocol tokens look like `<role>_<logical id...>_<sequence>`. Only the
//! middle portion is stable across the replies belonging to one request, so it
//! is the key everything else correlates on. This module is the only place
//! that knows the token layout.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CorrelationError, Result};

/// Segment delimiter inside raw tokens.
pub const DELIMITER: char = '_';

/// Stable correlation key derived from a raw token.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Wrap an id taken from request context. No validation: an id that was
    /// never ingested simply never matches.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LogicalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Decode a raw token into its logical id.
///
/// Drops the first and last segments and rejoins the rest with [`DELIMITER`].
/// Fails with [`CorrelationError::MalformedIdentifier`] when there are fewer
/// than three segments or the rejoined middle is empty (`"a__b"`).
pub fn decode(raw: &str) -> Result<LogicalId> {
    let segments: Vec<&str> = raw.split(DELIMITER).collect();
    let malformed = || CorrelationError::MalformedIdentifier {
        raw: raw.to_string(),
        segments: segments.len(),
    };

    if segments.len() < 3 {
        return Err(malformed());
    }

    let middle = segments[1..segments.len() - 1].join(&DELIMITER.to_string());
    if middle.is_empty() {
        return Err(malformed());
    }

    Ok(LogicalId(middle))
}

/// Build a raw token for an outgoing request.
pub fn compose(role: &str, id: &LogicalId, sequence: u64) -> String {
    format!("{role}{DELIMITER}{id}{DELIMITER}{sequence}")
}
