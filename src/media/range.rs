//! `Range` header resolution against a known file length.
//!
//! Only the `bytes=start-` and `bytes=start-end` forms are honoured. Suffix
//! ranges (`bytes=-N`) and multi-range requests are rejected as malformed.

use thiserror::Error;

const BYTES_UNIT: &str = "bytes=";

/// A concrete inclusive byte window, with `start <= end < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ResolvedRange {
    /// Number of bytes in the window.
    pub fn chunk_len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// The `Content-Range` header value for this window.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Outcome of resolving a request against a file of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResolution {
    /// No range requested: serve all `total` bytes.
    Full { total: u64 },
    /// Serve exactly the window.
    Partial(ResolvedRange),
    /// The window lies (partly) outside the file.
    Unsatisfiable { total: u64 },
}

/// A `Range` header that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("Range header must use the bytes unit")]
    Unit,
    #[error("Range header has no '-' separator")]
    MissingSeparator,
    #[error("Invalid range start: {0:?}")]
    Start(String),
    #[error("Invalid range end: {0:?}")]
    End(String),
}

/// Resolves an optional `Range` header against a file of `total` bytes.
///
/// # Arguments
///
/// * `header` - The raw `Range` header value, if the request carried one.
/// * `total` - The file length in bytes.
///
/// # Returns
///
/// The resolution, or a `RangeParseError` for a malformed header.
pub fn resolve(header: Option<&str>, total: u64) -> Result<RangeResolution, RangeParseError> {
    let Some(header) = header else {
        return Ok(RangeResolution::Full { total });
    };

    let range_set = header
        .trim()
        .strip_prefix(BYTES_UNIT)
        .ok_or(RangeParseError::Unit)?;

    let (start_raw, end_raw) = range_set
        .split_once('-')
        .ok_or(RangeParseError::MissingSeparator)?;

    let start = parse_offset(start_raw).ok_or_else(|| RangeParseError::Start(start_raw.to_string()))?;

    let end = if end_raw.trim().is_empty() {
        // Open-ended against an empty file has no last byte.
        match total.checked_sub(1) {
            Some(last) => last,
            None => return Ok(RangeResolution::Unsatisfiable { total }),
        }
    } else {
        parse_offset(end_raw).ok_or_else(|| RangeParseError::End(end_raw.to_string()))?
    };

    if start >= total || end >= total || start > end {
        return Ok(RangeResolution::Unsatisfiable { total });
    }

    Ok(RangeResolution::Partial(ResolvedRange { start, end, total }))
}

fn parse_offset(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Digits beyond u64 still name an offset past any file.
    Some(raw.parse().unwrap_or(u64::MAX))
}
