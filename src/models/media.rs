use serde::Serialize;
use std::path::Path;

/// The media types the service streams, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Mp3,
    Aac,
}

impl MediaKind {
    /// Derives the media kind from a filename's extension (case-insensitive).
    ///
    /// # Arguments
    ///
    /// * `filename` - The filename to inspect.
    ///
    /// # Returns
    ///
    /// `Some(MediaKind)` for `.mp3` and `.aac`, `None` for anything else.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("mp3") {
            Some(MediaKind::Mp3)
        } else if ext.eq_ignore_ascii_case("aac") {
            Some(MediaKind::Aac)
        } else {
            None
        }
    }

    /// The `Content-Type` served for this kind.
    pub fn content_type(self) -> &'static str {
        match self {
            MediaKind::Mp3 => "audio/mpeg",
            MediaKind::Aac => "audio/aac",
        }
    }
}

/// A listing entry for one media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaEntry {
    /// The filename inside its language directory.
    pub name: String,
    /// Absolute URL the file can be fetched from.
    pub url: String,
}
