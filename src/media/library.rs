use std::path::{Component, Path, PathBuf};

use crate::{
    error::{AppError, Result},
    models::media::{MediaEntry, MediaKind},
};

/// The on-disk music collection: one directory per language.
#[derive(Clone, Debug)]
pub struct MediaLibrary {
    root: PathBuf,
    public_url: String,
}

impl MediaLibrary {
    /// Creates a new `MediaLibrary`.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory holding the language directories.
    /// * `public_url` - Absolute base URL used in listing entries.
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The collection root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `{root}/{language}/{filename}`.
    ///
    /// Both parts must be single, normal path components.
    pub fn file_path(&self, language: &str, filename: &str) -> Result<PathBuf> {
        let language = safe_segment(language)?;
        let filename = safe_segment(filename)?;
        Ok(self.root.join(language).join(filename))
    }

    /// Lists the supported media files of a language directory.
    ///
    /// # Arguments
    ///
    /// * `language` - The language directory to scan.
    ///
    /// # Returns
    ///
    /// The entries sorted by name, or `AppError::DirectoryScan` when the
    /// directory cannot be read.
    pub async fn list(&self, language: &str) -> Result<Vec<MediaEntry>> {
        let language = safe_segment(language)?;
        let dir = self.root.join(language);

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(AppError::DirectoryScan)?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(AppError::DirectoryScan)? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!("Skipping non UTF-8 entry in {}", dir.display());
                continue;
            };

            if MediaKind::from_filename(&name).is_none() {
                continue;
            }

            let file_type = entry.file_type().await.map_err(AppError::DirectoryScan)?;
            if file_type.is_dir() {
                continue;
            }

            entries.push(MediaEntry {
                url: self.url_for(language, &name),
                name,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// The absolute URL a file is served from.
    pub fn url_for(&self, language: &str, filename: &str) -> String {
        format!(
            "{}/music/{}/{}",
            self.public_url,
            urlencoding::encode(language),
            urlencoding::encode(filename)
        )
    }
}

/// Accepts `segment` only if it is exactly one normal path component.
fn safe_segment(segment: &str) -> Result<&str> {
    let invalid = || AppError::Validation(format!("Invalid path segment: {:?}", segment));

    if segment.is_empty() || segment.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }

    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(segment),
        _ => Err(invalid()),
    }
}
