use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tokio_util::io::ReaderStream;

use crate::{
    error::{AppError, Result},
    media::range::{RangeResolution, ResolvedRange},
    models::media::MediaKind,
};

/// Read size for each chunk forwarded to the client.
const CHUNK_SIZE: usize = 64 * 1024;

/// An open media file whose length was taken from the open handle.
#[derive(Debug)]
pub struct MediaFile {
    file: File,
    len: u64,
    kind: MediaKind,
}

impl MediaFile {
    /// Opens a media file and reads its length from the handle.
    ///
    /// # Arguments
    ///
    /// * `path` - The file to open.
    /// * `kind` - The media kind derived from the filename.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `MediaFile`, or `AppError::NotFound` when the
    /// file is absent, unreadable or not a regular file.
    pub async fn open(path: &Path, kind: MediaKind) -> Result<Self> {
        let file = File::open(path).await.map_err(|e| {
            tracing::debug!("Cannot open {}: {}", path.display(), e);
            AppError::NotFound
        })?;

        let metadata = file.metadata().await.map_err(|e| {
            tracing::debug!("Cannot stat {}: {}", path.display(), e);
            AppError::NotFound
        })?;

        if !metadata.is_file() {
            return Err(AppError::NotFound);
        }

        Ok(Self {
            file,
            len: metadata.len(),
            kind,
        })
    }

    /// Total length in bytes, as read from the open handle.
    pub fn total_len(&self) -> u64 {
        self.len
    }

    /// Builds the response for a resolved request, consuming the handle.
    ///
    /// The body reads the file incrementally; the handle is dropped once the
    /// body is exhausted or dropped (for example on client disconnect).
    ///
    /// # Arguments
    ///
    /// * `resolution` - The range resolution computed against `total_len()`.
    ///
    /// # Returns
    ///
    /// A `200` or `206` streaming response, or `AppError::RangeNotSatisfiable`.
    pub async fn into_response(self, resolution: RangeResolution) -> Result<Response> {
        match resolution {
            RangeResolution::Full { total } => {
                let mut headers = self.base_headers(total);
                headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                let body = stream_body(self.file, total);
                Ok((StatusCode::OK, headers, body).into_response())
            }
            RangeResolution::Partial(range) => self.partial_response(range).await,
            RangeResolution::Unsatisfiable { total } => {
                Err(AppError::RangeNotSatisfiable { total })
            }
        }
    }

    async fn partial_response(mut self, range: ResolvedRange) -> Result<Response> {
        self.file.seek(SeekFrom::Start(range.start)).await?;

        let mut headers = self.base_headers(range.chunk_len());
        headers.insert(
            header::CONTENT_RANGE,
            header_value(&range.content_range())?,
        );
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

        let body = stream_body(self.file, range.chunk_len());
        Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response())
    }

    fn base_headers(&self, content_length: u64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.kind.content_type()),
        );
        headers
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Internal(format!("Invalid header value {:?}: {}", value, e)))
}

/// Streams at most `limit` bytes from the file's current position.
fn stream_body(file: File, limit: u64) -> Body {
    let stream = ReaderStream::with_capacity(file.take(limit), CHUNK_SIZE).inspect_err(|e| {
        // Headers are already on the wire; the connection is simply cut.
        if e.kind() != ErrorKind::BrokenPipe {
            tracing::warn!("⚠️ Media stream aborted: {}", e);
        }
    });
    Body::from_stream(stream)
}
