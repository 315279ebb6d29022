use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed client input (range header, path segment, form field).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested file extension is not a supported media type.
    #[error("Unsupported file type")]
    UnsupportedMediaType,

    /// The upload form carried no file field.
    #[error("No file uploaded")]
    MissingUpload,

    /// A multipart error.
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// The request body exceeded the configured limit.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// The media file does not exist or cannot be opened.
    #[error("File not found")]
    NotFound,

    /// The requested byte range lies outside the file.
    #[error("Requested range not satisfiable (total {total})")]
    RangeNotSatisfiable { total: u64 },

    /// A category directory could not be enumerated.
    #[error("Directory scan failed: {0}")]
    DirectoryScan(#[source] std::io::Error),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A credential store error.
    #[error("Store error: {0}")]
    Store(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

/// Serializes `{"error": message}`.
pub(crate) fn error_body(message: &str) -> String {
    sonic_rs::to_string(&ErrorBody { error: message })
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string())
}

/// Serializes `{"message": message}`.
pub(crate) fn message_body(message: &str) -> String {
    sonic_rs::to_string(&MessageBody { message })
        .unwrap_or_else(|_| r#"{"message":"Server error"}"#.to_string())
}

/// Builds a JSON response with the given status.
pub(crate) fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::UnsupportedMediaType => {
                tracing::debug!("Unsupported file type requested");
                (StatusCode::BAD_REQUEST, "Unsupported file type".to_string())
            }

            AppError::MissingUpload => {
                tracing::debug!("Upload without file field");
                (StatusCode::BAD_REQUEST, "No file uploaded".to_string())
            }

            AppError::Multipart(ref msg) => {
                tracing::warn!("Multipart error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::PayloadTooLarge => {
                tracing::warn!("Upload exceeded body limit");
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
            }

            AppError::NotFound => {
                tracing::debug!("File not found");
                (StatusCode::NOT_FOUND, "File not found".to_string())
            }

            AppError::RangeNotSatisfiable { total } => {
                tracing::debug!("Range not satisfiable for {} bytes", total);
                let mut response = json_response(
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    error_body("Requested range not satisfiable"),
                );
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total)) {
                    response.headers_mut().insert(header::CONTENT_RANGE, value);
                }
                return response;
            }

            AppError::DirectoryScan(ref e) => {
                tracing::error!("Directory scan error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unable to scan directory".to_string())
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "File system error".to_string())
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Store(ref msg) => {
                tracing::error!("Store error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        json_response(status, error_body(&message))
    }
}
