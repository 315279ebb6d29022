use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tunestream::{
    app,
    auth::store::{CredentialStore, MemoryCredentialStore},
    config::Config,
    error::{AppError, Result as AppResult},
    models::session::Claims,
    state::AppState,
};

const SECRET: &str = "integration-secret";
const BOUNDARY: &str = "----tunestream-boundary";

// Shared test context
struct TestContext {
    dir: TempDir,
    store: MemoryCredentialStore,
    app: Router,
    song: Vec<u8>,
}

/// Keeps sessions in memory but cannot record uploads.
struct UploadsUnavailable(MemoryCredentialStore);

#[async_trait]
impl CredentialStore for UploadsUnavailable {
    async fn lookup_session_token(&self, subject: &str) -> AppResult<Option<String>> {
        self.0.lookup_session_token(subject).await
    }
    async fn replace_session_token(&self, subject: &str, token: &str) -> AppResult<()> {
        self.0.replace_session_token(subject, token).await
    }
    async fn record_upload(&self, _: &str, _: &str) -> AppResult<()> {
        Err(AppError::Store("connection refused".into()))
    }
}

impl TestContext {
    fn new() -> Self {
        Self::build(|store| Arc::new(store))
    }

    fn with_failing_upload_records() -> Self {
        Self::build(|store| Arc::new(UploadsUnavailable(store)))
    }

    fn build(wrap: impl FnOnce(MemoryCredentialStore) -> Arc<dyn CredentialStore>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music");
        std::fs::create_dir_all(music.join("en")).unwrap();

        let song: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
        std::fs::write(music.join("en").join("a.mp3"), &song).unwrap();
        std::fs::write(music.join("en").join("b.aac"), b"aac-bytes").unwrap();
        std::fs::write(music.join("en").join("song.wav"), b"RIFF").unwrap();
        std::fs::write(music.join("en").join("cover.jpg"), b"jpg").unwrap();

        let vars: HashMap<&str, String> = HashMap::from([
            ("JWT_SECRET", SECRET.to_string()),
            ("MUSIC_DIR", music.display().to_string()),
            ("UPLOAD_DIR", dir.path().join("uploads").display().to_string()),
            ("PUBLIC_URL", "http://localhost:3000".to_string()),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let store = MemoryCredentialStore::new();
        let state = AppState::with_store(config, wrap(store.clone()));

        Self {
            dir,
            store,
            app: app::router(state),
            song,
        }
    }

    fn upload_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, range: Option<&str>) -> Response {
        let mut builder = Request::get(uri);
        if let Some(range) = range {
            builder = builder.header(header::RANGE, range);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Signs a token and stores it as the subject's current session.
    async fn sign_in(&self, email: &str, iat_offset: i64) -> String {
        let token = sign(email, 3600, iat_offset);
        self.store.replace_session_token(email, &token).await.unwrap();
        token
    }

    async fn upload(&self, token: Option<&str>, body: Vec<u8>) -> Response {
        let mut builder = Request::post("/music").header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }
}

fn sign(email: &str, expires_in_secs: i64, iat_offset: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        email: email.to_string(),
        iat: now + iat_offset,
        exp: now + expires_in_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod listing {
    use super::*;

    #[tokio::test]
    async fn test_lists_supported_files_for_default_language() {
        let context = TestContext::new();
        let response = context.get("/music", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!([
                { "name": "a.mp3", "url": "http://localhost:3000/music/en/a.mp3" },
                { "name": "b.aac", "url": "http://localhost:3000/music/en/b.aac" },
            ])
        );
    }

    #[tokio::test]
    async fn test_unknown_language_is_server_error() {
        let context = TestContext::new();
        let response = context.get("/music?language=fr", None).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Unable to scan directory");
    }

    #[tokio::test]
    async fn test_unsupported_method_is_not_allowed() {
        let context = TestContext::new();
        for method in ["PUT", "DELETE", "PATCH"] {
            let request = Request::builder()
                .method(method)
                .uri("/music")
                .body(Body::empty())
                .unwrap();
            let response = context.send(request).await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "method {}", method);
        }

        assert_eq!(context.get("/music", None).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_language_traversal_is_rejected() {
        let context = TestContext::new();
        let response = context.get("/music?language=..", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[cfg(test)]
mod streaming {
    use super::*;

    #[tokio::test]
    async fn test_full_file() {
        let context = TestContext::new();
        let response = context.get("/music/en/a.mp3", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(body_bytes(response).await, context.song);
    }

    #[tokio::test]
    async fn test_partial_content_window() {
        let context = TestContext::new();
        let response = context.get("/music/en/a.mp3", Some("bytes=200-299")).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 200-299/1000");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(body_bytes(response).await, context.song[200..=299].to_vec());
    }

    #[tokio::test]
    async fn test_open_ended_range() {
        let context = TestContext::new();
        let response = context.get("/music/en/a.mp3", Some("bytes=900-")).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 900-999/1000");
        assert_eq!(body_bytes(response).await, context.song[900..].to_vec());
    }

    #[tokio::test]
    async fn test_aac_content_type() {
        let context = TestContext::new();
        let response = context.get("/music/en/b.aac", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/aac");
        assert_eq!(body_bytes(response).await, b"aac-bytes".to_vec());
    }

    #[tokio::test]
    async fn test_range_past_end_is_unsatisfiable() {
        let context = TestContext::new();
        let response = context.get("/music/en/a.mp3", Some("bytes=0-1000")).await;

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
        assert_eq!(body_json(response).await["error"], "Requested range not satisfiable");
    }

    #[tokio::test]
    async fn test_offsets_beyond_u64_are_unsatisfiable() {
        let context = TestContext::new();
        let huge = "9".repeat(25);
        for range in [format!("bytes=0-{}", huge), format!("bytes={}-", huge)] {
            let response = context.get("/music/en/a.mp3", Some(&range)).await;
            assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE, "range {}", range);
            assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
        }
    }

    #[tokio::test]
    async fn test_malformed_range_is_bad_request() {
        let context = TestContext::new();
        for range in ["bytes=abc-10", "bytes=-100", "lines=0-1"] {
            let response = context.get("/music/en/a.mp3", Some(range)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "range {}", range);
        }
    }

    #[tokio::test]
    async fn test_unsupported_extension_even_when_file_exists() {
        let context = TestContext::new();
        for uri in ["/music/en/song.wav", "/music/en/missing.wav"] {
            let response = context.get(uri, None).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"], "Unsupported file type");
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let context = TestContext::new();
        let response = context.get("/music/en/missing.mp3", Some("bytes=0-1")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "File not found");
    }

    #[tokio::test]
    async fn test_encoded_traversal_is_rejected() {
        let context = TestContext::new();
        let response = context.get("/music/%2E%2E/a.mp3", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_repeated_range_requests_are_identical() {
        let context = TestContext::new();
        let first = context.get("/music/en/a.mp3", Some("bytes=10-509")).await;
        let second = context.get("/music/en/a.mp3", Some("bytes=10-509")).await;

        assert_eq!(first.status(), second.status());
        assert_eq!(
            first.headers()[header::CONTENT_RANGE],
            second.headers()[header::CONTENT_RANGE]
        );
        assert_eq!(body_bytes(first).await, body_bytes(second).await);
    }
}

#[cfg(test)]
mod upload {
    use super::*;

    #[tokio::test]
    async fn test_missing_authorization_is_forbidden() {
        let context = TestContext::new();
        let body = multipart(&[Part::File("paymentScreenshot", "p.png", b"png")]);
        let response = context.upload(None, body).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["message"], "No token provided");
        assert!(files_in(&context.upload_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_superseded_token_is_unauthorized() {
        let context = TestContext::new();
        let first = context.sign_in("a@x.com", 0).await;
        let second = context.sign_in("a@x.com", 1).await;
        assert_ne!(first, second);

        let body = multipart(&[Part::File("paymentScreenshot", "p.png", b"png")]);
        let response = context.upload(Some(&first), body).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Invalid token");
        assert!(files_in(&context.upload_dir()).is_empty());
        assert!(context.store.upload_of("a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let context = TestContext::new();
        let token = sign("a@x.com", -3600, -7200);
        context.store.replace_session_token("a@x.com", &token).await.unwrap();

        let body = multipart(&[Part::File("paymentScreenshot", "p.png", b"png")]);
        let response = context.upload(Some(&token), body).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_is_stored_and_recorded() {
        let context = TestContext::new();
        let token = context.sign_in("a@x.com", 0).await;

        let payload = vec![42u8; 200_000];
        let body = multipart(&[
            Part::Text("email", "a@x.com"),
            Part::File("paymentScreenshot", "receipt.png", &payload),
        ]);
        let response = context.upload(Some(&token), body).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["message"],
            "Payment screenshot uploaded successfully"
        );

        let record = context.store.upload_of("a@x.com").await.unwrap();
        let files = files_in(&context.upload_dir());
        assert_eq!(files, vec![record.filename.clone()]);
        assert_eq!(
            std::fs::read(context.upload_dir().join(&record.filename)).unwrap(),
            payload
        );
    }

    #[tokio::test]
    async fn test_upload_defaults_owner_to_token_subject() {
        let context = TestContext::new();
        let token = context.sign_in("b@x.com", 0).await;

        let body = multipart(&[Part::File("paymentScreenshot", "receipt.png", b"img")]);
        let response = context.upload(Some(&token), body).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(context.store.upload_of("b@x.com").await.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_field_is_bad_request() {
        let context = TestContext::new();
        let token = context.sign_in("a@x.com", 0).await;

        let body = multipart(&[Part::Text("email", "a@x.com")]);
        let response = context.upload(Some(&token), body).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No file uploaded");
        assert!(files_in(&context.upload_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_email_leaves_no_file_behind() {
        let context = TestContext::new();
        let token = context.sign_in("a@x.com", 0).await;

        let body = multipart(&[
            Part::File("paymentScreenshot", "receipt.png", b"img"),
            Part::Text("email", "not-an-email"),
        ]);
        let response = context.upload(Some(&token), body).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(files_in(&context.upload_dir()).is_empty());
        assert!(context.store.upload_of("a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn test_failed_record_leaves_no_file_behind() {
        let context = TestContext::with_failing_upload_records();
        let token = context.sign_in("a@x.com", 0).await;

        let body = multipart(&[Part::File("paymentScreenshot", "receipt.png", b"img")]);
        let response = context.upload(Some(&token), body).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(files_in(&context.upload_dir()).is_empty());
    }
}
