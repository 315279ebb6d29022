//! Server-side session records, keyed by subject.
//!
//! Each subject holds at most one session token; storing a new one replaces
//! the previous value, which is what revokes older tokens.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::sync::RwLock;

use crate::error::Result;

/// Access to user session tokens and upload records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the session token currently stored for `subject`.
    async fn lookup_session_token(&self, subject: &str) -> Result<Option<String>>;

    /// Stores `token` as the only valid session token for `subject`.
    async fn replace_session_token(&self, subject: &str, token: &str) -> Result<()>;

    /// Records `filename` as the latest upload of `subject`.
    async fn record_upload(&self, subject: &str, filename: &str) -> Result<()>;
}

/// The latest file a user uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
struct UserRecord {
    token: Option<Arc<str>>,
    upload: Option<UploadRecord>,
}

/// In-process credential store.
///
/// Tokens are swapped as whole values under the lock, so readers see either
/// the old or the new token.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest upload recorded for `subject`.
    pub async fn upload_of(&self, subject: &str) -> Option<UploadRecord> {
        self.users
            .read()
            .await
            .get(subject)
            .and_then(|user| user.upload.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup_session_token(&self, subject: &str) -> Result<Option<String>> {
        let users = self.users.read().await;
        Ok(users
            .get(subject)
            .and_then(|user| user.token.as_deref())
            .map(String::from))
    }

    async fn replace_session_token(&self, subject: &str, token: &str) -> Result<()> {
        let mut users = self.users.write().await;
        users.entry(subject.to_string()).or_default().token = Some(Arc::from(token));
        Ok(())
    }

    async fn record_upload(&self, subject: &str, filename: &str) -> Result<()> {
        let mut users = self.users.write().await;
        users.entry(subject.to_string()).or_default().upload = Some(UploadRecord {
            filename: filename.to_string(),
            uploaded_at: Utc::now(),
        });
        Ok(())
    }
}

/// Redis-backed credential store.
///
/// Each user is a hash at `user:{subject}` with the fields `token`, `upload`
/// and `upload_at`.
#[derive(Clone)]
pub struct RedisCredentialStore {
    redis: ConnectionManager,
}

impl RedisCredentialStore {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - The URL of the Redis server.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `RedisCredentialStore`.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");
        Ok(Self { redis })
    }

    fn user_key(subject: &str) -> String {
        format!("user:{}", subject)
    }
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn lookup_session_token(&self, subject: &str) -> Result<Option<String>> {
        let mut redis = self.redis.clone();
        let token: Option<String> = redis.hget(Self::user_key(subject), "token").await?;
        Ok(token)
    }

    async fn replace_session_token(&self, subject: &str, token: &str) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.hset(Self::user_key(subject), "token", token).await?;
        Ok(())
    }

    async fn record_upload(&self, subject: &str, filename: &str) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis
            .hset_multiple(
                Self::user_key(subject),
                &[
                    ("upload", filename.to_string()),
                    ("upload_at", Utc::now().to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }
}
