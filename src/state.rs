use std::sync::Arc;

use crate::auth::store::{CredentialStore, MemoryCredentialStore, RedisCredentialStore};
use crate::auth::validator::TokenValidator;
use crate::config::Config;
use crate::error::Result;
use crate::media::library::MediaLibrary;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Session tokens and upload records.
    pub store: Arc<dyn CredentialStore>,
    /// Bearer token validation for protected routes.
    pub validator: TokenValidator,
    /// The music collection on disk.
    pub library: MediaLibrary,
}

impl AppState {
    /// Creates a new `AppState`, connecting to Redis when configured.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn CredentialStore> = match config.redis_url.as_deref() {
            Some(url) => Arc::new(RedisCredentialStore::connect(url).await?),
            None => {
                tracing::warn!("⚠️ REDIS_URL not set, sessions are kept in memory");
                Arc::new(MemoryCredentialStore::new())
            }
        };

        Ok(Self::with_store(config.clone(), store))
    }

    /// Creates an `AppState` around an existing credential store.
    pub fn with_store(config: Config, store: Arc<dyn CredentialStore>) -> Self {
        let validator = TokenValidator::new(config.jwt_secret.as_bytes(), store.clone());
        let library = MediaLibrary::new(config.music_dir.clone(), config.public_url.clone());
        tracing::info!("✅ Media library rooted at {}", library.root().display());

        Self {
            config: Arc::new(config),
            store,
            validator,
            library,
        }
    }
}
