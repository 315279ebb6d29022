use std::env;
use std::path::PathBuf;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MUSIC_DIR: &str = "music";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The host the server binds to.
    pub host: String,
    /// The port the server binds to.
    pub port: u16,
    /// Absolute base URL used when building file URLs in listings.
    pub public_url: String,
    /// Root directory holding one sub-directory per language.
    pub music_dir: PathBuf,
    /// Directory uploaded files are moved into.
    pub upload_dir: PathBuf,
    /// The HS256 key session tokens are verified with.
    pub jwt_secret: Zeroizing<String>,
    /// The URL of the Redis server. `None` selects the in-memory store.
    pub redis_url: Option<String>,
    /// Maximum accepted request body size for uploads.
    pub max_upload_bytes: usize,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("public_url", &self.public_url)
            .field("music_dir", &self.music_dir)
            .field("upload_dir", &self.upload_dir)
            .field("jwt_secret", &"<redacted>")
            .field("redis_url", &self.redis_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary variable lookup.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the value of a variable, if set.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET must be set")?;

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().context("Invalid PORT")?,
            None => DEFAULT_PORT,
        };

        let public_url = lookup("PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://{}:{}", host, port));

        let music_dir = PathBuf::from(
            lookup("MUSIC_DIR").unwrap_or_else(|| DEFAULT_MUSIC_DIR.to_string()),
        );
        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| music_dir.clone());

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse().context("Invalid MAX_UPLOAD_BYTES")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            public_url,
            music_dir,
            upload_dir,
            jwt_secret: Zeroizing::new(jwt_secret),
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            max_upload_bytes,
            cors_origins,
        })
    }

    /// The address the listener binds to, as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
