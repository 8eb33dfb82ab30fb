//! Service configuration.
//!
//! Settings come from environment variables (a local `.env` file is honored
//! for development) and are collected into one shareable struct.

use std::env;
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the intonation analysis server.
    pub server_url: String,
    /// Where credentials, progress and recordings live.
    pub data_dir: PathBuf,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("no data directory available; set INTONA_DATA_DIR")]
    NoDataDir,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `INTONA_SERVER_URL`: (Optional) Analysis server base URL. Defaults to "http://localhost:8080".
    // *   `INTONA_DATA_DIR`: (Optional) Data directory. Defaults to the platform-local data dir.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Ignored if no .env file is present.
        dotenvy::dotenv().ok();

        let server_url =
            env::var("INTONA_SERVER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let data_dir = match env::var("INTONA_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_local_dir()
                .map(|dir| dir.join("intona"))
                .ok_or(ConfigError::NoDataDir)?,
        };

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            server_url,
            data_dir,
            log_level,
        })
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.data_dir.join("recordings")
    }

    /// Bundled reference audio lives here, keyed by the catalog's relative
    /// paths.
    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }
}
