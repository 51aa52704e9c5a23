//! Configuration module for the portal backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the admin routes (required in production)
    pub admin_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Root directory of the blob store
    pub storage_root: PathBuf,
    /// Bucket that holds team photos
    pub photo_bucket: String,
    /// Base URL used when building public blob URLs
    pub public_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Maximum accepted request body, in bytes
    pub max_upload_bytes: usize,
    /// Cache-Control header sent with served blobs
    pub storage_cache_control: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let admin_psk = env::var("PORTAL_ADMIN_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("PORTAL_DB_PATH")
            .unwrap_or_else(|_| "./data/portal.sqlite".to_string())
            .into();

        let storage_root = env::var("PORTAL_STORAGE_ROOT")
            .unwrap_or_else(|_| "./data/storage".to_string())
            .into();

        let photo_bucket =
            env::var("PORTAL_PHOTO_BUCKET").unwrap_or_else(|_| "team-photos".to_string());

        let bind_addr: SocketAddr = env::var("PORTAL_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid PORTAL_BIND_ADDR: {}", e)))?;

        let public_url = env::var("PORTAL_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}", bind_addr))
            .trim_end_matches('/')
            .to_string();

        let log_level = env::var("PORTAL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("PORTAL_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "Invalid PORTAL_LOG_FORMAT: {} (expected text or json)",
                    other
                )))
            }
        };

        let max_upload_bytes = match env::var("PORTAL_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw.parse().map_err(|e| {
                AppError::Internal(format!("Invalid PORTAL_MAX_UPLOAD_BYTES: {}", e))
            })?,
            Err(_) => 10 * 1024 * 1024,
        };

        let storage_cache_control = env::var("PORTAL_STORAGE_CACHE_CONTROL")
            .unwrap_or_else(|_| "max-age=3600".to_string());

        Ok(Self {
            admin_psk,
            db_path,
            storage_root,
            photo_bucket,
            public_url,
            bind_addr,
            log_level,
            log_format,
            max_upload_bytes,
            storage_cache_control,
        })
    }
}
