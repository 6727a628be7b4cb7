//! Configuration management for the OCR Wallet Extractor
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with OCR_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Document record storage configuration
    pub storage: StorageConfig,

    /// OCR engine and pipeline configuration
    pub ocr: OcrConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,

    /// Request body cap in megabytes. Phone photos and scanned PDFs
    /// routinely exceed axum's 2 MB default.
    pub max_upload_mb: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Storage backend: "local" or "s3"
    pub backend: StorageBackend,

    /// Root directory for the local backend
    pub local_root: String,

    /// S3 settings, used when backend = "s3"
    pub s3: S3Config,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    /// Bucket for extraction records
    pub bucket: String,

    /// AWS region
    pub region: String,

    /// Key prefix for all objects
    pub prefix: String,

    /// Optional base URL for public object links
    pub public_url_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    /// Base URL of the external OCR engine service
    pub engine_url: String,

    /// Request timeout against the OCR engine, in seconds
    pub timeout_seconds: u64,

    /// Mount the template annotator tooling routes
    pub annotator_enabled: bool,

    /// Allow template box overrides from disk
    pub template_overrides: bool,

    /// Always include the debug block in extract responses
    pub inline_debug: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("OCR_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 9000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.max_upload_mb", 20)?
            .set_default("storage.backend", "local")?
            .set_default("storage.local_root", "data")?
            .set_default("storage.s3.bucket", "")?
            .set_default("storage.s3.region", "us-east-1")?
            .set_default("storage.s3.prefix", "ocr")?
            .set_default("storage.s3.public_url_base", "")?
            .set_default("ocr.engine_url", "http://localhost:8080")?
            .set_default("ocr.timeout_seconds", 60)?
            .set_default("ocr.annotator_enabled", false)?
            .set_default("ocr.template_overrides", false)?
            .set_default("ocr.inline_debug", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (OCR_ prefix)
            .add_source(
                Environment::with_prefix("OCR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            host: "0.0.0.0".to_string(),
            max_upload_mb: 20,
        }
    }
}
