use anyhow::{Context, Result};

use crate::alignment::AlignmentConfig;

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is set but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Without a key, suggestions are returned pending.
    pub anthropic_api_key: Option<String>,
    /// Without S3 settings, documents live in memory.
    pub s3: Option<S3Settings>,
    pub generation_max_retries: u32,
    pub alignment: AlignmentConfig,
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let mut alignment = match optional_env("ALIGNMENT_CONFIG_PATH") {
            Some(path) => AlignmentConfig::from_json_file(&path)?,
            None => AlignmentConfig::default(),
        };
        if let Some(dim) = optional_env("EMBEDDING_DIM") {
            alignment.embedding_dimension = dim
                .parse::<usize>()
                .context("EMBEDDING_DIM must be a positive integer")?;
            alignment.validate()?;
        }

        let s3 = match optional_env("S3_BUCKET") {
            Some(bucket) => Some(S3Settings {
                bucket,
                endpoint: require_env("S3_ENDPOINT")?,
                region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            None => None,
        };

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            s3,
            generation_max_retries: optional_env("GENERATION_MAX_RETRIES")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("GENERATION_MAX_RETRIES must be a non-negative integer")?
                .unwrap_or(3),
            alignment,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank variables both read as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
