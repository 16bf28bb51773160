//! Service configuration.

use std::path::Path;

use serde::Deserialize;

use artesia_core::DEFAULT_FREE_TRIAL_CREDITS;
use artesia_transform::DEFAULT_MODEL;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/artesia").
    pub data_dir: String,

    /// HS256 secret for user JWTs. Without it every user request is rejected.
    pub auth_jwt_secret: Option<String>,

    /// Expected JWT audience (default: "artesia").
    pub auth_audience: String,

    /// Admin API key for privileged endpoints.
    pub admin_api_key: Option<String>,

    /// `OpenAI` API key. Without it conversions are unavailable.
    pub openai_api_key: Option<String>,

    /// `OpenAI`-compatible API root.
    pub openai_base_url: String,

    /// Vision model used for conversions.
    pub openai_model: String,

    /// Upper bound on one transformation call, in seconds.
    pub transform_timeout_seconds: u64,

    /// JSON style catalog; the built-in presets are used when unset.
    pub styles_path: Option<String>,

    /// Credits granted at registration.
    pub free_trial_credits: i64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// `OpenAI` secrets file structure.
#[derive(Debug, Deserialize)]
struct OpenAiSecrets {
    api_key: String,
    #[serde(default)]
    base_url: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let (openai_api_key, secrets_base_url) = load_openai_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or(defaults.auth_audience),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            openai_api_key,
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .ok()
                .or(secrets_base_url)
                .unwrap_or(defaults.openai_base_url),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            transform_timeout_seconds: parse_env("TRANSFORM_TIMEOUT_SECONDS")
                .unwrap_or(defaults.transform_timeout_seconds),
            styles_path: std::env::var("STYLES_PATH").ok(),
            free_trial_credits: parse_env("FREE_TRIAL_CREDITS")
                .filter(|credits: &i64| *credits >= 0)
                .unwrap_or(defaults.free_trial_credits),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: parse_env("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: parse_env("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Load the `OpenAI` key from a secrets file, falling back to the environment.
fn load_openai_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [".secrets/openai.json", "../.secrets/openai.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<OpenAiSecrets>(path) {
            tracing::info!(path = %path, "Loaded OpenAI secrets from file");
            return (Some(secrets.api_key), secrets.base_url);
        }
    }

    tracing::debug!("OpenAI secrets file not found, using environment variables");
    (std::env::var("OPENAI_API_KEY").ok(), None)
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/artesia".into(),
            auth_jwt_secret: None,
            auth_audience: "artesia".into(),
            admin_api_key: None,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".into(),
            openai_model: DEFAULT_MODEL.into(),
            transform_timeout_seconds: 60,
            styles_path: None,
            free_trial_credits: DEFAULT_FREE_TRIAL_CREDITS,
            cors_origins: vec!["*".into()],
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            request_timeout_seconds: 90,
        }
    }
}
