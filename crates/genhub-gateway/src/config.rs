//! Gateway configuration.
//!
//! Precedence: `GENHUB__*` environment > file at `GENHUB_CONFIG` (default
//! `config/genhub.toml`) > defaults. `.env` is loaded by `main` before this runs.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | host / port | 127.0.0.1 / 8000 | Listen address. |
//! | storage_path | ./data/genhub | Sled directory for the backend store. |
//! | fail_open | true | Let page requests through when the auth backend is unreachable. |
//! | session_cookie | genhub_session | Cookie carrying the session token. |
//! | public_base_url | http://127.0.0.1:8000 | Used for profile URLs in vCards. |
//! | log_dir | – | When set, also write a daily rolling log file there. |
//! | ai.api_key | GEMINI_API_KEY | Key for the generative text API. |

use genhub_core::ai_bridge::{DEFAULT_API_BASE, DEFAULT_MODEL};
use serde::Deserialize;
use std::path::Path;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_base: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub storage_path: String,
    #[serde(default = "default_true")]
    pub fail_open: bool,
    pub session_cookie: String,
    pub public_base_url: String,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            app_name: "GenHub Gateway".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            storage_path: "./data/genhub".to_string(),
            fail_open: true,
            session_cookie: "genhub_session".to_string(),
            public_base_url: "http://127.0.0.1:8000".to_string(),
            log_dir: None,
            allowed_origins: Vec::new(),
            ai: AiConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("GENHUB_CONFIG").unwrap_or_else(|_| "config/genhub".to_string());
        let defaults = GatewayConfig::default();
        let builder = config::Config::builder()
            .set_default("app_name", defaults.app_name)?
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("storage_path", defaults.storage_path)?
            .set_default("fail_open", defaults.fail_open)?
            .set_default("session_cookie", defaults.session_cookie)?
            .set_default("public_base_url", defaults.public_base_url)?
            .set_default("ai.api_base", defaults.ai.api_base)?
            .set_default("ai.model", defaults.ai.model)?;

        let toml_path = format!("{}.toml", config_path);
        let builder = if Path::new(&config_path).exists() {
            builder.add_source(config::File::from(Path::new(&config_path)))
        } else if Path::new(&toml_path).exists() {
            builder.add_source(config::File::from(Path::new(&toml_path)))
        } else {
            builder
        };

        let mut loaded: GatewayConfig = builder
            .add_source(
                config::Environment::with_prefix("GENHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if loaded.ai.api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
            loaded.ai.api_key = env_opt_string("GEMINI_API_KEY")
                .or_else(|| env_opt_string("GENHUB_AI_API_KEY"));
        }
        Ok(loaded)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public page URL for a profile slug.
    pub fn profile_url(&self, slug: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), slug)
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
