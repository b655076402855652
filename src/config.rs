use dirs::config_dir;
use std::{fs, path::PathBuf};

use crate::error::{AppError, AppResult};

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_TEXT_MODEL: &str = "mistralai/mistral-small-3.2-24b-instruct:free";
pub const DEFAULT_VISION_MODEL: &str = "qwen/qwen2.5-vl-32b-instruct:free";

/// Process-wide settings, built once at start-up and shared read-only.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Bearer token for the completion API. Usually supplied via `OPENROUTER_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Full URL of the chat-completion endpoint.
    pub endpoint: String,
    /// Model used for text and video submissions.
    pub text_model: String,
    /// Vision-capable model used for image submissions.
    pub vision_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask OpenRouter to augment the completion with web search results.
    pub web_search: bool,
    /// Attribution headers sent to OpenRouter (`HTTP-Referer`, `X-Title`).
    pub http_referer: Option<String>,
    pub app_title: Option<String>,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Total attempts per upstream call; 1 disables retry.
    pub retry_max_attempts: u32,
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
    pub max_upload_bytes: usize,
    /// Minimum log level: debug, info, warn or error.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 1500,
            web_search: false,
            http_referer: None,
            app_title: None,
            allowed_origins: vec![
                "http://localhost".to_string(),
                "http://localhost:3000".to_string(),
                "https://verisightai.vercel.app".to_string(),
            ],
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            retry_max_attempts: 1,
            retry_initial_ms: 300,
            retry_max_ms: 3000,
            max_upload_bytes: 10 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Check values that would make every request fail.
    pub fn validate(&self) -> AppResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(AppError::Config("endpoint must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(AppError::Config("max_tokens must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Config(format!(
                "temperature {} is outside 0..=2",
                self.temperature
            )));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(AppError::Config("timeouts must be positive".to_string()));
        }
        if self.retry_max_attempts == 0 {
            return Err(AppError::Config(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply overrides from a variable lookup. Split out from [`load`] so tests
    /// don't need to touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(addr) = get("VERISIGHT_BIND") {
            self.bind_addr = addr;
        }
        if let Some(endpoint) = get("VERISIGHT_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(model) = get("VERISIGHT_TEXT_MODEL") {
            self.text_model = model;
        }
        if let Some(model) = get("VERISIGHT_VISION_MODEL") {
            self.vision_model = model;
        }
        if let Some(origins) = get("VERISIGHT_ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(secs) = get("VERISIGHT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(level) = get("VERISIGHT_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(flag) = get("VERISIGHT_WEB_SEARCH") {
            self.web_search = matches!(
                flag.to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            );
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }
}

fn settings_path() -> PathBuf {
    if let Ok(p) = std::env::var("VERISIGHT_CONFIG") {
        return PathBuf::from(p);
    }
    let mut p = config_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("VeriSight");
    p.push("settings.toml");
    p
}

/// Parse a TOML settings document on top of the defaults.
pub fn from_toml(s: &str) -> AppResult<Settings> {
    toml::from_str(s).map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))
}

/// Load `.env` from the working directory into the process environment.
/// Variables that are already set are left alone. Returns the file used.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Build the settings: defaults, then the optional settings file, then environment.
pub fn load() -> AppResult<Settings> {
    let p = settings_path();
    let mut cfg = if p.exists() {
        let s = fs::read_to_string(&p)
            .map_err(|e| AppError::Config(format!("Failed to read {:?}: {}", p, e)))?;
        crate::logger::debug("config", &format!("Loaded config file {:?} ({} bytes)", p, s.len()));
        from_toml(&s)?
    } else {
        Settings::default()
    };

    cfg.apply_env(|key| std::env::var(key).ok());
    cfg.validate()?;
    Ok(cfg)
}
