use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::llm_client::{BackendKind, LlmConfig};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub allowed_origins: Vec<String>,
    pub llm: LlmConfig,
    /// Upper bound on catalog rows fed into a recommendation prompt.
    pub catalog_limit: i64,
    /// SSE keep-alive comment interval for streamed chat.
    pub stream_keepalive: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);

        Ok(Config {
            database_url: env.require("DATABASE_URL")?,
            port: env.parse_or("PORT", 8080)?,
            rust_log: env.or("RUST_LOG", "info"),
            allowed_origins: env
                .or("ALLOWED_ORIGINS", "http://localhost:5173,http://localhost:3000")
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            llm: llm_config(&env)?,
            catalog_limit: env.parse_or("CATALOG_LIMIT", 100)?,
            stream_keepalive: Duration::from_secs(env.parse_or("STREAM_KEEPALIVE_SECS", 15)?),
        })
    }
}

fn llm_config(env: &Env<'_>) -> Result<LlmConfig> {
    let raw_backend = env.or("LLM_BACKEND", "ollama");
    let backend = BackendKind::parse(&raw_backend)
        .ok_or_else(|| anyhow!("LLM_BACKEND must be 'ollama' or 'openai', got '{raw_backend}'"))?;

    let (base_url, model, api_key) = match backend {
        BackendKind::Ollama => (
            env.or("OLLAMA_BASE_URL", "http://localhost:11434"),
            env.or("OLLAMA_MODEL", "llama3"),
            None,
        ),
        BackendKind::OpenAi => (
            env.or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            env.or("OPENAI_MODEL", "gpt-4o-mini"),
            Some(env.require("OPENAI_API_KEY")?),
        ),
    };

    Ok(LlmConfig {
        backend,
        base_url: base_url.trim_end_matches('/').to_string(),
        model,
        api_key,
        timeout: Duration::from_secs(env.parse_or("LLM_TIMEOUT_SECS", 480)?),
        max_retries: env.parse_or("LLM_MAX_RETRIES", 2)?,
    })
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'")),
            None => Ok(default),
        }
    }
}
