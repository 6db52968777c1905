use anyhow::{Context, Result};
use chrono::Datelike;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Overrides the clock-derived year passed to spam detection.
    pub current_year: Option<i32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            current_year: optional_env("CURRENT_YEAR")
                .map(|v| v.parse::<i32>())
                .transpose()
                .context("CURRENT_YEAR must be an integer")?,
        })
    }

    /// The year handed to spam detection: the override if set, else today's year.
    pub fn resolve_current_year(&self) -> Option<i32> {
        self.current_year
            .or_else(|| Some(chrono::Utc::now().year()))
            .filter(|year| *year > 0)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
