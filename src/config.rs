// ABOUTME: Environment-driven configuration loaded once at startup
// ABOUTME: Collects secrets, service endpoints, and bind address into one injected struct

use anyhow::{Context, Result};

const DEFAULT_DATABASE_URL: &str = "sqlite:fixit_wand.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_LOCATIONS_API_ROOT: &str = "https://fixitwand-locations.example.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    /// Public base URL used when building magic links.
    pub base_url: String,
    pub jwt_secret: String,
    /// Static operator credential; None disables the master channel.
    pub master_bearer: Option<String>,
    /// Representative email attached to the master principal.
    pub master_email: String,
    pub openai_api_key: String,
    /// Outbound email API endpoint; None disables delivery (dev/test).
    pub email_api_url: Option<String>,
    pub locations_api_root: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: optional("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            base_url: optional("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            jwt_secret: required("JWT_SECRET")?,
            master_bearer: optional("MASTER_BEARER"),
            master_email: optional("MASTER_EMAIL").unwrap_or_else(|| "ops@fixitwand.dev".into()),
            openai_api_key: required("OPENAI_API_KEY")?,
            email_api_url: optional("EMAIL_API_URL"),
            locations_api_root: optional("LOCATIONS_API_ROOT")
                .unwrap_or_else(|| DEFAULT_LOCATIONS_API_ROOT.into()),
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing required environment variable {}", name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
