use anyhow::{Context, Result};
use std::env;

/// Server settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Shared admin password. Admin mode is disabled when unset.
    pub admin_password: Option<String>,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    /// Sessions idle longer than this are dropped.
    pub session_idle_secs: u64,
    pub session_cleanup_secs: u64,
    /// New sessions are refused once this many are live.
    pub max_sessions: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            session_idle_secs: env::var("SESSION_IDLE_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("SESSION_IDLE_SECS must be a whole number of seconds")?,
            session_cleanup_secs: env::var("SESSION_CLEANUP_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("SESSION_CLEANUP_SECS must be a whole number of seconds")?,
            max_sessions: env::var("MAX_SESSIONS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .context("MAX_SESSIONS must be a whole number")?,
        };

        if config.admin_password.is_none() {
            tracing::warn!("ADMIN_PASSWORD not set; admin mode is disabled");
        }

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            admin_password: None,
            cors_origins: Vec::new(),
            session_idle_secs: 3600,
            session_cleanup_secs: 60,
            max_sessions: 10_000,
        }
    }
}
