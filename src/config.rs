use clap::Parser;
use std::time::Duration;

use crate::scoring::CurrentInningsPolicy;

/// Live cricket scoring console
#[derive(Parser, Debug, Clone)]
#[command(name = "cricket-live-scorer", version, about)]
pub struct Config {
    /// Id of the live match to score
    #[arg(long, env = "MATCH_ID")]
    pub match_id: String,

    /// Match backend base URL
    #[arg(long, env = "API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Realtime endpoint (SockJS http(s) URL or raw ws(s) URL)
    #[arg(
        long,
        env = "WS_ENDPOINT",
        default_value = "http://localhost:8080/live-match"
    )]
    pub ws_endpoint: String,

    /// Bearer token; stored in the session database when given
    #[arg(long, env = "AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// SQLite file holding the client session (token, theme)
    #[arg(long, env = "SESSION_PATH", default_value = "scorer-session.db")]
    pub session_path: String,

    /// Read-only dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "127.0.0.1:8090")]
    pub dashboard_addr: String,

    /// Per-request timeout for backend calls, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    /// Which innings counts as current
    #[arg(
        long,
        env = "CURRENT_INNINGS",
        value_enum,
        default_value = "first-listed"
    )]
    pub current_innings: CurrentInningsPolicy,

    /// Upper bound for the realtime reconnect delay, in seconds
    #[arg(long, env = "MAX_RECONNECT_BACKOFF_SECS", default_value = "30")]
    pub max_reconnect_backoff_secs: u64,

    /// Log raw realtime frames
    #[arg(long, env = "DEBUG_TOOLS", default_value = "false")]
    pub debug_tools: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.match_id.trim().is_empty() {
            anyhow::bail!("MATCH_ID must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        if self.max_reconnect_backoff_secs == 0 {
            anyhow::bail!("max_reconnect_backoff_secs must be positive");
        }
        url::Url::parse(&self.api_url)
            .map_err(|e| anyhow::anyhow!("Invalid API_URL '{}': {}", self.api_url, e))?;
        url::Url::parse(&self.ws_endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid WS_ENDPOINT '{}': {}", self.ws_endpoint, e))?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_backoff_secs)
    }
}
