//! Server configuration from command-line arguments and the environment.

use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::infrastructure::repository::RetentionPolicy;

#[derive(Parser, Debug, Clone)]
#[command(name = "studyroom-server")]
#[command(about = "Real-time study room server over WebSocket", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "STUDYROOM_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "STUDYROOM_PORT", default_value = "8080")]
    pub port: u16,

    /// Shared secret used to verify HS256 access tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Seconds an empty room is kept before eviction (0 evicts immediately)
    #[arg(long, env = "ROOM_TTL_SECS", default_value = "0")]
    pub room_ttl_secs: u64,

    /// Seconds between idle-room sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "60")]
    pub sweep_interval_secs: u64,

    /// Create a chat-enabled profile for unknown room ids
    #[arg(long, env = "AUTO_PROVISION_ROOMS", default_value_t = true, action = ArgAction::Set)]
    pub auto_provision_rooms: bool,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_ttl_secs(self.room_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
