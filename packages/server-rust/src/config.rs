//! Command-line and environment configuration for the function server.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::network::{NetworkConfig, DEFAULT_MAX_BODY_BYTES};

/// Output format of the process's own log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Command-line arguments for the function server.
#[derive(Parser, Debug, Clone)]
#[command(name = "function-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serves one handler over HTTP with deadlines, output capture and liveness")]
pub struct ServerArgs {
    /// Fully-qualified handler name, e.g. `example.handler.hello`
    #[arg(value_name = "HANDLER")]
    pub handler: String,

    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on (0 picks a free port)
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Largest request body accepted, in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Seconds to wait for in-flight invocations on shutdown
    #[arg(long, env = "DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    pub drain_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ServerArgs {
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            max_body_bytes: self.max_body_bytes,
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
        }
    }
}
