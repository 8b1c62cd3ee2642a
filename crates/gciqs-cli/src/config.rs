//! Command-line arguments and client configuration.

use std::time::Duration;

use clap::Parser;

/// GCIQS - terminal client for genomic question answering.
#[derive(Parser, Debug)]
#[command(name = "gciqs")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Query service URL.
    #[arg(long, env = "GCIQS_SERVER", default_value = "http://localhost:8000")]
    pub server: String,

    /// Number of reference documents to retrieve (the service caps this at 10).
    #[arg(
        long,
        env = "GCIQS_TOP_K",
        default_value_t = 5,
        value_parser = clap::value_parser!(u8).range(1..=10)
    )]
    pub top_k: u8,

    /// Seconds between health checks.
    #[arg(long, default_value_t = 30)]
    pub health_interval: u64,

    /// Ask one question, print the answer to stdout, and exit.
    #[arg(long)]
    pub query: Option<String>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    pub debug: bool,
}

/// Settings shared by the terminal and one-shot front ends.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the query service.
    pub server: String,

    /// References requested per query.
    pub top_k: u8,

    /// Health check interval in seconds.
    pub health_interval_seconds: u64,
}

impl ClientConfig {
    /// Upper bound the service applies to `top_k`.
    pub const MAX_TOP_K: u8 = 10;

    fn default_server() -> String {
        "http://localhost:8000".to_string()
    }

    const fn default_top_k() -> u8 {
        gciqs_core::DEFAULT_TOP_K
    }

    const fn default_health_interval() -> u64 {
        30
    }

    /// Get the health check interval as a `Duration`.
    ///
    /// Never shorter than one second.
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_seconds.max(1))
    }

    /// `top_k` clamped to the range the service accepts.
    #[must_use]
    pub fn effective_top_k(&self) -> u8 {
        self.top_k.clamp(1, Self::MAX_TOP_K)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: Self::default_server(),
            top_k: Self::default_top_k(),
            health_interval_seconds: Self::default_health_interval(),
        }
    }
}

impl From<&Args> for ClientConfig {
    fn from(args: &Args) -> Self {
        Self {
            server: args.server.clone(),
            top_k: args.top_k,
            health_interval_seconds: args.health_interval,
        }
    }
}
