use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    // ── HTTP server ─────────────────────────────────────────────────
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8080")]
    pub port: u16,

    // ── Allocation ──────────────────────────────────────────────────
    /// One of `least-weighted` or `consistent-hashing`.
    #[envconfig(default = "consistent-hashing")]
    pub allocation_strategy: String,

    // ── Discovery ───────────────────────────────────────────────────
    #[envconfig(default = "/conf/targets.json")]
    pub discovery_file: String,

    #[envconfig(default = "30")]
    pub discovery_interval_secs: u64,

    /// Comma-separated collector names. When set, replaces the collector
    /// list from the discovery file.
    #[envconfig(default = "")]
    pub collectors: String,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs.max(1))
    }

    pub fn static_collectors(&self) -> Vec<String> {
        self.collectors
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
