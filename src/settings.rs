use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::host::{DEFAULT_SNAPSHOT_LENGTH, DEFAULT_TIMEOUT_MS};

// Settings for the capture tool, read from `config/default.toml` and
// overridable with `PKTCAP_*` environment variables.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log_level: String,
    // Prompt for a device when unset.
    pub device: Option<String>,
    pub snapshot_length: i32,
    pub promiscuous: bool,
    pub timeout_ms: i32,
    pub filter: Option<String>,
    pub packet_count: i32,
    // Stop the capture out-of-band after this many seconds.
    pub capture_seconds: Option<u64>,
    pub worker_threads: usize,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("config/default")
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("log_level", "info")?
            .set_default("snapshot_length", DEFAULT_SNAPSHOT_LENGTH)?
            .set_default("promiscuous", true)?
            .set_default("timeout_ms", DEFAULT_TIMEOUT_MS)?
            .set_default("packet_count", 0)?
            .set_default("worker_threads", 1)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("PKTCAP"));

        builder.build()?.try_deserialize()
    }
}
