// meridian_core/src/config/mod.rs
//
// Process-wide tunables (§4.8), layered the way a twelve-factor service
// loads its settings: compiled defaults, overlaid by an optional TOML
// file, overlaid by `MERIDIAN_*` environment variables, overlaid last by
// whatever the caller passes explicitly to the constructor. Loaded once
// at process start and handed by reference to `Exchange::new` — nothing
// below that boundary re-reads it.

use std::path::PathBuf;

use serde::Deserialize;

use crate::persistence::DEFAULT_WAL_SIZE;

/// Typed configuration for one `Exchange` process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one WAL segment file per market.
    pub wal_dir: PathBuf,
    /// Byte capacity of each market's WAL segment.
    pub wal_segment_size: usize,
    /// Bounded capacity of each market's intake channel (§5 backpressure).
    pub intake_channel_capacity: usize,
    /// Default per-market risk cap on a single order's quantity, absent
    /// a market-specific override.
    pub default_max_order_quantity: u64,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"meridian_core=debug,warn"`.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from("./data/wal"),
            wal_segment_size: DEFAULT_WAL_SIZE,
            intake_channel_capacity: 4_096,
            default_max_order_quantity: 1_000_000,
            log_level: "info".to_string(),
        }
    }
}

/// The TOML file shape: every field optional, since the file only
/// needs to name what it overrides.
#[derive(Debug, Default, Deserialize)]
struct EngineConfigFile {
    wal_dir: Option<PathBuf>,
    wal_segment_size: Option<usize>,
    intake_channel_capacity: Option<usize>,
    default_max_order_quantity: Option<u64>,
    log_level: Option<String>,
}

impl EngineConfig {
    /// Load config with the full layering: defaults, then `path` (if
    /// given and readable), then `MERIDIAN_*` environment variables.
    pub fn load(path: Option<&std::path::Path>) -> Self {
        let mut config = Self::default();

        if let Some(path) = path {
            match std::fs::read_to_string(path) {
                Ok(text) => match toml::from_str::<EngineConfigFile>(&text) {
                    Ok(file) => config.overlay_file(file),
                    Err(error) => {
                        tracing::warn!(%error, path = %path.display(), "failed to parse config file, using prior layer");
                    }
                },
                Err(error) => {
                    tracing::debug!(%error, path = %path.display(), "config file not readable, using prior layer");
                }
            }
        }

        config.overlay_env();
        config
    }

    fn overlay_file(&mut self, file: EngineConfigFile) {
        if let Some(v) = file.wal_dir {
            self.wal_dir = v;
        }
        if let Some(v) = file.wal_segment_size {
            self.wal_segment_size = v;
        }
        if let Some(v) = file.intake_channel_capacity {
            self.intake_channel_capacity = v;
        }
        if let Some(v) = file.default_max_order_quantity {
            self.default_max_order_quantity = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
    }

    fn overlay_env(&mut self) {
        if let Ok(v) = std::env::var("MERIDIAN_WAL_DIR") {
            self.wal_dir = PathBuf::from(v);
        }
        if let Some(v) = std::env::var("MERIDIAN_WAL_SEGMENT_SIZE").ok().and_then(|v| v.parse().ok()) {
            self.wal_segment_size = v;
        }
        if let Some(v) = std::env::var("MERIDIAN_INTAKE_CHANNEL_CAPACITY").ok().and_then(|v| v.parse().ok()) {
            self.intake_channel_capacity = v;
        }
        if let Some(v) = std::env::var("MERIDIAN_MAX_ORDER_QUANTITY").ok().and_then(|v| v.parse().ok()) {
            self.default_max_order_quantity = v;
        }
        if let Ok(v) = std::env::var("MERIDIAN_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    /// Install a `tracing` subscriber driven by this config's log level
    /// (§4.9). Idempotent: a process that calls this twice (e.g. in
    /// tests) simply keeps the first subscriber.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
