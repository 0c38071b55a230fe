//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/clippings.sqlite"
//!
//! [ingest]
//! max_record_bytes = 1048576
//! read_buffer_bytes = 65536
//! location_merge = "legacy"
//! ```
//!
//! The `[ingest]` table is optional.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use annotation_harness_core::ingest::IngestOptions;
use annotation_harness_core::merge::LocationMergePolicy;
use annotation_harness_core::splitter::{DEFAULT_MAX_RECORD_BYTES, DEFAULT_READ_BUFFER_BYTES};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
    #[serde(default)]
    pub location_merge: LocationMergePolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            location_merge: LocationMergePolicy::default(),
        }
    }
}

fn default_max_record_bytes() -> usize {
    DEFAULT_MAX_RECORD_BYTES
}
fn default_read_buffer_bytes() -> usize {
    DEFAULT_READ_BUFFER_BYTES
}

impl IngestConfig {
    /// Driver options for this configuration.
    pub fn options(&self) -> IngestOptions {
        IngestOptions {
            max_record_bytes: self.max_record_bytes,
            read_buffer_bytes: self.read_buffer_bytes,
            location_merge: self.location_merge,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.ingest.max_record_bytes == 0 {
        anyhow::bail!("ingest.max_record_bytes must be > 0");
    }
    if config.ingest.read_buffer_bytes == 0 {
        anyhow::bail!("ingest.read_buffer_bytes must be > 0");
    }
    if config.ingest.read_buffer_bytes > config.ingest.max_record_bytes {
        anyhow::bail!(
            "ingest.read_buffer_bytes ({}) must not exceed ingest.max_record_bytes ({})",
            config.ingest.read_buffer_bytes,
            config.ingest.max_record_bytes
        );
    }

    Ok(config)
}
