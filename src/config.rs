use crate::error::Error;
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CAPACITY: i64 = 64 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Byte budget for each captured stream.
    pub capacity: i64,
    /// How much to pull from a pipe per read.
    pub chunk_size: usize,
    /// Kill the child after this long. 0 waits forever.
    pub timeout_ms: u64,
    pub capture_stderr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_ms: 0,
            capture_stderr: true,
        }
    }
}

impl Config {
    /// Checks the values and returns the capacity as a buffer size.
    pub fn validate(&mut self) -> Result<usize, Error> {
        if self.capacity <= 0 {
            return Err(Error::InvalidCapacity(self.capacity));
        }
        if self.chunk_size == 0 {
            warn!("chunk_size = 0 is not usable, falling back to {}", DEFAULT_CHUNK_SIZE);
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        usize::try_from(self.capacity).map_err(|_| Error::InvalidCapacity(self.capacity))
    }
}

pub fn parse_config(content: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let cfg: Config =
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML config: {}", e))?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

    let cfg = parse_config(&content)
        .map_err(|e| format!("{} ({})", e, path.display()))?;

    log::info!("Config loaded from: {}", path.display());
    log::info!(
        "capacity={} chunk_size={} timeout_ms={} capture_stderr={}",
        cfg.capacity,
        cfg.chunk_size,
        cfg.timeout_ms,
        cfg.capture_stderr
    );

    if cfg.timeout_ms == 0 {
        log::debug!("No timeout configured - captured commands may run indefinitely");
    }

    Ok(cfg)
}
