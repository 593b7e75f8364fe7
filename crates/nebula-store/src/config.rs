//! `config.toml` in the data directory. Every field is optional; a missing
//! file is the default configuration.
//!
//! ```toml
//! frame_rate = 30
//! backup_interval_secs = 3600
//! preserve_glimmer = true
//! remote = "http://127.0.0.1:7878"
//!
//! [viewport]
//! width = 160
//! height = 48
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use nebula_core::{FEED_LIMIT, GlimmerPolicy, Viewport};

use crate::error::{Result, StoreError};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:7878";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 120.0,
            height: 40.0,
        }
    }
}

impl From<ViewportConfig> for Viewport {
    fn from(v: ViewportConfig) -> Self {
        Viewport::new(v.width, v.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub viewport: ViewportConfig,
    /// Animation ticks per second.
    pub frame_rate: u32,
    pub backup_interval_secs: u64,
    pub feed_limit: usize,
    /// Carry active glimmers across feed updates instead of dropping them.
    pub preserve_glimmer: bool,
    /// Base URL of a remote feed server. Local log when absent.
    pub remote: Option<String>,
    pub listen: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            frame_rate: 30,
            backup_interval_secs: 3600,
            feed_limit: FEED_LIMIT,
            preserve_glimmer: false,
            remote: None,
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(s).map_err(|e| StoreError::InvalidData(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 {
            return Err(StoreError::InvalidData(
                "config: frame_rate must be positive".into(),
            ));
        }
        if self.backup_interval_secs == 0 {
            return Err(StoreError::InvalidData(
                "config: backup_interval_secs must be positive".into(),
            ));
        }
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            return Err(StoreError::InvalidData(
                "config: viewport dimensions must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Feed cap, never above the global limit.
    pub fn feed_limit(&self) -> usize {
        self.feed_limit.clamp(1, FEED_LIMIT)
    }

    pub fn glimmer_policy(&self) -> GlimmerPolicy {
        if self.preserve_glimmer {
            GlimmerPolicy::Carry
        } else {
            GlimmerPolicy::Reset
        }
    }
}
