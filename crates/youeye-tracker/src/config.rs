use crate::error::ConfigError;
use crate::subscription::DEFAULT_COMPACTION_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use youeye_core::PointOfView;

/// User-facing tracker configuration. Each `configure` call replaces the
/// previous value wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Eye whose position is reported. `None` reports the origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_of_view: Option<PointOfView>,
    /// Attach debug markers to the spatial model.
    pub show_tracking_visualization: bool,
}

impl TrackerConfig {
    pub fn new(point_of_view: Option<PointOfView>, show_tracking_visualization: bool) -> Self {
        Self {
            point_of_view,
            show_tracking_visualization,
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadFile(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// What to do when a tracking session keeps failing.
///
/// The default restarts immediately, forever. A cap bounds how many
/// back-to-back failures are retried before the tracker gives up and
/// detaches; a successful anchor update or an explicit `start` resets the
/// count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub max_consecutive_restarts: Option<u32>,
}

impl RecoveryPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn capped(max_consecutive_restarts: u32) -> Self {
        Self {
            max_consecutive_restarts: Some(max_consecutive_restarts),
        }
    }

    /// Whether restart number `attempt` (1-based) may proceed.
    pub fn allows_restart(&self, attempt: u32) -> bool {
        self.max_consecutive_restarts.map_or(true, |max| attempt <= max)
    }
}

/// Process tuning, loaded from `YOUEYE_*` environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Period of the subscriber registry's compaction timer.
    pub compaction_interval: Duration,
    pub recovery: RecoveryPolicy,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            compaction_interval: DEFAULT_COMPACTION_INTERVAL,
            recovery: RecoveryPolicy::default(),
        }
    }
}

impl TrackerSettings {
    /// Load settings from the process environment with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let compaction_interval = parse_u64(&lookup, "YOUEYE_COMPACTION_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.compaction_interval);
        let max_consecutive_restarts =
            parse_u64(&lookup, "YOUEYE_MAX_SESSION_RESTARTS").map(|v| v.min(u32::MAX as u64) as u32);

        Self {
            compaction_interval,
            recovery: RecoveryPolicy {
                max_consecutive_restarts,
            },
        }
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = raw, "ignoring unparsable setting");
            None
        }
    }
}
