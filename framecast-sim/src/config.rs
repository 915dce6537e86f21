//! Configuration for the simulator.

use std::path::Path;

use framecast_core::FilterSettings;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Outbound stream settings.
    pub output: OutputConfig,
    /// Tick pacing.
    pub timing: TimingConfig,
    /// Test pattern geometry.
    pub pattern: PatternConfig,
    /// Scripted mid-run events.
    pub script: ScriptConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Outbound stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// User-visible name of the published stream.
    pub sender_name: String,
    /// Ring depth handed to the filter (clamped to 2..=8 there).
    pub ring_depth: usize,
}

/// Tick pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Render ticks per second.
    pub tick_rate: u32,
    /// Total ticks to run (0 = run until Ctrl-C).
    pub ticks: u64,
}

/// Test pattern geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

/// Scripted mid-run events. A tick value of 0 disables the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Tick at which the output resolution changes.
    pub resize_at_tick: u64,
    /// Width after the scripted resize.
    pub resize_width: u32,
    /// Height after the scripted resize.
    pub resize_height: u32,
    /// Tick at which the stream is renamed.
    pub rename_at_tick: u64,
    /// New stream name for the scripted rename.
    pub rename_to: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            timing: TimingConfig::default(),
            pattern: PatternConfig::default(),
            script: ScriptConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sender_name: "Framecast Sim".into(),
            ring_depth: 2,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            ticks: 300,
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            resize_at_tick: 0,
            resize_width: 1920,
            resize_height: 1080,
            rename_at_tick: 0,
            rename_to: "Framecast Sim B".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SimConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Settings the filter will be created with.
    pub fn to_filter_settings(&self) -> FilterSettings {
        FilterSettings {
            sender_name: self.output.sender_name.clone(),
            ring_depth: self.output.ring_depth,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
