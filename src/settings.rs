//! Run settings
//!
//! Cadence, budgets and replay pacing shared by every level. Loaded from a
//! JSON file next to the level data; every field has a default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_TICK_INTERVAL_MS, MAX_SUBSTEPS, MAZE_ACTION_CAP, MAZE_LOOP_BUDGET,
};
use crate::error::ConfigError;

/// Run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Cadence ===
    /// Milliseconds per tick for the live games
    pub tick_interval_ms: u32,
    /// Most ticks the driver runs for one wall-clock advance
    pub max_substeps: u32,

    // === Maze budgets ===
    /// Loop iterations allowed before a program counts as runaway
    pub loop_budget: u32,
    /// Hard cap on logged maze actions
    pub action_cap: u32,

    // === Maze replay pacing (ms per quarter step) ===
    pub success_step_ms: u32,
    pub failure_step_ms: u32,
    pub timeout_step_ms: u32,
    pub finish_dance_ms: u32,

    // === Bounce respawn ===
    /// Delay before a goal or missed ball is parked offscreen
    pub ball_offscreen_delay_ms: u32,
    /// Delay before a parked ball returns to its start
    pub ball_reset_delay_ms: u32,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_substeps: MAX_SUBSTEPS,

            loop_budget: MAZE_LOOP_BUDGET,
            action_cap: MAZE_ACTION_CAP,

            success_step_ms: 100,
            failure_step_ms: 150,
            timeout_step_ms: 0,
            finish_dance_ms: 150,

            ball_offscreen_delay_ms: 1000,
            ball_reset_delay_ms: 3000,

            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

impl Settings {
    /// Parse and validate settings
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Settings saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("tick_interval_ms", self.tick_interval_ms),
            ("max_substeps", self.max_substeps),
            ("loop_budget", self.loop_budget),
            ("action_cap", self.action_cap),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be at least 1".into(),
                });
            }
        }
        for (field, value) in [
            ("master_volume", self.master_volume),
            ("sfx_volume", self.sfx_volume),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("must be within 0.0 - 1.0, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Volume passed to the audio sink for every cue
    pub fn cue_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            // Cues were authored at half volume
            0.5 * self.master_volume * self.sfx_volume
        }
    }
}
