//! Per-level progress
//!
//! Fed by the run reports of finished runs, persisted as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sim::outcome::RunReport;

/// Record for a single level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    /// Finished runs, successful or not
    pub attempts: u32,
    pub completions: u32,
    /// Fewest ticks of any successful run
    pub best_ticks: Option<u64>,
    /// Outcome code of the most recent run
    pub last_outcome_code: i32,
}

impl LevelRecord {
    pub fn is_complete(&self) -> bool {
        self.completions > 0
    }
}

/// Progress across levels, keyed by level id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub levels: BTreeMap<String, LevelRecord>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished run. Returns true when it set a new best.
    pub fn record(&mut self, level_id: &str, report: &RunReport) -> bool {
        let entry = self.levels.entry(level_id.to_string()).or_default();
        entry.attempts += 1;
        entry.last_outcome_code = report.outcome_code;
        if !report.result {
            return false;
        }
        entry.completions += 1;

        let improved = entry.best_ticks.is_none_or(|best| report.tick_count < best);
        if improved {
            entry.best_ticks = Some(report.tick_count);
            log::info!("New best for '{}': {} ticks", level_id, report.tick_count);
        }
        improved
    }

    pub fn level(&self, level_id: &str) -> Option<&LevelRecord> {
        self.levels.get(level_id)
    }

    pub fn is_complete(&self, level_id: &str) -> bool {
        self.level(level_id).is_some_and(LevelRecord::is_complete)
    }

    pub fn completed_count(&self) -> usize {
        self.levels.values().filter(|r| r.is_complete()).count()
    }

    /// Load progress, starting fresh if the file does not exist yet
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No progress found, starting fresh");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        let progress: Progress = serde_json::from_str(&json)?;
        log::info!("Loaded progress for {} levels", progress.levels.len());
        Ok(progress)
    }

    /// Load the file at `path`, record one run and write it back.
    /// Returns true when the run set a new best.
    pub fn record_to(path: impl AsRef<Path>, level_id: &str, report: &RunReport) -> Result<bool, ConfigError> {
        let path = path.as_ref();
        let mut progress = Self::load(path)?;
        let improved = progress.record(level_id, report);
        progress.save(path)?;
        Ok(improved)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Progress saved ({} levels)", self.levels.len());
        Ok(())
    }
}
