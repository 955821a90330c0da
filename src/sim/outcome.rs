//! Outcome evaluation
//!
//! Win/fail/timeout classification of a run plus the report handed to the
//! scoring collaborator when a run ends.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::state::FinishMarker;
use crate::consts::FINISH_VARIANCE;
use crate::essentially_equal;

/// Why a run ended in error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// The program walked into a wall or obstacle
    Collision,
    /// Anything else the program did wrong
    Program(String),
}

/// Classification of a run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Unset,
    Success,
    Failure,
    Timeout,
    Error(ErrorReason),
}

impl Outcome {
    /// Numeric code reported to the server
    pub fn code(&self) -> i32 {
        match self {
            Outcome::Unset => 0,
            Outcome::Success => 1,
            Outcome::Failure => -1,
            Outcome::Timeout => 2,
            Outcome::Error(_) => -2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Unset)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Emitted once per run on its terminal outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub result: bool,
    pub outcome_code: i32,
    pub tick_count: u64,
    pub outcome: Outcome,
}

impl RunReport {
    pub fn new(outcome: Outcome, tick_count: u64) -> Self {
        Self {
            result: outcome.is_success(),
            outcome_code: outcome.code(),
            tick_count,
            outcome,
        }
    }
}

/// Progress made toward a set of finish markers this tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishProgress {
    /// Markers that became finished this tick
    pub newly_finished: Vec<usize>,
    pub all_finished: bool,
}

/// Mark every unfinished marker the entity now sits on and report whether
/// all markers are finished
pub fn update_finishes(markers: &mut [FinishMarker], pos: DVec2) -> FinishProgress {
    let mut progress = FinishProgress::default();
    for (i, marker) in markers.iter_mut().enumerate() {
        if !marker.finished && at_position(pos, marker.pos) {
            marker.finished = true;
            progress.newly_finished.push(i);
        }
    }
    progress.all_finished = !markers.is_empty() && markers.iter().all(|m| m.finished);
    progress
}

/// Proximity-equality on both axes with the finish tolerance
#[inline]
pub fn at_position(pos: DVec2, target: DVec2) -> bool {
    essentially_equal(pos.x, target.x, FINISH_VARIANCE)
        && essentially_equal(pos.y, target.y, FINISH_VARIANCE)
}

/// Tick-count timeout; `None` never expires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickLimit(pub Option<u64>);

impl TickLimit {
    pub fn expired(&self, tick_count: u64) -> bool {
        self.0.is_some_and(|limit| tick_count > limit)
    }

    /// Convert a timeout in seconds at the given tick interval
    pub fn from_seconds(seconds: f64, tick_interval_ms: u32) -> Self {
        if !seconds.is_finite() || seconds <= 0.0 || tick_interval_ms == 0 {
            return TickLimit(None);
        }
        TickLimit(Some((seconds * 1000.0 / tick_interval_ms as f64).ceil() as u64))
    }
}
