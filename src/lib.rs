//! Block Arcade - simulation core for block-programmed puzzle games
//!
//! Core modules:
//! - `sim`: Deterministic simulation (grid, entities, collisions, dispatch, scheduling)
//! - `games`: The maze, bounce and flappy variants built on `sim`
//! - `level`: Level configuration input
//! - `settings`: Run settings (tick cadence, budgets)
//! - `audio`: Sound cue boundary
//! - `progress`: Per-level attempt and completion tracking

pub mod audio;
pub mod demo;
pub mod error;
pub mod games;
pub mod level;
pub mod progress;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, HandlerError};
pub use level::{GameKind, GoalCondition, LevelConfig};
pub use progress::Progress;
pub use settings::Settings;

use std::f64::consts::TAU;

/// Game configuration constants
pub mod consts {
    /// Default milliseconds between ticks for the live games (~30 Hz)
    pub const DEFAULT_TICK_INTERVAL_MS: u32 = 33;
    /// Maximum ticks run per driver advance to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Default tolerance for approximate equality
    pub const DEFAULT_VARIANCE: f64 = 0.01;
    /// Tolerance used when checking whether an entity sits on a finish marker
    pub const FINISH_VARIANCE: f64 = 0.2;

    /// Ball/paddle centers closer than this collide (grid units)
    pub const PADDLE_BALL_COLLIDE_DISTANCE: f64 = 0.7;
    /// Balls may rise this far above row 0 before reflecting
    pub const Y_TOP_BOUNDARY: f64 = -0.2;
    /// Default ball heading when the level gives none (down-left)
    pub const DEFAULT_BALL_DIRECTION: f64 = 1.25 * std::f64::consts::PI;
    /// Where balls are parked while waiting to respawn
    pub const OFFSCREEN_POSITION: f64 = 100.0;

    /// Flappy gravity per tick (grid units / tick²)
    pub const FLAPPY_GRAVITY: f64 = 0.005;
    /// Flappy upward velocity applied by a normal flap
    pub const FLAP_VELOCITY: f64 = 0.11;

    /// Maze loop budget before the program is considered runaway
    pub const MAZE_LOOP_BUDGET: u32 = 50;
    /// Hard cap on maze API calls regardless of loop checks
    pub const MAZE_ACTION_CAP: u32 = 10_000;
    /// Sub-ticks between two logged maze actions
    pub const MAZE_STEP_SCALE: u32 = 5;
}

/// Named speeds offered by the speed blocks (grid units per tick)
pub mod speed {
    pub const VERY_SLOW: f64 = 0.04;
    pub const SLOW: f64 = 0.06;
    pub const NORMAL: f64 = 0.1;
    pub const FAST: f64 = 0.15;
    pub const VERY_FAST: f64 = 0.23;

    /// Resolve a speed block value such as `"VERY_SLOW"`
    pub fn from_name(name: &str) -> Option<f64> {
        match name.to_ascii_uppercase().as_str() {
            "VERY_SLOW" => Some(VERY_SLOW),
            "SLOW" => Some(SLOW),
            "NORMAL" => Some(NORMAL),
            "FAST" => Some(FAST),
            "VERY_FAST" => Some(VERY_FAST),
            _ => None,
        }
    }
}

/// Keep a 4-way direction within 0-3, wrapping at both ends
#[inline]
pub fn constrain_direction4(d: i32) -> i32 {
    d.rem_euclid(4)
}

/// Keep a 16-way direction within 0-15, wrapping at both ends
#[inline]
pub fn constrain_direction16(d: i32) -> i32 {
    d.rem_euclid(16)
}

/// Normalize a heading in radians to [0, 2π)
#[inline]
pub fn normalize_heading(heading: f64) -> f64 {
    let h = heading.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if h >= TAU { 0.0 } else { h }
}

/// Approximate equality within `variance`
#[inline]
pub fn essentially_equal(a: f64, b: f64, variance: f64) -> bool {
    (a - b).abs() < variance
}

/// Euclidean distance for an offset
#[inline]
pub fn distance(dx: f64, dy: f64) -> f64 {
    (dx * dx + dy * dy).sqrt()
}
