//! Level configuration
//!
//! Levels arrive as JSON from the level-loading collaborator. Map squares may
//! be given as names (`"WALL"`, `"PADDLE_START"`) or as the numeric codes the
//! level files have always used; the two code tables differ between the maze
//! and the arcade games.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{FLAP_VELOCITY, FLAPPY_GRAVITY, MAZE_STEP_SCALE};
use crate::error::ConfigError;
use crate::settings::Settings;
use crate::sim::grid::{Grid, SquareType, single_marker};
use crate::sim::outcome::TickLimit;
use crate::sim::state::Direction;
use crate::speed;

/// Which game a level belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    #[default]
    Maze,
    Bounce,
    Flappy,
}

impl GameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Maze => "maze",
            GameKind::Bounce => "bounce",
            GameKind::Flappy => "flappy",
        }
    }
}

/// One map square as written in level data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapCell {
    Code(i64),
    Name(SquareType),
}

/// Extra success predicate checked every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalCondition {
    /// Player score reached a threshold
    PlayerScore { at_least: u32 },
    /// Avatar cleared enough obstacles
    ObstaclesPassed { at_least: u32 },
    /// Free play: only an explicit `end_game` completes the level
    Survive,
}

/// Timing scale overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scale {
    /// Maze: sub-ticks between logged actions. Arcade games: ms per tick.
    pub step_speed: Option<u32>,
}

/// Side-scroller tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlappyTuning {
    /// Downward acceleration, cells per tick²
    pub gravity: f64,
    /// Upward velocity set by a flap
    pub flap_velocity: f64,
    /// Leftward obstacle motion, cells per tick
    pub scroll_speed: f64,
    /// Horizontal distance between spawned obstacles
    pub obstacle_spacing: f64,
    pub obstacle_width: f64,
    /// Height of the open band in each obstacle
    pub gap_height: f64,
    /// Keep spawning obstacles once the map's own ones scrolled by
    pub spawn_obstacles: bool,
}

impl Default for FlappyTuning {
    fn default() -> Self {
        Self {
            gravity: FLAPPY_GRAVITY,
            flap_velocity: FLAP_VELOCITY,
            scroll_speed: 0.05,
            obstacle_spacing: 4.0,
            obstacle_width: 1.0,
            gap_height: 3.0,
            spawn_obstacles: true,
        }
    }
}

/// Level definition as supplied by the loader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Level identifier used for progress tracking
    pub id: String,
    pub game: GameKind,
    pub map: Vec<Vec<MapCell>>,
    /// Maze start heading
    pub start_direction: Direction,
    /// Ball start heading in radians (bounce)
    pub ball_direction: Option<f64>,
    /// Timeout in seconds
    pub timeout_failure: Option<f64>,
    /// Timeout in ticks, takes precedence over seconds
    pub timeout_failure_tick: Option<u64>,
    pub scale: Scale,
    pub ball_speed: f64,
    pub paddle_speed: f64,
    pub goal: Option<GoalCondition>,
    pub flappy: FlappyTuning,
    /// Seed for cosmetic and layout randomness
    pub seed: u64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            game: GameKind::Maze,
            map: Vec::new(),
            start_direction: Direction::East,
            ball_direction: None,
            timeout_failure: None,
            timeout_failure_tick: None,
            scale: Scale::default(),
            ball_speed: speed::NORMAL,
            paddle_speed: speed::NORMAL,
            goal: None,
            flappy: FlappyTuning::default(),
            seed: 0,
        }
    }
}

impl LevelConfig {
    /// Parse and validate a level
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let level: LevelConfig = serde_json::from_str(json)?;
        level.validate()?;
        Ok(level)
    }

    /// Read, parse and validate a level file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let level = Self::from_json(&json)?;
        log::info!("Loaded {} level '{}' from {}", level.game.as_str(), level.id, path.display());
        Ok(level)
    }

    /// Decode the map with the code table of this level's game
    pub fn grid(&self) -> Result<Grid, ConfigError> {
        let decode = match self.game {
            GameKind::Maze => SquareType::from_maze_code,
            GameKind::Bounce | GameKind::Flappy => SquareType::from_arcade_code,
        };
        let mut rows = Vec::with_capacity(self.map.len());
        for (y, row) in self.map.iter().enumerate() {
            let mut decoded = Vec::with_capacity(row.len());
            for (x, cell) in row.iter().enumerate() {
                decoded.push(match *cell {
                    MapCell::Name(square) => square,
                    MapCell::Code(code) => {
                        decode(code).ok_or(ConfigError::UnknownSquare { code, x, y })?
                    }
                });
            }
            rows.push(decoded);
        }
        Grid::new(rows)
    }

    /// Fail with `WrongGame` unless this level is for `expected`
    pub fn expect_game(&self, expected: GameKind) -> Result<(), ConfigError> {
        if self.game != expected {
            return Err(ConfigError::WrongGame {
                expected,
                found: self.game,
            });
        }
        Ok(())
    }

    /// Check everything a game needs before it can be built
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = self.grid()?;
        let markers = grid.scan_markers();
        match self.game {
            GameKind::Maze => {
                single_marker(&markers.starts, SquareType::Start)?;
                single_marker(&markers.finishes, SquareType::Finish)?;
            }
            GameKind::Bounce => {
                single_marker(&markers.paddle_starts, SquareType::PaddleStart)?;
                if markers.ball_finishes.len() > 1 {
                    return Err(ConfigError::DuplicateMarker(SquareType::BallFinish));
                }
                positive("ball_speed", self.ball_speed)?;
                positive("paddle_speed", self.paddle_speed)?;
            }
            GameKind::Flappy => {
                single_marker(&markers.paddle_starts, SquareType::PaddleStart)?;
                let tuning = &self.flappy;
                non_negative("flappy.gravity", tuning.gravity)?;
                non_negative("flappy.flap_velocity", tuning.flap_velocity)?;
                non_negative("flappy.scroll_speed", tuning.scroll_speed)?;
                positive("flappy.obstacle_spacing", tuning.obstacle_spacing)?;
                positive("flappy.obstacle_width", tuning.obstacle_width)?;
                positive("flappy.gap_height", tuning.gap_height)?;
            }
        }
        if let Some(seconds) = self.timeout_failure {
            positive("timeout_failure", seconds)?;
        }
        if self.scale.step_speed == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "scale.step_speed",
                reason: "must be at least 1".into(),
            });
        }
        if self.ball_direction.is_some_and(|h| !h.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "ball_direction",
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }

    /// Milliseconds per tick for the live games
    pub fn tick_interval_ms(&self, settings: &Settings) -> u32 {
        self.scale.step_speed.unwrap_or(settings.tick_interval_ms)
    }

    /// Maze sub-ticks between two logged actions
    pub fn step_scale(&self) -> u32 {
        self.scale.step_speed.unwrap_or(MAZE_STEP_SCALE)
    }

    /// Tick-count timeout for this level at the given cadence
    pub fn tick_limit(&self, tick_interval_ms: u32) -> TickLimit {
        match (self.timeout_failure_tick, self.timeout_failure) {
            (Some(ticks), _) => TickLimit(Some(ticks)),
            (None, Some(seconds)) => TickLimit::from_seconds(seconds, tick_interval_ms),
            (None, None) => TickLimit(None),
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be positive, got {value}"),
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be zero or more, got {value}"),
        })
    }
}
