//! Entity state and motion
//!
//! Positions are in grid units (x grows right, y grows down). Headings for
//! free-moving entities are radians in [0, 2π) measured clockwise from north.

use glam::{DVec2, IVec2};
use serde::{Deserialize, Serialize};

use crate::audio::SoundCue;
use crate::{constrain_direction4, normalize_heading};

/// 4-way grid heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North = 0,
    #[default]
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    /// Wrap any integer into a direction
    pub fn from_index(d: i32) -> Self {
        match constrain_direction4(d) {
            0 => Direction::North,
            1 => Direction::East,
            2 => Direction::South,
            _ => Direction::West,
        }
    }

    #[inline]
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Clockwise quarter turn
    pub fn turned_right(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// Counter-clockwise quarter turn
    pub fn turned_left(self) -> Self {
        Self::from_index(self.index() - 1)
    }

    /// Absolute direction of a heading-relative one
    pub fn relative(self, rel: RelativeDirection) -> Self {
        Self::from_index(self.index() + rel as i32)
    }

    /// One-cell offset in screen space
    pub fn offset(self) -> IVec2 {
        match self {
            Direction::North => IVec2::new(0, -1),
            Direction::East => IVec2::new(1, 0),
            Direction::South => IVec2::new(0, 1),
            Direction::West => IVec2::new(-1, 0),
        }
    }

    /// Sprite frame in the 16-way direction space
    #[inline]
    pub fn as_16(self) -> i32 {
        self.index() * 4
    }
}

/// Direction relative to an entity's current heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeDirection {
    Forward = 0,
    Right = 1,
    Backward = 2,
    Left = 3,
}

/// Grid-stepping avatar of the maze
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pegman {
    pub cell: IVec2,
    pub direction: Direction,
}

impl Pegman {
    pub fn new(cell: IVec2, direction: Direction) -> Self {
        Self { cell, direction }
    }

    /// Cell one step away in a heading-relative direction
    pub fn neighbor(&self, rel: RelativeDirection) -> IVec2 {
        self.cell + self.direction.relative(rel).offset()
    }
}

/// A free-moving ball
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub pos: DVec2,
    /// Radians, clockwise from north
    pub heading: f64,
    /// Grid units per tick
    pub speed: f64,
    /// Spawn position and heading, restored on respawn
    pub start: DVec2,
    pub start_heading: f64,
}

impl Ball {
    pub fn new(id: u32, start: DVec2, start_heading: f64, speed: f64) -> Self {
        let start_heading = normalize_heading(start_heading);
        Self {
            id,
            pos: start,
            heading: start_heading,
            speed,
            start,
            start_heading,
        }
    }

    /// Per-tick displacement for the current heading
    pub fn velocity(&self) -> DVec2 {
        DVec2::new(
            self.speed * self.heading.sin(),
            -self.speed * self.heading.cos(),
        )
    }

    /// Integrate one tick of motion
    pub fn advance(&mut self) {
        self.pos += self.velocity();
    }

    /// Set a new heading, keeping it normalized
    pub fn set_heading(&mut self, heading: f64) {
        self.heading = normalize_heading(heading);
    }

    /// Return to the spawn point
    pub fn respawn(&mut self) {
        self.pos = self.start;
        self.heading = self.start_heading;
    }

    /// Park far outside the grid heading east so it triggers nothing
    pub fn park_offscreen(&mut self, at: f64) {
        self.pos = DVec2::splat(at);
        self.heading = std::f64::consts::FRAC_PI_2;
    }
}

/// Player-controlled paddle (also the flappy avatar's base position)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paddle {
    pub pos: DVec2,
    /// Grid units per move command
    pub speed: f64,
    pub start: DVec2,
}

impl Paddle {
    pub fn new(start: DVec2, speed: f64) -> Self {
        Self {
            pos: start,
            speed,
            start,
        }
    }

    /// Move by `delta`, clamped into `[0, max]` on both axes
    pub fn nudge(&mut self, delta: DVec2, max: DVec2) {
        self.pos = (self.pos + delta).clamp(DVec2::ZERO, max);
    }
}

/// Gravity-driven avatar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Avatar {
    pub pos: DVec2,
    /// Vertical velocity, grid units per tick (positive is down)
    pub velocity: f64,
    pub start: DVec2,
}

impl Avatar {
    pub fn new(start: DVec2) -> Self {
        Self {
            pos: start,
            velocity: 0.0,
            start,
        }
    }

    /// Integrate gravity for one tick and clamp into `[ceiling, floor]`
    ///
    /// Returns true when the avatar reached the floor this tick.
    pub fn fall(&mut self, gravity: f64, ceiling: f64, floor: f64) -> bool {
        let was_above = self.pos.y < floor;
        self.velocity += gravity;
        self.pos.y += self.velocity;
        if self.pos.y < ceiling {
            self.pos.y = ceiling;
            self.velocity = 0.0;
        }
        if self.pos.y >= floor {
            self.pos.y = floor;
            self.velocity = 0.0;
            return was_above;
        }
        false
    }
}

/// A finish location that stays finished for the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinishMarker {
    pub pos: DVec2,
    pub finished: bool,
}

impl FinishMarker {
    pub fn at(cell: IVec2) -> Self {
        Self {
            pos: cell.as_dvec2(),
            finished: false,
        }
    }
}

/// Events produced by a tick, consumed by renderers and reporters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A sound the front end should play
    Sound { cue: SoundCue },
    /// A trigger condition was detected (fired whether or not a handler exists)
    Trigger { name: &'static str },
    /// A user handler failed and was skipped
    HandlerFailed { trigger: &'static str },
    /// Finish marker `index` was reached
    FinishReached { index: usize },
    /// Ball `index` was moved offscreen pending respawn
    BallParked { index: usize },
    /// Ball `index` returned to its start
    BallRespawned { index: usize },
    /// The avatar cleared an obstacle
    ObstaclePassed { index: usize },
    /// The pegman checked for a path in `direction`
    Look { direction: Direction },
}
