//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (spawn order from the grid scan)
//! - No rendering or platform dependencies

pub mod collision;
pub mod grid;
pub mod handlers;
pub mod input;
pub mod outcome;
pub mod scheduler;
pub mod state;

pub use collision::{
    Aabb, GapColumn, Reflection, is_path, paddle_rebound, rebound_off_paddle, reflect_off_bounds,
    touches_paddle,
};
pub use grid::{Grid, Markers, SquareType, single_marker};
pub use handlers::{Dispatch, Handler, HandlerResult, HandlerTable, Trigger, UserProgram};
pub use input::{Arrow, InputState};
pub use outcome::{ErrorReason, FinishProgress, Outcome, RunReport, TickLimit, update_finishes};
pub use scheduler::{
    AudioObserver, GameLoop, NullObserver, RunObserver, RunPhase, Simulation, TaskId, TaskQueue,
    ms_to_ticks,
};
pub use state::{
    Avatar, Ball, Direction, FinishMarker, GameEvent, Paddle, Pegman, RelativeDirection,
};
