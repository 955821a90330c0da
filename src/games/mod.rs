//! Game variants built on the simulation core
//!
//! Each game owns an explicit state struct (its "world") that doubles as the
//! API surface passed to user handlers, plus a [`Simulation`] implementation
//! the driver steps.
//!
//! [`Simulation`]: crate::sim::Simulation

pub mod bounce;
pub mod flappy;
pub mod maze;

pub use bounce::{Bounce, BounceProgram, BounceSnapshot, BounceTrigger, BounceWorld};
pub use flappy::{Flappy, FlappyProgram, FlappySnapshot, FlappyTrigger, FlappyWorld};
pub use maze::{Halt, Maze, MazeAction, MazeApi, MazeFrame, MazeProgram, MazeSnapshot};

use crate::error::HandlerError;
use crate::sim::handlers::{Dispatch, HandlerTable, Trigger};
use crate::sim::state::GameEvent;

/// World state that records events for the current tick
pub trait EventLog {
    fn emit(&mut self, event: GameEvent);
}

/// Record a detected trigger, then run its handler if one is registered
pub(crate) fn fire<T: Trigger, A: EventLog>(
    handlers: &mut HandlerTable<T, A>,
    trigger: T,
    api: &mut A,
) -> Dispatch {
    api.emit(GameEvent::Trigger {
        name: trigger.name(),
    });
    let result = handlers.dispatch(trigger, api);
    if result == Dispatch::Failed {
        api.emit(GameEvent::HandlerFailed {
            trigger: trigger.name(),
        });
    }
    result
}

/// Accept a tuning value from user code only if it is finite and at least `min`
pub(crate) fn checked(field: &'static str, value: f64, min: f64) -> Result<f64, HandlerError> {
    if value.is_finite() && value >= min {
        Ok(value)
    } else {
        Err(HandlerError::InvalidNumber { field, value })
    }
}

/// Smallest gap a user may ask for
pub(crate) const MIN_GAP_HEIGHT: f64 = 0.1;
