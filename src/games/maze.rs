//! Maze navigation
//!
//! The user's program runs to completion first, against a scratch pegman,
//! producing a transcript of actions. The run is then replayed tick by tick:
//! every action becomes four quarter-step frames and the next action starts
//! `step_scale` ticks later. Replay speed depends on how the program ended.

use std::panic::{AssertUnwindSafe, catch_unwind};

use glam::{DVec2, IVec2};
use serde::Serialize;

use crate::audio::SoundCue;
use crate::constrain_direction16;
use crate::error::{ConfigError, HandlerError};
use crate::level::{GameKind, LevelConfig};
use crate::settings::Settings;
use crate::sim::collision::is_path;
use crate::sim::grid::{Grid, SquareType, single_marker};
use crate::sim::outcome::{ErrorReason, Outcome, RunReport};
use crate::sim::scheduler::{RunPhase, Simulation, TaskQueue};
use crate::sim::state::{Direction, GameEvent, Pegman, RelativeDirection};

/// Dance frames shown when the pegman reaches the finish
const DANCE_FRAME: i32 = 16;
const DANCE_FRAME_ALT: i32 = 18;

/// How far a failed move bumps toward the wall
const BUMP_DISTANCE: f64 = 0.25;

/// Why a maze program stopped early
#[derive(Debug, Clone, PartialEq)]
pub enum Halt {
    /// The pegman reached the finish
    Finished,
    /// A move ran into a wall or obstacle
    Collided,
    /// Loop budget or action cap exhausted
    OutOfSteps,
    /// The program itself failed
    Failed(HandlerError),
}

impl From<HandlerError> for Halt {
    fn from(err: HandlerError) -> Self {
        Halt::Failed(err)
    }
}

impl Halt {
    pub fn into_outcome(self) -> Outcome {
        match self {
            Halt::Finished => Outcome::Success,
            Halt::Collided => Outcome::Error(ErrorReason::Collision),
            Halt::OutOfSteps => Outcome::Timeout,
            Halt::Failed(err) => Outcome::Error(ErrorReason::Program(err.to_string())),
        }
    }
}

/// One entry of the program transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "direction", rename_all = "snake_case")]
pub enum MazeAction {
    /// Successful move, in absolute direction
    Move(Direction),
    TurnLeft,
    TurnRight,
    FailForward,
    FailBackward,
    Look(Direction),
    Finish,
}

impl MazeAction {
    pub fn name(&self) -> &'static str {
        match self {
            MazeAction::Move(Direction::North) => "north",
            MazeAction::Move(Direction::East) => "east",
            MazeAction::Move(Direction::South) => "south",
            MazeAction::Move(Direction::West) => "west",
            MazeAction::TurnLeft => "left",
            MazeAction::TurnRight => "right",
            MazeAction::FailForward => "fail_forward",
            MazeAction::FailBackward => "fail_backward",
            MazeAction::Look(Direction::North) => "look_north",
            MazeAction::Look(Direction::East) => "look_east",
            MazeAction::Look(Direction::South) => "look_south",
            MazeAction::Look(Direction::West) => "look_west",
            MazeAction::Finish => "finish",
        }
    }
}

/// API surface handed to a maze program
pub struct MazeApi<'a> {
    grid: &'a Grid,
    pegman: Pegman,
    finish: IVec2,
    log: Vec<MazeAction>,
    loops_left: u32,
    action_cap: usize,
}

/// Compiled maze program
pub type MazeProgram = Box<dyn FnMut(&mut MazeApi<'_>) -> Result<(), Halt>>;

impl<'a> MazeApi<'a> {
    fn new(grid: &'a Grid, pegman: Pegman, finish: IVec2, loop_budget: u32, action_cap: usize) -> Self {
        Self {
            grid,
            pegman,
            finish,
            log: Vec::new(),
            loops_left: loop_budget,
            action_cap,
        }
    }

    fn record(&mut self, action: MazeAction) -> Result<(), Halt> {
        if self.log.len() >= self.action_cap {
            log::warn!("Maze program hit the action cap of {}", self.action_cap);
            return Err(Halt::OutOfSteps);
        }
        self.log.push(action);
        Ok(())
    }

    /// Check then commit: the position only changes if the square is open
    fn step(&mut self, rel: RelativeDirection) -> Result<(), Halt> {
        if !is_path(self.grid, &self.pegman, rel) {
            let fail = if rel == RelativeDirection::Backward {
                MazeAction::FailBackward
            } else {
                MazeAction::FailForward
            };
            self.record(fail)?;
            return Err(Halt::Collided);
        }
        let heading = self.pegman.direction.relative(rel);
        self.record(MazeAction::Move(heading))?;
        self.pegman.cell += heading.offset();
        if self.pegman.cell == self.finish {
            self.log.push(MazeAction::Finish);
            return Err(Halt::Finished);
        }
        Ok(())
    }

    pub fn move_forward(&mut self) -> Result<(), Halt> {
        self.step(RelativeDirection::Forward)
    }

    pub fn move_backward(&mut self) -> Result<(), Halt> {
        self.step(RelativeDirection::Backward)
    }

    pub fn turn_left(&mut self) -> Result<(), Halt> {
        self.pegman.direction = self.pegman.direction.turned_left();
        self.record(MazeAction::TurnLeft)
    }

    pub fn turn_right(&mut self) -> Result<(), Halt> {
        self.pegman.direction = self.pegman.direction.turned_right();
        self.record(MazeAction::TurnRight)
    }

    fn look(&mut self, rel: RelativeDirection) -> Result<bool, Halt> {
        self.record(MazeAction::Look(self.pegman.direction.relative(rel)))?;
        Ok(is_path(self.grid, &self.pegman, rel))
    }

    pub fn is_path_forward(&mut self) -> Result<bool, Halt> {
        self.look(RelativeDirection::Forward)
    }

    pub fn is_path_right(&mut self) -> Result<bool, Halt> {
        self.look(RelativeDirection::Right)
    }

    pub fn is_path_backward(&mut self) -> Result<bool, Halt> {
        self.look(RelativeDirection::Backward)
    }

    pub fn is_path_left(&mut self) -> Result<bool, Halt> {
        self.look(RelativeDirection::Left)
    }

    /// Called once per loop iteration by compiled code
    pub fn check_timeout(&mut self) -> Result<(), Halt> {
        if self.loops_left == 0 {
            return Err(Halt::OutOfSteps);
        }
        self.loops_left -= 1;
        Ok(())
    }

    pub fn pegman(&self) -> Pegman {
        self.pegman
    }

    pub fn at_finish(&self) -> bool {
        self.pegman.cell == self.finish
    }

    fn into_log(self) -> Vec<MazeAction> {
        self.log
    }
}

/// Pegman pose as drawn: fractional cell and 16-way frame (16+ are dance frames)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MazeFrame {
    pub x: f64,
    pub y: f64,
    pub direction16: i32,
}

impl MazeFrame {
    fn at(pegman: &Pegman) -> Self {
        Self {
            x: pegman.cell.x as f64,
            y: pegman.cell.y as f64,
            direction16: pegman.direction.as_16(),
        }
    }

    fn offset(self, delta: DVec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..self
        }
    }

    fn with_direction(self, direction16: i32) -> Self {
        Self { direction16, ..self }
    }

    /// Quarter-step interpolation from `start` to `end`, end frame included
    fn quarters(start: MazeFrame, end_x: f64, end_y: f64, end_d: i32) -> [MazeFrame; 4] {
        let dx = (end_x - start.x) / 4.0;
        let dy = (end_y - start.y) / 4.0;
        let dd = (end_d - start.direction16) / 4;
        std::array::from_fn(|i| {
            let k = (i + 1) as i32;
            MazeFrame {
                x: start.x + dx * k as f64,
                y: start.y + dy * k as f64,
                direction16: constrain_direction16(start.direction16 + dd * k),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ReplayTask {
    Show(MazeFrame),
    Sound(SoundCue),
    NextAction,
}

/// Authoritative replay state after a tick
#[derive(Debug, Clone, Serialize)]
pub struct MazeSnapshot {
    pub tick: u64,
    pub frame: MazeFrame,
    /// Logical pegman after the actions replayed so far
    pub pegman: Pegman,
    pub actions_replayed: usize,
    pub actions_total: usize,
    pub outcome: Outcome,
}

/// The maze game
pub struct Maze {
    grid: Grid,
    start: Pegman,
    finish: IVec2,
    loop_budget: u32,
    action_cap: usize,
    step_scale: u64,
    success_step_ms: u32,
    failure_step_ms: u32,
    timeout_step_ms: u32,
    finish_dance_ms: u32,

    phase: RunPhase,
    outcome: Outcome,
    actions: Vec<MazeAction>,
    cursor: usize,
    replay: Pegman,
    frame: MazeFrame,
    tasks: TaskQueue<ReplayTask>,
    step_ms: u32,
    tick_count: u64,
    events: Vec<GameEvent>,
}

impl Maze {
    pub fn new(level: &LevelConfig, settings: &Settings) -> Result<Self, ConfigError> {
        level.expect_game(GameKind::Maze)?;
        level.validate()?;
        let grid = level.grid()?;
        let markers = grid.scan_markers();
        let start_cell = single_marker(&markers.starts, SquareType::Start)?;
        let finish = single_marker(&markers.finishes, SquareType::Finish)?;
        let start = Pegman::new(start_cell, level.start_direction);

        Ok(Self {
            grid,
            start,
            finish,
            loop_budget: settings.loop_budget,
            action_cap: settings.action_cap as usize,
            step_scale: level.step_scale() as u64,
            success_step_ms: settings.success_step_ms,
            failure_step_ms: settings.failure_step_ms,
            timeout_step_ms: settings.timeout_step_ms,
            finish_dance_ms: settings.finish_dance_ms,
            phase: RunPhase::Idle,
            outcome: Outcome::Unset,
            actions: Vec::new(),
            cursor: 0,
            replay: start,
            frame: MazeFrame::at(&start),
            tasks: TaskQueue::new(),
            step_ms: settings.failure_step_ms,
            tick_count: 0,
            events: Vec::new(),
        })
    }

    /// Run the program to produce a transcript, then begin the replay
    pub fn start<F>(&mut self, program: F) -> &Outcome
    where
        F: FnOnce(&mut MazeApi<'_>) -> Result<(), Halt>,
    {
        self.reset();

        let mut api = MazeApi::new(
            &self.grid,
            self.start,
            self.finish,
            self.loop_budget,
            self.action_cap,
        );
        let outcome = match catch_unwind(AssertUnwindSafe(|| program(&mut api))) {
            Ok(Ok(())) => Outcome::Failure,
            Ok(Err(halt)) => halt.into_outcome(),
            Err(_) => Outcome::Error(ErrorReason::Program("program panicked".into())),
        };
        self.actions = api.into_log();

        self.step_ms = match outcome {
            Outcome::Success => self.success_step_ms,
            // Run out the transcript as fast as possible
            Outcome::Timeout => self.timeout_step_ms,
            _ => self.failure_step_ms,
        };
        log::info!(
            "Maze program ended with {:?} after {} actions",
            outcome,
            self.actions.len()
        );
        self.outcome = outcome;
        self.tasks.schedule_at(1, ReplayTask::NextAction);
        self.phase = RunPhase::Running;
        &self.outcome
    }

    /// Outcome of the executed program, known before the replay ends
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn actions(&self) -> &[MazeAction] {
        &self.actions
    }

    pub fn frame(&self) -> MazeFrame {
        self.frame
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn schedule_frames(&mut self, frames: [MazeFrame; 4]) {
        let now = self.tick_count;
        self.frame = frames[0];
        for (k, frame) in frames.into_iter().enumerate().skip(1) {
            self.tasks.schedule_at(now + k as u64, ReplayTask::Show(frame));
        }
    }

    /// Start animating the next transcript entry. False once it is exhausted.
    fn animate_next(&mut self) -> bool {
        let Some(&action) = self.actions.get(self.cursor) else {
            return false;
        };
        self.cursor += 1;
        let now = self.tick_count;
        let here = MazeFrame::at(&self.replay);
        log::debug!("Tick {}: replay {}", now, action.name());

        match action {
            MazeAction::Move(heading) => {
                let end = self.replay.cell + heading.offset();
                self.schedule_frames(MazeFrame::quarters(
                    here,
                    end.x as f64,
                    end.y as f64,
                    here.direction16,
                ));
                self.replay.cell = end;
            }
            MazeAction::TurnLeft => {
                self.schedule_frames(MazeFrame::quarters(here, here.x, here.y, here.direction16 - 4));
                self.replay.direction = self.replay.direction.turned_left();
            }
            MazeAction::TurnRight => {
                self.schedule_frames(MazeFrame::quarters(here, here.x, here.y, here.direction16 + 4));
                self.replay.direction = self.replay.direction.turned_right();
            }
            MazeAction::FailForward | MazeAction::FailBackward => {
                let mut bump = self.replay.direction.offset().as_dvec2() * BUMP_DISTANCE;
                if action == MazeAction::FailBackward {
                    bump = -bump;
                }
                let bumped = here.offset(bump);
                self.events.push(GameEvent::Sound {
                    cue: SoundCue::Whack,
                });
                self.tasks.schedule_at(now + 2, ReplayTask::Sound(SoundCue::Whack));
                self.schedule_frames([bumped, here, bumped, here]);
            }
            MazeAction::Finish => {
                self.events.push(GameEvent::Sound { cue: SoundCue::Win });
                self.step_ms = self.finish_dance_ms;
                self.schedule_frames([
                    here.with_direction(DANCE_FRAME),
                    here.with_direction(DANCE_FRAME_ALT),
                    here.with_direction(DANCE_FRAME),
                    here,
                ]);
            }
            MazeAction::Look(direction) => {
                self.events.push(GameEvent::Look { direction });
            }
        }

        self.tasks.schedule_at(now + self.step_scale, ReplayTask::NextAction);
        true
    }

    fn finish(&mut self) -> RunReport {
        self.tasks.clear();
        let outcome = self.outcome.clone();
        if !outcome.is_success() {
            self.events.push(GameEvent::Sound {
                cue: SoundCue::Failure,
            });
        }
        self.phase = RunPhase::Finished(outcome.clone());
        RunReport::new(outcome, self.tick_count)
    }
}

impl Simulation for Maze {
    type Snapshot = MazeSnapshot;

    fn phase(&self) -> &RunPhase {
        &self.phase
    }

    fn tick(&mut self) -> Option<RunReport> {
        if !self.phase.is_running() {
            return None;
        }
        self.tick_count += 1;
        for task in self.tasks.pop_due(self.tick_count) {
            match task {
                ReplayTask::Show(frame) => self.frame = frame,
                ReplayTask::Sound(cue) => self.events.push(GameEvent::Sound { cue }),
                ReplayTask::NextAction => {
                    if !self.animate_next() {
                        return Some(self.finish());
                    }
                }
            }
        }
        None
    }

    fn tick_interval_ms(&self) -> u32 {
        self.step_ms
    }

    fn snapshot(&self) -> MazeSnapshot {
        MazeSnapshot {
            tick: self.tick_count,
            frame: self.frame,
            pegman: self.replay,
            actions_replayed: self.cursor,
            actions_total: self.actions.len(),
            outcome: self.outcome.clone(),
        }
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn reset(&mut self) {
        self.tasks.clear();
        self.events.clear();
        self.actions.clear();
        self.cursor = 0;
        self.replay = self.start;
        self.frame = MazeFrame::at(&self.start);
        self.outcome = Outcome::Unset;
        self.step_ms = self.failure_step_ms;
        self.tick_count = 0;
        self.phase = RunPhase::Idle;
    }

    fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
