//! Fixed timestep scheduling
//!
//! One driver advances a [`Simulation`] in whole ticks. Work that must happen
//! later (respawns, animation phases) goes into a [`TaskQueue`] keyed by tick,
//! so a reset can cancel all of it by clearing the queue.

use serde::Serialize;

use super::outcome::{Outcome, RunReport};
use super::state::GameEvent;
use crate::audio::AudioSink;
use crate::consts::MAX_SUBSTEPS;

/// Handle to a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

#[derive(Debug, Clone)]
struct Scheduled<T> {
    id: TaskId,
    due: u64,
    task: T,
}

/// Cancelable deferred tasks, due at a tick number
#[derive(Debug, Clone)]
pub struct TaskQueue<T> {
    next_id: u64,
    tasks: Vec<Scheduled<T>>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            tasks: Vec::new(),
        }
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run on tick `due`
    pub fn schedule_at(&mut self, due: u64, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Scheduled { id, due, task });
        id
    }

    /// Cancel one task. Returns false if it already ran or never existed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Cancel everything
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Remove and return every task due at or before `now`, earliest first,
    /// ties in scheduling order
    pub fn pop_due(&mut self, now: u64) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.tasks).into_iter().partition(|t| t.due <= now);
        self.tasks = pending;
        due.sort_by_key(|t| (t.due, t.id));
        due.into_iter().map(|t| t.task).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Milliseconds to whole ticks, rounding up so nothing fires early
pub fn ms_to_ticks(ms: u32, tick_interval_ms: u32) -> u64 {
    if tick_interval_ms == 0 {
        return 0;
    }
    (ms as u64).div_ceil(tick_interval_ms as u64)
}

/// Lifecycle of a run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Finished(Outcome),
}

impl RunPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, RunPhase::Running)
    }
}

/// A game the driver can step
pub trait Simulation {
    /// Authoritative state handed to renderers after each tick
    type Snapshot;

    fn phase(&self) -> &RunPhase;

    /// Advance exactly one tick. Returns the report on the tick the run ends.
    fn tick(&mut self) -> Option<RunReport>;

    /// Milliseconds between ticks right now
    fn tick_interval_ms(&self) -> u32;

    fn snapshot(&self) -> Self::Snapshot;

    /// Events produced since the last drain
    fn drain_events(&mut self) -> Vec<GameEvent>;

    /// Stop, cancel pending work, drop handlers, restore start positions
    fn reset(&mut self);

    fn tick_count(&self) -> u64;
}

/// External collaborators notified by the driver
pub trait RunObserver<S> {
    fn on_frame(&mut self, _snapshot: &S) {}
    fn on_event(&mut self, _event: &GameEvent) {}
    fn on_complete(&mut self, _report: &RunReport) {}
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NullObserver;

impl<S> RunObserver<S> for NullObserver {}

/// Observer that forwards sound events to an audio sink
#[derive(Debug, Default)]
pub struct AudioObserver<A: AudioSink> {
    pub sink: A,
    pub volume: f32,
}

impl<A: AudioSink> AudioObserver<A> {
    pub fn new(sink: A) -> Self {
        Self { sink, volume: 0.5 }
    }
}

impl<S, A: AudioSink> RunObserver<S> for AudioObserver<A> {
    fn on_event(&mut self, event: &GameEvent) {
        if let GameEvent::Sound { cue } = event {
            self.sink.play(*cue, self.volume);
        }
    }
}

/// Drives a simulation from elapsed wall-clock time
pub struct GameLoop<S: Simulation> {
    sim: S,
    accumulator_ms: f64,
    max_substeps: u32,
}

/// Upper bound on ticks run in one advance when the interval is zero
const ZERO_INTERVAL_BURST: u32 = 100_000;

impl<S: Simulation> GameLoop<S> {
    pub fn new(sim: S) -> Self {
        Self {
            sim,
            accumulator_ms: 0.0,
            max_substeps: MAX_SUBSTEPS,
        }
    }

    /// Override the per-advance tick cap
    pub fn with_max_substeps(mut self, max_substeps: u32) -> Self {
        self.max_substeps = max_substeps.max(1);
        self
    }

    pub fn sim(&self) -> &S {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    pub fn into_inner(self) -> S {
        self.sim
    }

    /// Run one tick and notify the observer
    pub fn step(&mut self, observer: &mut impl RunObserver<S::Snapshot>) -> Option<RunReport> {
        if !self.sim.phase().is_running() {
            return None;
        }
        let report = self.sim.tick();
        for event in self.sim.drain_events() {
            observer.on_event(&event);
        }
        observer.on_frame(&self.sim.snapshot());
        if let Some(report) = &report {
            log::info!(
                "Run finished: {:?} after {} ticks",
                report.outcome,
                report.tick_count
            );
            observer.on_complete(report);
            self.accumulator_ms = 0.0;
        }
        report
    }

    /// Feed elapsed time and run as many whole ticks as it covers
    pub fn advance(
        &mut self,
        elapsed_ms: f64,
        observer: &mut impl RunObserver<S::Snapshot>,
    ) -> Option<RunReport> {
        if !self.sim.phase().is_running() {
            return None;
        }
        let interval = self.sim.tick_interval_ms();
        if interval == 0 {
            // Zero cadence: run to the end right away
            for _ in 0..ZERO_INTERVAL_BURST {
                if let Some(report) = self.step(observer) {
                    return Some(report);
                }
                if !self.sim.phase().is_running() {
                    break;
                }
            }
            return None;
        }

        // Clamp long stalls (tab in background) like a frame-time cap
        self.accumulator_ms += elapsed_ms.clamp(0.0, 100.0 * interval as f64);

        let mut substeps = 0;
        while substeps < self.max_substeps {
            let interval = self.sim.tick_interval_ms() as f64;
            if interval > 0.0 && self.accumulator_ms < interval {
                break;
            }
            self.accumulator_ms -= interval;
            substeps += 1;
            if let Some(report) = self.step(observer) {
                return Some(report);
            }
        }
        None
    }

    /// Step until the run ends or `max_ticks` have run
    pub fn run_to_completion(
        &mut self,
        max_ticks: u64,
        observer: &mut impl RunObserver<S::Snapshot>,
    ) -> Option<RunReport> {
        for _ in 0..max_ticks {
            if let Some(report) = self.step(observer) {
                return Some(report);
            }
            if !self.sim.phase().is_running() {
                break;
            }
        }
        None
    }

    /// Reset the simulation and drop accumulated time
    pub fn reset(&mut self) {
        self.sim.reset();
        self.accumulator_ms = 0.0;
    }
}
