//! Event dispatch to user handlers
//!
//! A compiled user program is a set of closures keyed by trigger. Each game
//! passes its API surface (`A`) to the handler it invokes. Handler failures,
//! whether returned errors or panics, are logged and discarded so one broken
//! handler can never stop the tick loop or the other triggers.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::HandlerError;

/// What a user handler returns
pub type HandlerResult = Result<(), HandlerError>;

/// A compiled handler taking the game's API surface
pub type Handler<A> = Box<dyn FnMut(&mut A) -> HandlerResult>;

/// A named simulation condition that may invoke a handler
pub trait Trigger: Copy + Ord + Debug {
    /// Stable name of the trigger, as the block editor knows it
    fn name(self) -> &'static str;
}

/// Compiled user program: at most one handler per trigger
///
/// Produced by the (external) block compiler and handed to a game at run start.
pub struct UserProgram<T: Trigger, A> {
    handlers: BTreeMap<T, Handler<A>>,
}

impl<T: Trigger, A> Default for UserProgram<T, A> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }
}

impl<T: Trigger, A> UserProgram<T, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any earlier one for the trigger
    pub fn on<F>(mut self, trigger: T, handler: F) -> Self
    where
        F: FnMut(&mut A) -> HandlerResult + 'static,
    {
        self.handlers.insert(trigger, Box::new(handler));
        self
    }

    /// Register or remove a handler; `None` leaves the trigger unhandled
    pub fn set(&mut self, trigger: T, handler: Option<Handler<A>>) {
        match handler {
            Some(h) => {
                self.handlers.insert(trigger, h);
            }
            None => {
                self.handlers.remove(&trigger);
            }
        }
    }

    pub fn triggers(&self) -> impl Iterator<Item = T> + '_ {
        self.handlers.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Result of dispatching one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No handler registered; nothing ran
    Unhandled,
    /// Handler ran to completion
    Completed,
    /// Handler failed; the failure was discarded
    Failed,
}

/// The live handler table of a running game
pub struct HandlerTable<T: Trigger, A> {
    handlers: BTreeMap<T, Handler<A>>,
    failures: u32,
}

impl<T: Trigger, A> Default for HandlerTable<T, A> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
            failures: 0,
        }
    }
}

impl<T: Trigger, A> HandlerTable<T, A> {
    /// Replace every handler with those of `program`
    pub fn install(&mut self, program: UserProgram<T, A>) {
        self.handlers = program.handlers;
        self.failures = 0;
    }

    /// Drop every handler; later dispatches find nothing to run
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn is_registered(&self, trigger: T) -> bool {
        self.handlers.contains_key(&trigger)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler failures discarded since the last install
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Invoke the handler for `trigger`, swallowing any failure
    pub fn dispatch(&mut self, trigger: T, api: &mut A) -> Dispatch {
        let Some(handler) = self.handlers.get_mut(&trigger) else {
            return Dispatch::Unhandled;
        };
        match catch_unwind(AssertUnwindSafe(|| handler(api))) {
            Ok(Ok(())) => Dispatch::Completed,
            Ok(Err(err)) => {
                log::debug!("Handler {} failed: {}", trigger.name(), err);
                self.failures += 1;
                Dispatch::Failed
            }
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic".to_string());
                log::debug!("Handler {} panicked: {}", trigger.name(), msg);
                self.failures += 1;
                Dispatch::Failed
            }
        }
    }
}
