//! Player input state sampled by the tick loop
//!
//! Held keys and soft buttons re-fire their triggers on every tick. A click
//! is edge-triggered: it stays pending until the next tick consumes it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Arrow directions shared by keyboard keys and on-screen buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arrow {
    Left,
    Up,
    Right,
    Down,
}

impl Arrow {
    pub const ALL: [Arrow; 4] = [Arrow::Left, Arrow::Up, Arrow::Right, Arrow::Down];
}

/// Input state between ticks
#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys: BTreeSet<Arrow>,
    buttons: BTreeSet<Arrow>,
    click_pending: bool,
}

impl InputState {
    pub fn key_down(&mut self, arrow: Arrow) {
        self.keys.insert(arrow);
    }

    pub fn key_up(&mut self, arrow: Arrow) {
        self.keys.remove(&arrow);
    }

    pub fn button_down(&mut self, arrow: Arrow) {
        self.buttons.insert(arrow);
    }

    pub fn button_up(&mut self, arrow: Arrow) {
        self.buttons.remove(&arrow);
    }

    pub fn click(&mut self) {
        self.click_pending = true;
    }

    /// Consume the pending click, if any
    pub fn take_click(&mut self) -> bool {
        std::mem::take(&mut self.click_pending)
    }

    pub fn click_pending(&self) -> bool {
        self.click_pending
    }

    /// Held arrows in firing order: keys first, then soft buttons.
    /// An arrow held both ways fires twice.
    pub fn held(&self) -> Vec<Arrow> {
        Arrow::ALL
            .iter()
            .filter(|a| self.keys.contains(a))
            .chain(Arrow::ALL.iter().filter(|a| self.buttons.contains(a)))
            .copied()
            .collect()
    }

    /// Forget everything (new run)
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
