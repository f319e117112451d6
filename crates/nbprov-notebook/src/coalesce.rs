//! Text edit coalescing
//!
//! Keystrokes arrive as a stream of per-character text changes. They are
//! folded into bursts: one burst per cell, closed after a quiescence window
//! without edits, and recorded as a single `cellValue` action whose undo
//! restores the text the burst started from.

use crate::functions::CELL_VALUE;
use nbprov_core::Action;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum BurstState {
    Idle,
    Pending {
        index: usize,
        baseline: String,
        latest: String,
        last_edit: Instant,
    },
}

/// Debounces text edits into one action per burst
#[derive(Debug, Clone)]
pub struct TextEditCoalescer {
    window: Duration,
    state: BurstState,
}

impl TextEditCoalescer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: BurstState::Idle,
        }
    }

    /// Quiescence window
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// True while a burst is open
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, BurstState::Pending { .. })
    }

    /// Instant at which the open burst closes, if any
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            BurstState::Pending { last_edit, .. } => Some(*last_edit + self.window),
            BurstState::Idle => None,
        }
    }

    /// Feed one edit of cell `index` from `previous` to `current`
    ///
    /// Returns the action for the burst this edit closed, if any. An edit
    /// extends the open burst when it targets the same cell and arrives
    /// inside the window; otherwise the open burst is emitted and a new one
    /// starts with `previous` as its baseline.
    pub fn push(&mut self, index: usize, previous: String, current: String, now: Instant) -> Option<Action> {
        let extends = matches!(
            &self.state,
            BurstState::Pending { index: cell, last_edit, .. }
                if *cell == index && now.saturating_duration_since(*last_edit) < self.window
        );
        if extends {
            if let BurstState::Pending { latest, last_edit, .. } = &mut self.state {
                *latest = current;
                *last_edit = now;
            }
            return None;
        }

        let emitted = self.take();
        self.state = BurstState::Pending {
            index,
            baseline: previous,
            latest: current,
            last_edit: now,
        };
        emitted
    }

    /// Emit the open burst if the window has elapsed at `now`
    pub fn poll(&mut self, now: Instant) -> Option<Action> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.take(),
            _ => None,
        }
    }

    /// Emit the open burst unconditionally
    pub fn flush(&mut self) -> Option<Action> {
        self.take()
    }

    fn take(&mut self) -> Option<Action> {
        match std::mem::replace(&mut self.state, BurstState::Idle) {
            BurstState::Pending {
                index,
                baseline,
                latest,
                ..
            } if baseline != latest => Some(Action::reversible(
                CELL_VALUE,
                vec![json!(index), json!(latest)],
                CELL_VALUE,
                vec![json!(index), json!(baseline)],
            )),
            _ => None,
        }
    }
}
