//! Score tally and per-question countdown.
//!
//! Neither type knows about rounds. The state machine decides when to award
//! and when to restart; these only keep the numbers non-negative and
//! monotonic.

/// Running score for one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scoreboard {
    total: u32,
}

impl Scoreboard {
    /// Empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `points`. Saturates instead of wrapping.
    pub fn award(&mut self, points: u32) {
        self.total = self.total.saturating_add(points);
    }

    /// Current total.
    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Result of one [`Countdown::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Decremented; this many units remain.
    Running(u32),
    /// Decremented to zero on this tick.
    Expired,
    /// Already at zero; nothing changed.
    Idle,
}

/// Countdown restarted on every question arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Countdown {
    start: u32,
    remaining: u32,
}

impl Countdown {
    /// A stopped countdown that restarts at `start`.
    pub fn new(start: u32) -> Self {
        Self {
            start,
            remaining: 0,
        }
    }

    /// Reset to the start value.
    pub fn restart(&mut self) {
        self.remaining = self.start;
    }

    /// Decrement by one unit, stopping at zero.
    pub fn tick(&mut self) -> Tick {
        match self.remaining {
            0 => Tick::Idle,
            1 => {
                self.remaining = 0;
                Tick::Expired
            }
            n => {
                self.remaining = n - 1;
                Tick::Running(self.remaining)
            }
        }
    }

    /// Units left.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}
