//! Cycle-counting debounce timer.
//!
//! Converts a millisecond window into CPU cycles and tracks a deadline
//! against a monotonic cycle counter. Used to drop touch events that
//! re-fire faster than a finger realistically can.

/// Cycle count covering `ms` milliseconds at `hz`, rounded up so a window
/// never comes up short.
pub fn ms_to_cycles(ms: u32, hz: u32) -> u64 {
    (u64::from(ms) * u64::from(hz)).div_ceil(1000)
}

/// One-shot window timer over a cycle counter.
///
/// A freshly built timer is already expired, so the first event always
/// passes; `restart` opens the window again.
#[derive(Debug, Clone, Copy)]
pub struct CycleTimer {
    window_cycles: u64,
    deadline: u64,
}

impl CycleTimer {
    pub fn new(window_ms: u32, hz: u32, now: u64) -> Self {
        Self {
            window_cycles: ms_to_cycles(window_ms, hz),
            deadline: now,
        }
    }

    pub fn expired(&self, now: u64) -> bool {
        now >= self.deadline
    }

    pub fn restart(&mut self, now: u64) {
        self.deadline = now + self.window_cycles;
    }
}
