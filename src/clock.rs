//! Session clock reconciliation
//!
//! The conductor owns the session clock. This module keeps a local estimate of
//! remote elapsed time that ticks smoothly between authoritative
//! `clock_sync` / `clock_pause` / `clock_resume` / `clock_rewind` signals.
//!
//! All operations take `now_ms`, a local monotonic timestamp in milliseconds,
//! so the reconciler is deterministic under test.

use serde::Serialize;

/// Local view of the remote session clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockState {
    /// Remote session elapsed time in milliseconds
    pub session_time_ms: u64,

    /// Whether the remote clock is paused
    pub paused: bool,

    /// Local instant such that `session_time_ms = now - origin` while running.
    /// Signed because the session may be older than the local monotonic base.
    #[serde(skip)]
    origin_ms: i64,
}

impl Default for ClockState {
    fn default() -> Self {
        // Frozen at zero until the conductor's first sync
        Self {
            session_time_ms: 0,
            paused: true,
            origin_ms: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ClockReconciler {
    state: ClockState,
}

impl ClockReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        !self.state.paused
    }

    /// Authority reset: trust the payload over any local drift.
    pub fn sync(&mut self, now_ms: u64, session_time_ms: u64, paused: bool) {
        self.set_position(now_ms, session_time_ms);
        self.state.paused = paused;
    }

    /// Freeze at the given position, or at the last known one.
    pub fn pause(&mut self, now_ms: u64, session_time_ms: Option<u64>) {
        self.tick(now_ms);
        let at = session_time_ms.unwrap_or(self.state.session_time_ms);
        self.set_position(now_ms, at);
        self.state.paused = true;
    }

    /// Continue ticking from the resume position rather than from local drift.
    pub fn resume(&mut self, now_ms: u64, session_time_ms: Option<u64>) {
        let at = session_time_ms.unwrap_or(self.state.session_time_ms);
        self.set_position(now_ms, at);
        self.state.paused = false;
    }

    /// Jump to `target_ms`. The only path that may move time backward.
    pub fn rewind(&mut self, now_ms: u64, target_ms: u64) {
        self.set_position(now_ms, target_ms);
    }

    /// Local smoothing tick. Never touches `paused`.
    pub fn tick(&mut self, now_ms: u64) {
        if self.state.paused {
            return;
        }
        let elapsed = now_ms as i64 - self.state.origin_ms;
        self.state.session_time_ms = elapsed.max(0) as u64;
    }

    /// `MM:SS` rendering of the current estimate
    pub fn display(&self) -> String {
        format_elapsed(self.state.session_time_ms)
    }

    fn set_position(&mut self, now_ms: u64, session_time_ms: u64) {
        self.state.session_time_ms = session_time_ms;
        self.state.origin_ms = now_ms as i64 - session_time_ms as i64;
    }
}

/// Format elapsed milliseconds as zero-padded `MM:SS`.
///
/// Minutes are unbounded and seconds are truncated, never rounded.
pub fn format_elapsed(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
