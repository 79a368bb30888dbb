//! Rest countdown between sets
//!
//! `RestTimer` is a one-shot countdown per activation. Each tick takes one
//! second off unless the timer is paused; reaching zero stops it. Starting
//! again cancels whatever countdown was running.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::ticker::{TickHandle, Ticker, ONE_SECOND};

/// Label shown for a zero rest period (exercises performed back to back)
pub const SUPERSET_LABEL: &str = "Superset";

/// Observable rest timer state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestTimerState {
    pub is_active: bool,
    pub is_paused: bool,
    pub remaining_seconds: i64,
    pub total_seconds: i64,
}

/// Countdown used to enforce rest between sets
#[derive(Debug)]
pub struct RestTimer {
    ticker: Arc<dyn Ticker>,
    period: Duration,
    handle: Option<TickHandle>,
    state: RestTimerState,
}

impl RestTimer {
    pub fn new(ticker: Arc<dyn Ticker>) -> Self {
        Self {
            ticker,
            period: ONE_SECOND,
            handle: None,
            state: RestTimerState::default(),
        }
    }

    /// Wall time per counted second; one second unless overridden
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn state(&self) -> RestTimerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.state.remaining_seconds
    }

    pub fn total_seconds(&self) -> i64 {
        self.state.total_seconds
    }

    /// Start a fresh countdown, cancelling any running one
    pub fn start(&mut self, duration_seconds: u32) {
        self.cancel_ticks();
        let duration = i64::from(duration_seconds);
        self.state = RestTimerState {
            is_active: true,
            is_paused: false,
            remaining_seconds: duration,
            total_seconds: duration,
        };
        self.handle = Some(self.ticker.schedule(self.period));
        debug!(duration_seconds, "Rest timer started");
    }

    /// Cancel ticking and return to idle; `total_seconds` is kept
    pub fn stop(&mut self) {
        self.cancel_ticks();
        self.state.is_active = false;
        self.state.is_paused = false;
        self.state.remaining_seconds = 0;
    }

    /// Skip the rest of the countdown
    pub fn skip(&mut self) {
        debug!(remaining = self.state.remaining_seconds, "Rest timer skipped");
        self.stop();
    }

    pub fn toggle_pause(&mut self) {
        if !self.state.is_active {
            return;
        }
        self.state.is_paused = !self.state.is_paused;
    }

    /// Add (or with a negative delta, remove) time; never auto-stops
    pub fn add_time(&mut self, delta_seconds: i64) {
        self.state.remaining_seconds = self.state.remaining_seconds.saturating_add(delta_seconds).max(0);
    }

    /// Apply one elapsed second
    pub fn on_tick(&mut self) {
        if !self.state.is_active || self.state.is_paused {
            return;
        }
        self.state.remaining_seconds -= 1;
        if self.state.remaining_seconds <= 0 {
            debug!(total_seconds = self.state.total_seconds, "Rest finished");
            self.stop();
        }
    }

    /// Apply every tick delivered since the last call; returns how many were applied
    pub fn pump_ticks(&mut self) -> usize {
        let mut applied = 0;
        while let Some(handle) = self.handle.as_mut() {
            if !handle.try_tick() {
                break;
            }
            self.on_tick();
            applied += 1;
        }
        applied
    }

    /// Wait for the next tick and apply it
    ///
    /// Returns `false` once the timer is no longer active.
    pub async fn wait_tick(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        if !handle.tick().await {
            return false;
        }
        self.on_tick();
        self.state.is_active
    }

    /// Display label for the remaining time
    pub fn label(&self) -> String {
        format_rest_duration(self.state.remaining_seconds)
    }

    fn cancel_ticks(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.cancel();
        }
    }
}

/// Format a rest period for display
///
/// Zero is the superset marker, under a minute is `"45s"`, otherwise
/// `"2m"` or `"1m 30s"`.
pub fn format_rest_duration(seconds: i64) -> String {
    match seconds {
        s if s <= 0 => SUPERSET_LABEL.to_string(),
        s if s < 60 => format!("{}s", s),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}m {}s", s / 60, s % 60),
    }
}
