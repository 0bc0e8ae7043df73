//! Begin/complete logging around one unit of work

use std::cell::Cell;
use std::time::Instant;

use super::events::Event;
use super::logger::Logger;

/// Logs `begin` on creation and `complete` with the elapsed time when
/// completed. A scope dropped without completion logs `{begin}_INCOMPLETE`.
pub struct ObservationScope {
    begin: Event,
    complete: Event,
    completed: Cell<bool>,
    timer: Timer,
}

impl ObservationScope {
    pub fn new(begin: Event, complete: Event, fields: &[(&str, &str)]) -> Self {
        Logger::info(begin.as_str(), fields);
        Self {
            begin,
            complete,
            completed: Cell::new(false),
            timer: Timer::new(),
        }
    }

    /// Logs the complete event with the elapsed time and extra fields.
    pub fn complete(self, fields: &[(&str, &str)]) {
        self.completed.set(true);
        let elapsed = self.timer.elapsed_secs();
        let mut all_fields: Vec<(&str, &str)> = vec![("elapsed", elapsed.as_str())];
        all_fields.extend(fields.iter().copied());
        Logger::info(self.complete.as_str(), &all_fields);
    }

    /// Logs `{begin}_FAILED` at ERROR level.
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        let event = format!("{}_FAILED", self.begin.as_str());
        Logger::error(&event, &[("reason", reason)]);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed.get() {
            let event = format!("{}_INCOMPLETE", self.begin.as_str());
            Logger::warn(&event, &[("reason", "scope dropped without completion")]);
        }
    }
}

/// A simple duration timer for logging elapsed time
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Elapsed seconds with millisecond precision, e.g. `"0.042"`
    pub fn elapsed_secs(&self) -> String {
        format!("{:.3}", self.start.elapsed().as_secs_f64())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
