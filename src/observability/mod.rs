//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Counters, clamped gauges and query timings
//! - Typed events
//!
//! Observability is read-only: it never changes query results.

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{log_value, Logger, Severity};
pub use metrics::{Gauge, GaugeGuard, MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Log an event; failure events are logged at ERROR level
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Error
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
