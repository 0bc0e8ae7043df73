//! Observable events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events of the query core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Queries
    /// Query executed against a broker
    Query,
    /// Query short-circuited by an unsatisfiable condition
    QuerySkipped,
    /// Query failed
    QueryFailed,
    /// Wait-for race finished
    WaitForResolved,
    /// Pushed document the condition could not be evaluated on
    PushedDocSkipped,
    /// Query could not use an index
    SlowQueryDetected,

    // Aggregations
    Aggregate,
    AggregateSkipped,
    AggregateFailed,

    // Cold cache
    ColdCacheHit,
    ColdCacheMiss,

    // Subscriptions
    SubscriptionOpened,
    SubscriptionClosed,
    /// Pending wait-fors resolved by `finish_operations`
    OperationsFinished,

    // CLI commands
    ExplainBegin,
    ExplainComplete,
    AggregateBegin,
    AggregateComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::Query => "QUERY",
            Event::QuerySkipped => "QUERY_SKIPPED",
            Event::QueryFailed => "QUERY_FAILED",
            Event::WaitForResolved => "WAIT_FOR_RESOLVED",
            Event::PushedDocSkipped => "PUSHED_DOC_SKIPPED",
            Event::SlowQueryDetected => "SLOW_QUERY_DETECTED",

            Event::Aggregate => "AGGREGATE",
            Event::AggregateSkipped => "AGGREGATE_SKIPPED",
            Event::AggregateFailed => "AGGREGATE_FAILED",

            Event::ColdCacheHit => "COLD_CACHE_HIT",
            Event::ColdCacheMiss => "COLD_CACHE_MISS",

            Event::SubscriptionOpened => "SUBSCRIPTION_OPENED",
            Event::SubscriptionClosed => "SUBSCRIPTION_CLOSED",
            Event::OperationsFinished => "OPERATIONS_FINISHED",

            Event::ExplainBegin => "EXPLAIN_BEGIN",
            Event::ExplainComplete => "EXPLAIN_COMPLETE",
            Event::AggregateBegin => "AGGREGATE_BEGIN",
            Event::AggregateComplete => "AGGREGATE_COMPLETE",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::QueryFailed | Event::AggregateFailed)
    }

    /// Returns true if this event is logged at WARN level
    pub fn is_warning(&self) -> bool {
        matches!(self, Event::PushedDocSkipped)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
