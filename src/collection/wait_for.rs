//! Bounded wait-for race
//!
//! Three branches race under one `select!`:
//! 1. poll: run the query, retry after the poll interval while it is empty
//! 2. push: wait for a pushed document passing the query's predicate
//! 3. timeout: resolve with no documents
//!
//! A wait carrying an operation id also resolves (empty) when that operation
//! is finished. The first branch to resolve wins; the losers are dropped,
//! which cancels the retry timer and discards any in-flight poll result. The
//! listener deregisters and the wait gauge decrements when the race returns,
//! whichever branch won.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::errors::{QueryError, QueryResult};
use super::listeners::{DocPredicate, ListenerEvent, UpsertListener};
use crate::broker::{DataBroker, DataQuery};
use crate::observability::{Gauge, MetricsRegistry};

/// Branch that resolved a wait-for race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceWinner {
    Query,
    Listener,
    Timeout,
    /// The wait's operation was finished
    Finished,
}

impl RaceWinner {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceWinner::Query => "query",
            RaceWinner::Listener => "listener",
            RaceWinner::Timeout => "timeout",
            RaceWinner::Finished => "finished",
        }
    }
}

impl fmt::Display for RaceWinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one race
#[derive(Debug, Clone, PartialEq)]
pub struct WaitForOutcome {
    pub docs: Vec<Value>,
    pub winner: RaceWinner,
}

impl WaitForOutcome {
    fn empty(winner: RaceWinner) -> Self {
        Self {
            docs: Vec::new(),
            winner,
        }
    }
}

/// One wait-for request
pub struct WaitFor<'a> {
    pub broker: &'a DataBroker,
    pub query: DataQuery,
    pub predicate: DocPredicate,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitFor<'_> {
    /// Runs the race with an already registered `listener`.
    ///
    /// The listener must be registered before the first poll so a document
    /// upserted between the poll and the registration is not missed.
    pub async fn run(
        self,
        mut listener: UpsertListener,
        metrics: &Arc<MetricsRegistry>,
    ) -> QueryResult<WaitForOutcome> {
        let _active = metrics.track(Gauge::WaitForActive);
        let broker = self.broker;
        let query = &self.query;
        let predicate = &self.predicate;
        let poll_interval = self.poll_interval;

        let poll = async move {
            loop {
                let docs = broker.query(query).await?;
                if !docs.is_empty() {
                    return Ok::<_, QueryError>(docs);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        let push = async {
            loop {
                match listener.next_event().await {
                    ListenerEvent::Doc(doc) => {
                        if predicate.accepts(&doc) {
                            return Some(doc);
                        }
                    }
                    ListenerEvent::Finished => return None,
                    // nothing more can be pushed; poll or timeout decides
                    ListenerEvent::Closed => std::future::pending::<()>().await,
                }
            }
        };

        let outcome = tokio::select! {
            docs = poll => WaitForOutcome {
                docs: docs?,
                winner: RaceWinner::Query,
            },
            pushed = push => match pushed {
                Some(doc) => WaitForOutcome {
                    docs: vec![doc],
                    winner: RaceWinner::Listener,
                },
                None => WaitForOutcome::empty(RaceWinner::Finished),
            },
            _ = tokio::time::sleep(self.timeout) => WaitForOutcome::empty(RaceWinner::Timeout),
        };
        Ok(outcome)
    }
}
