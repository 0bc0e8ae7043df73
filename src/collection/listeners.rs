//! Document upsert fan-out
//!
//! Each collection owns one `UpsertStream`. Listeners live in a slot table
//! addressed by generation-stamped handles, so a stale handle can never
//! remove a listener that reused its slot. Events are dispatched from a
//! snapshot of the registered senders; registering or dropping listeners
//! while an event is being dispatched is safe.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::errors::{QueryError, QueryResult};
use crate::filter::{BoundParams, Condition, QlExpr, KEY_FIELD};
use crate::observability::{log_event, Event};

/// Handle of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId {
    slot: usize,
    generation: u64,
}

struct Registration {
    sender: mpsc::UnboundedSender<Value>,
    operation_id: Option<String>,
    finish: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    entry: Option<Registration>,
}

#[derive(Default)]
struct Registry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    active: usize,
}

/// Fan-out broadcaster of inserted or updated documents
#[derive(Default)]
pub struct UpsertStream {
    registry: RwLock<Registry>,
}

impl UpsertStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a listener; it is deregistered when dropped.
    ///
    /// Listeners carrying an `operation_id` can be finished early with
    /// [`UpsertStream::finish_operations`].
    pub fn register(self: &Arc<Self>, operation_id: Option<String>) -> QueryResult<UpsertListener> {
        let (sender, events) = mpsc::unbounded_channel();
        let (finish, finished) = match operation_id {
            Some(_) => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
            None => (None, None),
        };
        let registration = Registration {
            sender,
            operation_id,
            finish,
        };

        let mut registry = self
            .registry
            .write()
            .map_err(|_| QueryError::Internal("upsert listener registry poisoned".to_string()))?;
        let slot = match registry.free.pop() {
            Some(slot) => slot,
            None => {
                registry.slots.push(Slot::default());
                registry.slots.len() - 1
            }
        };
        registry.active += 1;
        let entry = &mut registry.slots[slot];
        entry.generation += 1;
        entry.entry = Some(registration);
        let id = ListenerId {
            slot,
            generation: entry.generation,
        };
        drop(registry);

        Ok(UpsertListener {
            id,
            stream: Arc::clone(self),
            events,
            finished,
        })
    }

    /// Removes the listener `id`; stale handles are ignored.
    fn deregister(&self, id: ListenerId) -> bool {
        let Ok(mut registry) = self.registry.write() else {
            return false;
        };
        let Some(slot) = registry.slots.get_mut(id.slot) else {
            return false;
        };
        if slot.generation != id.generation || slot.entry.is_none() {
            return false;
        }
        slot.entry = None;
        registry.free.push(id.slot);
        registry.active -= 1;
        true
    }

    /// Delivers `doc` to every registered listener and returns how many
    /// received it.
    pub fn emit(&self, doc: &Value) -> usize {
        let senders: Vec<mpsc::UnboundedSender<Value>> = match self.registry.read() {
            Ok(registry) => registry
                .slots
                .iter()
                .filter_map(|slot| slot.entry.as_ref().map(|e| e.sender.clone()))
                .collect(),
            Err(_) => return 0,
        };
        senders
            .iter()
            .filter(|sender| sender.send(doc.clone()).is_ok())
            .count()
    }

    /// Signals listeners registered for any of `operation_ids`; returns how
    /// many were signalled.
    pub fn finish_operations(&self, operation_ids: &HashSet<String>) -> usize {
        let Ok(mut registry) = self.registry.write() else {
            return 0;
        };
        let mut finished = 0;
        for slot in registry.slots.iter_mut() {
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };
            let matches = entry
                .operation_id
                .as_ref()
                .map_or(false, |id| operation_ids.contains(id));
            if matches {
                if let Some(finish) = entry.finish.take() {
                    if finish.send(()).is_ok() {
                        finished += 1;
                    }
                }
            }
        }
        finished
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.registry.read().map(|r| r.active).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a listener observed next
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    Doc(Value),
    /// Its operation was finished
    Finished,
    /// The registration is gone; no further events will arrive
    Closed,
}

/// Receiving end of one registration; deregisters on drop
pub struct UpsertListener {
    id: ListenerId,
    stream: Arc<UpsertStream>,
    events: mpsc::UnboundedReceiver<Value>,
    finished: Option<oneshot::Receiver<()>>,
}

async fn wait_finished(finished: &mut Option<oneshot::Receiver<()>>) -> ListenerEvent {
    let Some(rx) = finished.as_mut() else {
        return std::future::pending().await;
    };
    let event = match rx.await {
        Ok(()) => ListenerEvent::Finished,
        Err(_) => ListenerEvent::Closed,
    };
    *finished = None;
    event
}

impl UpsertListener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Waits for the next document, the finish signal, or the end of the
    /// registration.
    pub async fn next_event(&mut self) -> ListenerEvent {
        tokio::select! {
            biased;
            event = wait_finished(&mut self.finished) => event,
            doc = self.events.recv() => doc.map_or(ListenerEvent::Closed, ListenerEvent::Doc),
        }
    }
}

impl Drop for UpsertListener {
    fn drop(&mut self) {
        self.stream.deregister(self.id);
    }
}

/// In-memory form of a query's condition: access scope, then user filter
#[derive(Debug, Clone)]
pub struct DocPredicate {
    doc_type: Arc<Condition>,
    filter: Value,
    scope: Option<QlExpr>,
    params: BoundParams,
}

impl DocPredicate {
    pub fn new(doc_type: Arc<Condition>, filter: Value, scope: Option<QlExpr>, params: BoundParams) -> Self {
        Self {
            doc_type,
            filter,
            scope,
            params,
        }
    }

    /// True when `doc` is visible under the scope and passes the filter.
    /// An empty filter passes every document.
    pub fn matches(&self, doc: &Value) -> QueryResult<bool> {
        if let Some(scope) = &self.scope {
            if !scope.evaluate(doc, &self.params)? {
                return Ok(false);
            }
        }
        if super::plan::is_empty_filter(&self.filter) {
            return Ok(true);
        }
        Ok(self.doc_type.test_document(doc, &self.filter)?)
    }

    /// [`DocPredicate::matches`] for pushed documents: one the condition
    /// cannot be evaluated on is logged and skipped.
    pub fn accepts(&self, doc: &Value) -> bool {
        match self.matches(doc) {
            Ok(matched) => matched,
            Err(e) => {
                let key = doc[KEY_FIELD].as_str().unwrap_or_default();
                let reason = e.to_string();
                log_event(
                    Event::PushedDocSkipped,
                    &[("key", key), ("reason", reason.as_str())],
                );
                false
            }
        }
    }
}
