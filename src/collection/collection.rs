//! Collection executor
//!
//! One `Collection` per served collection. It resolves access, plans the
//! query, picks the fast or slow broker from a cached index verdict and
//! either queries once or races a wait-for. Aggregations, subscriptions and
//! `wait_for_doc` share the same condition compilation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::access::{access_scope, AccessControl, RequestContext};
use super::errors::{QueryError, QueryResult};
use super::info::CollectionInfo;
use super::listeners::{DocPredicate, ListenerEvent, UpsertListener, UpsertStream};
use super::plan::{is_empty_filter, CompiledCondition, QueryArgs, QueryPlan};
use super::slow_detector;
use super::wait_for::WaitFor;
use crate::aggregation::{AggregationFn, AggregationQuery, FieldAggregation, ScalarFieldMap};
use crate::broker::{DataBroker, DataQuery, NoQueryCache, OrderBy, SortDirection};
use crate::config::{QConfig, QueryConfig};
use crate::filter::{BoundParams, Condition, QlExpr, KEY_FIELD};
use crate::observability::{log_event, log_value, Event, Gauge, GaugeGuard, MetricsRegistry, Timer};

/// Brokers, access control, metrics and settings shared by all collections
/// of one database
#[derive(Clone)]
pub struct Backend {
    pub fast: Arc<DataBroker>,
    pub slow: Arc<DataBroker>,
    pub access: Arc<dyn AccessControl>,
    pub metrics: Arc<MetricsRegistry>,
    pub config: QueryConfig,
}

impl Backend {
    /// Wires both brokers to one metrics registry. The cold cache is
    /// replaced by `NoQueryCache` when disabled in `config`.
    pub fn new(
        config: &QConfig,
        fast: DataBroker,
        slow: DataBroker,
        access: Arc<dyn AccessControl>,
    ) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let wire = |broker: DataBroker, name: &str| {
            let broker = broker.with_name(name).with_metrics(Arc::clone(&metrics));
            if config.query.cold_cache_enabled {
                broker
            } else {
                broker.with_cache(Arc::new(NoQueryCache))
            }
        };
        Self {
            fast: Arc::new(wire(fast, "data")),
            slow: Arc::new(wire(slow, "slow_queries_data")),
            access,
            metrics: Arc::clone(&metrics),
            config: config.query.clone(),
        }
    }

    fn broker(&self, is_fast: bool) -> &DataBroker {
        if is_fast {
            &self.fast
        } else {
            &self.slow
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.wait_for_poll_interval_ms)
    }
}

/// Aggregation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateArgs {
    pub filter: Option<Value>,
    /// Empty means one `COUNT`
    pub fields: Vec<FieldAggregation>,
    pub access_key: Option<String>,
}

/// Subscription request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscribeArgs {
    pub filter: Option<Value>,
    pub access_key: Option<String>,
}

fn verdict(is_fast: bool) -> &'static str {
    if is_fast {
        "FAST"
    } else {
        "SLOW"
    }
}

/// Classification cache key: query text followed by the order fields
fn stat_key(text: &str, order_by: &[OrderBy]) -> String {
    let order = order_by
        .iter()
        .map(|field| format!("{} {}", field.path, field.direction.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}{}", text, order)
}

/// Nested filter `{a: {b: leaf}}` for the dotted path `a.b`; `_key`
/// segments are addressed by their logical name `id`.
fn nested_filter(path: &str, leaf: Value) -> Value {
    path.rsplit('.').fold(leaf, |inner, segment| {
        let name = if segment == KEY_FIELD { "id" } else { segment };
        let mut map = Map::new();
        map.insert(name.to_string(), inner);
        Value::Object(map)
    })
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        _ => false,
    }
}

pub struct Collection {
    info: CollectionInfo,
    doc_type: Arc<Condition>,
    field_map: ScalarFieldMap,
    backend: Backend,
    upserts: Arc<UpsertStream>,
    /// Fast/slow verdicts by [`stat_key`]
    query_stats: RwLock<HashMap<String, bool>>,
}

impl Collection {
    pub fn new(info: CollectionInfo, doc_type: Arc<Condition>, backend: Backend) -> Self {
        let field_map = ScalarFieldMap::from_type(&info.name, &doc_type);
        Self {
            info,
            doc_type,
            field_map,
            backend,
            upserts: UpsertStream::new(),
            query_stats: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }

    pub fn doc_type(&self) -> &Arc<Condition> {
        &self.doc_type
    }

    /// Number of registered upsert listeners (waits and subscriptions)
    pub fn listener_count(&self) -> usize {
        self.upserts.len()
    }

    /// Counts the document and pushes it to every listener.
    pub fn on_document_upsert(&self, doc: &Value) -> usize {
        self.backend.metrics.add_docs(1);
        self.upserts.emit(doc)
    }

    /// Resolves pending wait-fors of `operation_ids` with no documents.
    pub fn finish_operations(&self, operation_ids: &HashSet<String>) -> usize {
        let finished = self.upserts.finish_operations(operation_ids);
        if finished > 0 {
            log_event(
                Event::OperationsFinished,
                &[("collection", self.name()), ("count", finished.to_string().as_str())],
            );
        }
        finished
    }

    /// Cached index verdict for a compiled query and its order.
    pub fn is_fast_query(&self, text: &str, filter: Option<&QlExpr>, order_by: &[OrderBy]) -> bool {
        let key = stat_key(text, order_by);
        if let Ok(stats) = self.query_stats.read() {
            if let Some(is_fast) = stats.get(&key) {
                return *is_fast;
            }
        }
        let is_fast = slow_detector::is_fast_query(&self.info.indexes, filter, order_by);
        if let Ok(mut stats) = self.query_stats.write() {
            stats.insert(key, is_fast);
        }
        is_fast
    }

    // ==================== Queries ====================

    pub async fn query(&self, ctx: &RequestContext, args: &QueryArgs) -> QueryResult<Vec<Value>> {
        let metrics = &self.backend.metrics;
        metrics.increment_queries();
        let _active = metrics.track(Gauge::QueryActive);
        let timer = Timer::new();

        let result = self.run_query(ctx, args).await;

        metrics.record_query_time(timer.elapsed_ms());
        if let Err(e) = &result {
            metrics.increment_failed_queries();
            log_event(
                Event::QueryFailed,
                &[
                    ("collection", self.name()),
                    ("code", e.code()),
                    ("error", e.to_string().as_str()),
                ],
            );
        }
        result
    }

    async fn run_query(&self, ctx: &RequestContext, args: &QueryArgs) -> QueryResult<Vec<Value>> {
        let rights = ctx
            .require_granted_access(self.backend.access.as_ref(), args.access_key.as_deref())
            .await?;
        let config = &self.backend.config;
        let plan = QueryPlan::build(
            &self.info,
            &self.doc_type,
            args,
            &rights,
            config.default_limit,
            config.max_limit,
        )?;
        let Some(plan) = plan else {
            log_event(Event::QuerySkipped, &[("collection", self.name())]);
            return Ok(Vec::new());
        };

        let is_fast = self.is_fast_query(&plan.text, plan.condition.filter.as_ref(), &plan.order_by);
        if !is_fast {
            self.backend.metrics.increment_slow_queries();
            log_event(
                Event::SlowQueryDetected,
                &[("collection", self.name()), ("text", log_value(&plan.text).as_str())],
            );
        }
        let broker = self.backend.broker(is_fast);

        let timer = Timer::new();
        let docs = if plan.timeout > 0 {
            self.query_wait_for(broker, &plan).await?
        } else {
            broker.query(&plan.data_query()).await?
        };
        log_event(
            Event::Query,
            &[
                ("collection", self.name()),
                ("elapsed", timer.elapsed_secs().as_str()),
                ("verdict", verdict(is_fast)),
            ],
        );
        Ok(docs)
    }

    async fn query_wait_for(&self, broker: &DataBroker, plan: &QueryPlan) -> QueryResult<Vec<Value>> {
        // register before the first poll
        let listener = self.upserts.register(plan.operation_id.clone())?;
        let predicate = DocPredicate::new(
            Arc::clone(&self.doc_type),
            plan.filter.clone(),
            plan.condition.scope.clone(),
            plan.condition.params.clone(),
        );
        let wait = WaitFor {
            broker,
            query: plan.data_query(),
            predicate,
            timeout: Duration::from_millis(plan.timeout),
            poll_interval: self.backend.poll_interval(),
        };
        let outcome = wait.run(listener, &self.backend.metrics).await?;
        log_event(
            Event::WaitForResolved,
            &[("collection", self.name()), ("winner", outcome.winner.as_str())],
        );
        Ok(outcome.docs)
    }

    // ==================== Aggregations ====================

    /// Runs the combined aggregation query; one value per requested field.
    pub async fn aggregate(&self, ctx: &RequestContext, args: &AggregateArgs) -> QueryResult<Vec<Value>> {
        let metrics = &self.backend.metrics;
        metrics.increment_queries();
        let _active = metrics.track(Gauge::QueryActive);
        let timer = Timer::new();

        let result = self.run_aggregate(ctx, args).await;

        metrics.record_query_time(timer.elapsed_ms());
        if let Err(e) = &result {
            metrics.increment_failed_queries();
            log_event(
                Event::AggregateFailed,
                &[
                    ("collection", self.name()),
                    ("code", e.code()),
                    ("error", e.to_string().as_str()),
                ],
            );
        }
        result
    }

    async fn run_aggregate(&self, ctx: &RequestContext, args: &AggregateArgs) -> QueryResult<Vec<Value>> {
        let rights = ctx
            .require_granted_access(self.backend.access.as_ref(), args.access_key.as_deref())
            .await?;
        let filter = args.filter.clone().unwrap_or_else(|| Value::Object(Map::new()));
        let Some(condition) = CompiledCondition::build(self.name(), &self.doc_type, &filter, &rights)? else {
            log_event(Event::AggregateSkipped, &[("collection", self.name())]);
            return Ok(Vec::new());
        };
        let fields = if args.fields.is_empty() {
            vec![FieldAggregation::count()]
        } else {
            args.fields.clone()
        };
        let query = AggregationQuery::build(
            &self.field_map,
            self.name(),
            Some(&condition.text()),
            &fields,
        )?;

        let is_fast = self.is_fast_aggregation(&query, condition.filter.as_ref());
        if !is_fast {
            self.backend.metrics.increment_slow_queries();
            log_event(
                Event::SlowQueryDetected,
                &[("collection", self.name()), ("text", log_value(&query.text).as_str())],
            );
        }

        let timer = Timer::new();
        let data_query = DataQuery::new(self.info.segment, query.text.clone(), condition.params.values().clone());
        let rows = self.backend.broker(is_fast).query(&data_query).await?;
        log_event(
            Event::Aggregate,
            &[
                ("collection", self.name()),
                ("elapsed", timer.elapsed_secs().as_str()),
                ("verdict", verdict(is_fast)),
            ],
        );

        // first row only; a missing row reads as nulls
        let row = match rows.first() {
            Some(Value::Array(columns)) => columns.clone(),
            _ => vec![Value::Null; query.helpers.len()],
        };
        Ok(query.convert_results(&row)?)
    }

    /// `COUNT` needs the filter indexed; `MIN`/`MAX` also need an index
    /// ordered by their field.
    fn is_fast_aggregation(&self, query: &AggregationQuery, filter: Option<&QlExpr>) -> bool {
        query.helpers.iter().all(|helper| {
            let context = &helper.context;
            match context.function {
                AggregationFn::Count => self.is_fast_query(&query.text, filter, &[]),
                AggregationFn::Min | AggregationFn::Max => {
                    let path = context.field.path.as_str();
                    let path = path.strip_prefix("doc.").unwrap_or(path);
                    let order = [OrderBy::new(path, SortDirection::Asc)];
                    self.is_fast_query(&query.text, filter, &order)
                }
                AggregationFn::Sum | AggregationFn::Average => true,
            }
        })
    }

    // ==================== Subscriptions ====================

    /// Opens a push subscription of upserted documents matching `filter`.
    pub async fn subscribe(&self, ctx: &RequestContext, args: &SubscribeArgs) -> QueryResult<Subscription> {
        let rights = ctx
            .require_granted_access(self.backend.access.as_ref(), args.access_key.as_deref())
            .await?;
        let filter = args.filter.clone().unwrap_or_else(|| Value::Object(Map::new()));
        let mut params = BoundParams::new();
        if !is_empty_filter(&filter) {
            // rejects invalid filters up front
            self.doc_type.ql(&mut params, "doc", &filter)?;
        }
        let scope = access_scope(self.name(), &rights, &mut params);
        let predicate = DocPredicate::new(Arc::clone(&self.doc_type), filter, scope, params);

        let listener = self.upserts.register(None)?;
        let active = self.backend.metrics.track(Gauge::SubscriptionActive);
        log_event(Event::SubscriptionOpened, &[("collection", self.name())]);
        Ok(Subscription {
            collection: self.name().to_string(),
            listener,
            predicate,
            _active: active,
        })
    }

    // ==================== Wait for documents ====================

    /// Waits until a document whose `field_path` equals `value` appears.
    ///
    /// A `path[*]` field matches documents whose array contains `value`.
    /// A timeout of 0 queries the fast broker once; no timeout uses the
    /// configured default. A missing `value` resolves to `None` at once.
    pub async fn wait_for_doc(
        &self,
        value: &Value,
        field_path: &str,
        timeout_ms: Option<u64>,
    ) -> QueryResult<Option<Value>> {
        if is_missing(value) {
            return Ok(None);
        }
        let timeout = timeout_ms.unwrap_or(self.backend.config.default_wait_for_doc_timeout_ms);

        let mut params = BoundParams::new();
        let name = params.add(value.clone());
        let mut eq = Map::new();
        eq.insert("eq".to_string(), value.clone());
        let (filter, condition) = match field_path.strip_suffix("[*]") {
            Some(array_path) => {
                let mut any = Map::new();
                any.insert("any".to_string(), Value::Object(eq));
                (
                    nested_filter(array_path, Value::Object(any)),
                    format!("@{} IN doc.{}", name, field_path),
                )
            }
            None => (
                nested_filter(field_path, Value::Object(eq)),
                format!("doc.{} == @{}", field_path, name),
            ),
        };
        let text = format!("FOR doc IN {} FILTER {} RETURN doc", self.name(), condition);
        let query = DataQuery::new(self.info.segment, text, params.into_values());

        if timeout == 0 {
            let docs = self.backend.fast.query(&query).await?;
            return Ok(docs.into_iter().next());
        }

        let listener = self.upserts.register(None)?;
        let wait = WaitFor {
            broker: &self.backend.fast,
            query,
            predicate: DocPredicate::new(Arc::clone(&self.doc_type), filter, None, BoundParams::new()),
            timeout: Duration::from_millis(timeout),
            poll_interval: self.backend.poll_interval(),
        };
        let outcome = wait.run(listener, &self.backend.metrics).await?;
        log_event(
            Event::WaitForResolved,
            &[
                ("collection", self.name()),
                ("field", field_path),
                ("winner", outcome.winner.as_str()),
            ],
        );
        Ok(outcome.docs.into_iter().next())
    }

    /// [`Collection::wait_for_doc`] for every value, concurrently.
    pub async fn wait_for_docs(
        &self,
        values: &[Value],
        field_path: &str,
        timeout_ms: Option<u64>,
    ) -> QueryResult<Vec<Option<Value>>> {
        try_join_all(
            values
                .iter()
                .map(|value| self.wait_for_doc(value, field_path, timeout_ms)),
        )
        .await
    }
}

/// Push subscription; closes when dropped
pub struct Subscription {
    collection: String,
    listener: UpsertListener,
    predicate: DocPredicate,
    _active: GaugeGuard,
}

impl Subscription {
    /// Next upserted document visible to this subscription
    pub async fn next(&mut self) -> QueryResult<Value> {
        loop {
            match self.listener.next_event().await {
                ListenerEvent::Doc(doc) => {
                    if self.predicate.accepts(&doc) {
                        return Ok(doc);
                    }
                }
                ListenerEvent::Finished => {}
                ListenerEvent::Closed => {
                    return Err(QueryError::Internal(format!(
                        "upsert stream of {} closed",
                        self.collection
                    )))
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        log_event(Event::SubscriptionClosed, &[("collection", self.collection.as_str())]);
    }
}
