//! CLI command implementations
//!
//! Both commands are offline: they plan against the built-in schema and
//! its declared indexes, and never contact a data source.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::aggregation::{AggregationQuery, FieldAggregation, ScalarFieldMap};
use crate::collection::{
    is_fast_query, AccessRights, CollectionInfo, CompiledCondition, QueryArgs, QueryError,
    QueryPlan,
};
use crate::config::QConfig;
use crate::observability::{log_event, Event, ObservationScope};
use crate::schema::{self, CollectionSchema};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// `explain` request: query arguments plus an optional account restriction
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplainRequest {
    collection: String,
    #[serde(flatten)]
    args: QueryArgs,
    #[serde(default)]
    accounts: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregateRequest {
    collection: String,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    fields: Vec<FieldAggregation>,
    #[serde(default)]
    accounts: Vec<String>,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run a command; failures are also reported on stdout as an error envelope
pub fn run_command(cmd: Command) -> CliResult<()> {
    let result = match cmd {
        Command::Explain { config } => explain(config.as_deref()),
        Command::Aggregate { config } => aggregate(config.as_deref()),
    };
    if let Err(e) = &result {
        write_error(e.code_str(), &e.message())?;
    }
    result
}

/// Loads the configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> CliResult<QConfig> {
    let config = match path {
        Some(path) => QConfig::load(path)?,
        None => QConfig::default(),
    };
    let cold_sources = config.data.cold.len().to_string();
    log_event(
        Event::ConfigLoaded,
        &[
            ("cold_sources", cold_sources.as_str()),
            ("hot", config.data.hot.as_str()),
            ("mutable", config.data.mutable.as_str()),
        ],
    );
    Ok(config)
}

/// Begin and complete events logged around `command`
pub fn command_events(command: &Command) -> (Event, Event) {
    match command {
        Command::Explain { .. } => (Event::ExplainBegin, Event::ExplainComplete),
        Command::Aggregate { .. } => (Event::AggregateBegin, Event::AggregateComplete),
    }
}

/// Reads one request from stdin, answers it with `handle` and writes the
/// response envelope.
fn serve(
    config_path: Option<&Path>,
    command: &Command,
    name: &str,
    handle: fn(&QConfig, Value) -> CliResult<Value>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let request = read_request()?;
    let (begin, complete) = command_events(command);
    let scope = ObservationScope::new(begin, complete, &[("command", name)]);
    match handle(&config, request) {
        Ok(data) => {
            scope.complete(&[]);
            write_response(data)
        }
        Err(e) => {
            scope.fail(&e.message());
            Err(e)
        }
    }
}

/// Plan one query read from stdin
pub fn explain(config_path: Option<&Path>) -> CliResult<()> {
    let command = Command::Explain {
        config: config_path.map(Path::to_path_buf),
    };
    serve(config_path, &command, "explain", explain_request)
}

/// Build one aggregation read from stdin
pub fn aggregate(config_path: Option<&Path>) -> CliResult<()> {
    let command = Command::Aggregate {
        config: config_path.map(Path::to_path_buf),
    };
    serve(config_path, &command, "aggregate", aggregate_request)
}

fn find_schema(name: &str) -> CliResult<CollectionSchema> {
    schema::blockchain()
        .into_iter()
        .find(|schema| schema.name == name)
        .ok_or_else(|| QueryError::UnknownCollection(name.to_string()).into())
}

fn rights_for(accounts: &[String]) -> AccessRights {
    if accounts.is_empty() {
        AccessRights::granted()
    } else {
        AccessRights::restricted_to(accounts.iter().cloned())
    }
}

/// `{text, params, isFast, limit}` of the request's query plan, or
/// `{skipped: true}` when its condition can never match.
pub fn explain_request(config: &QConfig, request: Value) -> CliResult<Value> {
    let request: ExplainRequest =
        serde_json::from_value(request).map_err(|e| CliError::invalid_request(e.to_string()))?;
    let schema = find_schema(&request.collection)?;
    let info = CollectionInfo::new(&schema.name, schema.indexes.clone());
    let plan = QueryPlan::build(
        &info,
        &schema.doc_type,
        &request.args,
        &rights_for(&request.accounts),
        config.query.default_limit,
        config.query.max_limit,
    )?;
    let Some(plan) = plan else {
        return Ok(json!({ "skipped": true }));
    };
    let is_fast = is_fast_query(&info.indexes, plan.condition.filter.as_ref(), &plan.order_by);
    Ok(json!({
        "text": plan.text,
        "params": plan.params(),
        "isFast": is_fast,
        "limit": plan.limit,
        "segment": plan.segment,
    }))
}

/// `{text, params, helpers}` of the request's aggregation query
pub fn aggregate_request(_config: &QConfig, request: Value) -> CliResult<Value> {
    let request: AggregateRequest =
        serde_json::from_value(request).map_err(|e| CliError::invalid_request(e.to_string()))?;
    let schema = find_schema(&request.collection)?;
    let filter = request.filter.unwrap_or_else(|| json!({}));
    let condition = CompiledCondition::build(
        &schema.name,
        &schema.doc_type,
        &filter,
        &rights_for(&request.accounts),
    )?;
    let Some(condition) = condition else {
        return Ok(json!({ "skipped": true }));
    };
    let field_map = ScalarFieldMap::from_type(&schema.name, &schema.doc_type);
    let query = AggregationQuery::build(
        &field_map,
        &schema.name,
        Some(&condition.text()),
        &request.fields,
    )
    .map_err(QueryError::from)?;
    let helpers: Vec<String> = query.helpers.iter().map(|h| h.describe()).collect();
    Ok(json!({
        "text": query.text,
        "params": condition.params.values(),
        "helpers": helpers,
    }))
}
