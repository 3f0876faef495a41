// crates/lodestone-core/src/facade.rs
// Hook-facing facade: typed wrappers over loosely typed hook inputs

use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::dispatch::SearchEngine;
use crate::host::SearchContext;
use lodestone_types::{
    RerankOptions, Scenario, SearchRequest, SearchResult, SearchType, Source,
};

/// Facade handed to user-written hooks.
///
/// Hook inputs are generic key-value bags assembled dynamically; the facade
/// validates and coerces them into typed requests with `source = hook`.
/// Malformed combinator entries are skipped, never fatal: a bad entry must
/// not abort the batch.
pub struct SearchFacade {
    engine: SearchEngine,
    ctx: SearchContext,
}

impl SearchFacade {
    pub fn new(engine: SearchEngine, ctx: SearchContext) -> Self {
        Self { engine, ctx }
    }

    pub async fn web(&self, query: &str, opts: Option<&Value>) -> SearchResult {
        let req = build_request(SearchType::Web, query, opts);
        self.engine.search(&self.ctx, &req).await
    }

    pub async fn kb(&self, query: &str, opts: Option<&Value>) -> SearchResult {
        let req = build_request(SearchType::Kb, query, opts);
        self.engine.search(&self.ctx, &req).await
    }

    pub async fn db(&self, query: &str, opts: Option<&Value>) -> SearchResult {
        let req = build_request(SearchType::Db, query, opts);
        self.engine.search(&self.ctx, &req).await
    }

    pub async fn all(&self, reqs: &Value) -> Vec<SearchResult> {
        let parsed = parse_requests(reqs);
        self.engine.all(&self.ctx, &parsed).await
    }

    pub async fn any(&self, reqs: &Value) -> Vec<Option<SearchResult>> {
        let parsed = parse_requests(reqs);
        self.engine.any(&self.ctx, &parsed).await
    }

    pub async fn race(&self, reqs: &Value) -> Vec<Option<SearchResult>> {
        let parsed = parse_requests(reqs);
        self.engine.race(&self.ctx, &parsed).await
    }
}

/// Build a typed request from a hook option bag.
pub fn build_request(kind: SearchType, query: &str, opts: Option<&Value>) -> SearchRequest {
    let mut req = SearchRequest::new(kind, query).with_source(Source::Hook);
    if let Some(Value::Object(opts)) = opts {
        apply_opts(&mut req, opts);
    }
    req
}

/// Parse a combinator batch. Entries that are not objects, lack a valid
/// `type`, or lack a `query` are skipped with a debug note.
pub fn parse_requests(reqs: &Value) -> Vec<SearchRequest> {
    let Some(entries) = reqs.as_array() else {
        debug!("Combinator input is not an array, dispatching nothing");
        return Vec::new();
    };

    let mut parsed = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let Some(map) = entry.as_object() else {
            debug!(index = i, "Skipping non-object combinator entry");
            continue;
        };
        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .and_then(SearchType::from_str);
        let query = map.get("query").and_then(Value::as_str);
        match (kind, query) {
            (Some(kind), Some(query)) if !query.is_empty() => {
                let mut req = SearchRequest::new(kind, query).with_source(Source::Hook);
                apply_opts(&mut req, map);
                parsed.push(req);
            }
            _ => debug!(index = i, "Skipping combinator entry without type/query"),
        }
    }
    parsed
}

fn apply_opts(req: &mut SearchRequest, opts: &Map<String, Value>) {
    if let Some(limit) = opts.get("limit").and_then(coerce_limit) {
        req.limit = Some(limit);
    }

    match req.kind {
        SearchType::Web => {
            if let Some(sites) = opts.get("sites") {
                req.sites = string_list(sites);
            }
            if let Some(range) = opts.get("time_range").and_then(Value::as_str) {
                req.time_range = Some(range.to_string());
            }
        }
        SearchType::Kb => {
            if let Some(collections) = opts.get("collections") {
                req.collections = string_list(collections);
            }
            if let Some(threshold) = opts.get("threshold").and_then(Value::as_f64) {
                req.threshold = Some(threshold);
            }
            if let Some(graph) = opts.get("graph").and_then(Value::as_bool) {
                req.graph = graph;
            }
            if let Some(metadata) = opts.get("metadata") {
                req.metadata = Some(metadata.clone());
            }
        }
        SearchType::Db => {
            if let Some(models) = opts.get("models") {
                req.models = string_list(models);
            }
            if let Some(scenario) = opts
                .get("scenario")
                .and_then(Value::as_str)
                .and_then(Scenario::from_str)
            {
                req.scenario = Some(scenario);
            }
            if let Some(Value::Array(select)) = opts.get("select") {
                req.select = select.clone();
            }
            if let Some(Value::Array(wheres)) = opts.get("wheres") {
                req.wheres = wheres.clone();
            }
            if let Some(Value::Array(orders)) = opts.get("orders") {
                req.orders = orders.clone();
            }
        }
    }

    if let Some(Value::Object(rerank)) = opts.get("rerank") {
        let top_n = rerank
            .get("top_n")
            .and_then(Value::as_i64)
            .or_else(|| {
                rerank
                    .get("top_n")
                    .and_then(Value::as_f64)
                    .map(|f| f as i64)
            })
            .unwrap_or(0);
        req.rerank = Some(RerankOptions { top_n });
    }
}

/// Hooks hand limits through dynamic number types; accept both integer and
/// floating shapes.
fn coerce_limit(value: &Value) -> Option<usize> {
    if let Some(n) = value.as_u64() {
        return Some(n as usize);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f as usize)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(single) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    }
}

// ===================================================
// PROCESS-WIDE FACADE FACTORY
// ===================================================

/// Produces a facade for a request context. Set exactly once at startup by
/// the assistant subsystem; read-only afterwards.
pub type FacadeFactory = Arc<dyn Fn(SearchContext) -> Arc<SearchFacade> + Send + Sync>;

static FACADE_FACTORY: OnceLock<FacadeFactory> = OnceLock::new();

/// Install the process-wide facade factory. Returns false (and keeps the
/// original) if a factory was already installed.
pub fn set_facade_factory(factory: FacadeFactory) -> bool {
    let installed = FACADE_FACTORY.set(factory).is_ok();
    if !installed {
        warn!("Facade factory already installed, ignoring replacement");
    }
    installed
}

/// Build a facade for a context through the installed factory.
pub fn facade_for(ctx: SearchContext) -> Option<Arc<SearchFacade>> {
    FACADE_FACTORY.get().map(|factory| factory(ctx))
}
