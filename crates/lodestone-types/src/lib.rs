// crates/lodestone-types/src/lib.rs

//! Shared data contracts between the Lodestone search core and its clients.
//!
//! This crate provides the core domain model for:
//! - **Search requests**: typed queries against the web, knowledge-base, and
//!   database backends
//! - **Search results**: normalized, citation-tagged result streams
//! - **References**: read-only projections of result items for LLM context
//!
//! These types are designed to work across native and WASM builds,
//! with no native-only dependencies allowed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ===================================================
// SEARCH KINDS AND PROVENANCE
// ===================================================

/// The retrieval backend a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Public web search through a vendor provider.
    Web,
    /// Vector/graph knowledge-base search.
    Kb,
    /// Structured database search through the QueryDSL pipeline.
    Db,
}

impl SearchType {
    /// Parse a search type from its wire name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "web" => Some(Self::Web),
            "kb" => Some(Self::Kb),
            "db" => Some(Self::Db),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Kb => "kb",
            Self::Db => "db",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request came from. Drives the per-item relevance weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Issued directly by the end user.
    #[default]
    User,
    /// Issued by a user-written hook.
    Hook,
    /// Issued automatically by the runtime.
    Auto,
}

impl Source {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Self::User),
            "hook" => Some(Self::Hook),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Hook => "hook",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hint passed to the QueryDSL synthesizer to shape its output.
/// Does not change the pipeline structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Filter,
    Aggregation,
    Join,
    Complex,
}

impl Scenario {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "filter" => Some(Self::Filter),
            "aggregation" => Some(Self::Aggregation),
            "join" => Some(Self::Join),
            "complex" => Some(Self::Complex),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Aggregation => "aggregation",
            Self::Join => "join",
            Self::Complex => "complex",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===================================================
// REQUESTS
// ===================================================

/// Reranking options attached to a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RerankOptions {
    /// Keep only the top N items after reranking. Values <= 0 (or larger
    /// than the item count) pass everything through.
    #[serde(default)]
    pub top_n: i64,
}

/// A single-use, request-scoped search request.
///
/// Per-backend parameters are flat on the struct; only the fields matching
/// `kind` are consulted by the owning handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Target backend.
    #[serde(rename = "type")]
    pub kind: SearchType,
    /// Maximum number of items to return. `None` means handler default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Provenance of the request (drives item weighting).
    #[serde(default)]
    pub source: Source,

    // -- web parameters --
    /// Restrict web results to these domains.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sites: Vec<String>,
    /// Recency window: one of hour, day, week, month, year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,

    // -- kb parameters --
    /// Knowledge-base collections to query. Empty falls back to config.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,
    /// Minimum similarity score for KB segments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Request graph expansion in addition to vector search.
    #[serde(default)]
    pub graph: bool,
    /// Opaque metadata filter forwarded to the KB API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    // -- db parameters --
    /// Model identifiers to search. Empty falls back to config.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    /// Synthesis hint for the QueryDSL generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    /// Preset where-conditions, prepended to the generated DSL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wheres: Vec<Value>,
    /// Preset order-conditions, prepended to the generated DSL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orders: Vec<Value>,
    /// Preset select-columns, merged ahead of the generated DSL's.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<Value>,

    /// Optional reranking of the final item stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankOptions>,
}

impl SearchRequest {
    /// Create a minimal request for the given backend.
    pub fn new(kind: SearchType, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kind,
            limit: None,
            source: Source::default(),
            sites: Vec::new(),
            time_range: None,
            collections: Vec::new(),
            threshold: None,
            graph: false,
            metadata: None,
            models: Vec::new(),
            scenario: None,
            wheres: Vec::new(),
            orders: Vec::new(),
            select: Vec::new(),
            rerank: None,
        }
    }

    pub fn web(query: impl Into<String>) -> Self {
        Self::new(SearchType::Web, query)
    }

    pub fn kb(query: impl Into<String>) -> Self {
        Self::new(SearchType::Kb, query)
    }

    pub fn db(query: impl Into<String>) -> Self {
        Self::new(SearchType::Db, query)
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ===================================================
// RESULTS
// ===================================================

/// The normalized unit of retrieval shared by every backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultItem {
    /// Opaque integer string tagging this item for in-text LLM reference.
    /// Empty until the dispatch engine allocates it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub citation_id: String,
    /// Backend that produced the item.
    #[serde(rename = "type")]
    pub kind: Option<SearchType>,
    /// Provenance inherited from the owning request.
    #[serde(default)]
    pub source: Source,
    /// Source weight in [0, 1], inherited from the request source.
    #[serde(default)]
    pub weight: f64,
    /// Provider relevance score in [0, 1].
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Always populated.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    // -- kb-only fields --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    // -- db-only fields --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Free-form per-item metadata bag.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Entity node returned by graph-expanded KB search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

/// Per-request search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: SearchType,
    pub query: String,
    pub source: Source,
    #[serde(default)]
    pub items: Vec<ResultItem>,
    /// Item count after all post-processing. Kept equal to `items.len()`.
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub duration_ms: u64,
    /// Populated on failure. Non-empty error implies empty `items`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Graph nodes from KB expand mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_nodes: Option<Vec<GraphNode>>,
    /// Final generated QueryDSL (DB only), attached for observability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsl: Option<Value>,
}

impl SearchResult {
    /// An empty, successful result for the given request shape.
    pub fn empty(kind: SearchType, query: impl Into<String>, source: Source) -> Self {
        Self {
            kind,
            query: query.into(),
            source,
            items: Vec::new(),
            total: 0,
            duration_ms: 0,
            error: None,
            graph_nodes: None,
            dsl: None,
        }
    }

    /// A failed result: error populated, no items.
    pub fn failure(
        kind: SearchType,
        query: impl Into<String>,
        source: Source,
        error: impl Into<String>,
    ) -> Self {
        let mut result = Self::empty(kind, query, source);
        result.error = Some(error.into());
        result
    }

    /// Recompute `total` from the item list. Call after any mutation of
    /// `items` so the count invariant holds.
    pub fn finish(&mut self) {
        self.total = self.items.len();
    }

    /// Whether this result satisfies the `any` success predicate:
    /// at least one item and no error.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.items.is_empty()
    }
}

// ===================================================
// REFERENCES
// ===================================================

/// Read-only projection of a [`ResultItem`] into the LLM context block.
/// References are derived, not owned; the underlying items retain authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    #[serde(rename = "type")]
    pub ref_type: Option<SearchType>,
    pub source: Source,
    pub weight: f64,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&ResultItem> for Reference {
    fn from(item: &ResultItem) -> Self {
        Self {
            id: item.citation_id.clone(),
            ref_type: item.kind,
            source: item.source,
            weight: item.weight,
            score: item.score,
            title: item.title.clone(),
            content: item.content.clone(),
            url: item.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // SearchType / Source / Scenario parsing
    // ============================================================================

    #[test]
    fn test_search_type_from_str() {
        assert_eq!(SearchType::from_str("web"), Some(SearchType::Web));
        assert_eq!(SearchType::from_str("KB"), Some(SearchType::Kb));
        assert_eq!(SearchType::from_str("Db"), Some(SearchType::Db));
        assert_eq!(SearchType::from_str("xyz"), None);
        assert_eq!(SearchType::from_str(""), None);
    }

    #[test]
    fn test_search_type_display() {
        assert_eq!(SearchType::Web.to_string(), "web");
        assert_eq!(SearchType::Kb.to_string(), "kb");
        assert_eq!(SearchType::Db.to_string(), "db");
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!(Source::from_str("user"), Some(Source::User));
        assert_eq!(Source::from_str("Hook"), Some(Source::Hook));
        assert_eq!(Source::from_str("AUTO"), Some(Source::Auto));
        assert_eq!(Source::from_str("other"), None);
    }

    #[test]
    fn test_scenario_from_str() {
        assert_eq!(Scenario::from_str("filter"), Some(Scenario::Filter));
        assert_eq!(Scenario::from_str("aggregation"), Some(Scenario::Aggregation));
        assert_eq!(Scenario::from_str("join"), Some(Scenario::Join));
        assert_eq!(Scenario::from_str("complex"), Some(Scenario::Complex));
        assert_eq!(Scenario::from_str("unknown"), None);
    }

    // ============================================================================
    // Request construction
    // ============================================================================

    #[test]
    fn test_request_builders() {
        let req = SearchRequest::web("rust async").with_limit(5).with_source(Source::Hook);
        assert_eq!(req.kind, SearchType::Web);
        assert_eq!(req.query, "rust async");
        assert_eq!(req.limit, Some(5));
        assert_eq!(req.source, Source::Hook);
        assert!(req.sites.is_empty());
        assert!(req.rerank.is_none());
    }

    #[test]
    fn test_request_serialize_type_field() {
        let req = SearchRequest::kb("q");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "kb");
        assert_eq!(json["query"], "q");
        // Empty per-backend vectors are omitted from the wire form
        assert!(json.get("sites").is_none());
        assert!(json.get("models").is_none());
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"type": "db", "query": "orders last week"}"#).unwrap();
        assert_eq!(req.kind, SearchType::Db);
        assert_eq!(req.source, Source::User);
        assert!(req.models.is_empty());
        assert!(req.limit.is_none());
    }

    // ============================================================================
    // Result invariants
    // ============================================================================

    #[test]
    fn test_failure_has_no_items() {
        let result = SearchResult::failure(SearchType::Web, "q", Source::User, "boom");
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.items.is_empty());
        assert_eq!(result.total, 0);
        assert!(!result.is_success());
    }

    #[test]
    fn test_finish_recomputes_total() {
        let mut result = SearchResult::empty(SearchType::Kb, "q", Source::Hook);
        result.items.push(ResultItem {
            content: "hello".into(),
            ..Default::default()
        });
        result.items.push(ResultItem {
            content: "world".into(),
            ..Default::default()
        });
        result.finish();
        assert_eq!(result.total, 2);
        assert!(result.is_success());
    }

    #[test]
    fn test_empty_success_is_not_any_success() {
        // The `any` combinator requires at least one item
        let result = SearchResult::empty(SearchType::Web, "q", Source::Auto);
        assert!(!result.is_success());
    }

    // ============================================================================
    // Reference projection
    // ============================================================================

    #[test]
    fn test_reference_from_item() {
        let item = ResultItem {
            citation_id: "3".into(),
            kind: Some(SearchType::Web),
            source: Source::Hook,
            weight: 0.8,
            score: 0.95,
            title: Some("Title".into()),
            content: "Body".into(),
            url: Some("https://example.com".into()),
            ..Default::default()
        };
        let reference = Reference::from(&item);
        assert_eq!(reference.id, "3");
        assert_eq!(reference.ref_type, Some(SearchType::Web));
        assert_eq!(reference.source, Source::Hook);
        assert!((reference.weight - 0.8).abs() < 1e-9);
        assert_eq!(reference.title.as_deref(), Some("Title"));
        assert_eq!(reference.content, "Body");
    }

    #[test]
    fn test_result_item_roundtrip() {
        let item = ResultItem {
            citation_id: "1".into(),
            kind: Some(SearchType::Db),
            content: "row".into(),
            model: Some("orders".into()),
            record_id: Some("42".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: ResultItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.citation_id, "1");
        assert_eq!(back.kind, Some(SearchType::Db));
        assert_eq!(back.model.as_deref(), Some("orders"));
        assert_eq!(back.record_id.as_deref(), Some("42"));
    }
}
