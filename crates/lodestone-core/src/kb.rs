// crates/lodestone-core/src/kb.rs
// Knowledge-base handler: vector search with optional graph expansion

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::{DEFAULT_KB_THRESHOLD, DEFAULT_LIMIT, SearchConfig};
use crate::host::{KbApi, KbMode, KbQuery, KbResponse, SearchContext};
use crate::registry::SearchHandler;
use lodestone_types::{GraphNode, ResultItem, SearchRequest, SearchResult, SearchType};

/// Adapter over the external KB API.
///
/// Collections come from the request, then config; with neither the result
/// is empty and carries no error. Threshold and limit fall back the same
/// way before hitting the hardcoded defaults.
pub struct KbHandler {
    api: Arc<dyn KbApi>,
    config: Arc<SearchConfig>,
}

impl KbHandler {
    pub fn new(api: Arc<dyn KbApi>, config: Arc<SearchConfig>) -> Self {
        Self { api, config }
    }

    fn build_queries(&self, req: &SearchRequest, collections: &[String]) -> Vec<KbQuery> {
        let threshold = req
            .threshold
            .or(self.config.kb.threshold)
            .unwrap_or(DEFAULT_KB_THRESHOLD);
        let page_size = req.limit.or(self.config.kb.limit).unwrap_or(DEFAULT_LIMIT);
        let mode = if req.graph || self.config.kb.graph {
            KbMode::Expand
        } else {
            KbMode::Vector
        };

        collections
            .iter()
            .map(|collection| KbQuery {
                collection_id: collection.clone(),
                input: req.query.clone(),
                mode,
                threshold,
                page_size,
                metadata: req.metadata.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl SearchHandler for KbHandler {
    fn kind(&self) -> SearchType {
        SearchType::Kb
    }

    async fn search(&self, ctx: &SearchContext, req: &SearchRequest) -> SearchResult {
        let collections = if req.collections.is_empty() {
            self.config.kb.collections.clone()
        } else {
            req.collections.clone()
        };
        if collections.is_empty() {
            debug!("KB search skipped: no collections configured");
            return SearchResult::empty(SearchType::Kb, &req.query, req.source);
        }

        let queries = self.build_queries(req, &collections);
        let response = match self.api.search(&ctx.cancel, queries).await {
            Ok(response) => response,
            Err(e) => {
                return SearchResult::failure(
                    SearchType::Kb,
                    &req.query,
                    req.source,
                    format!("KB search failed: {e}"),
                );
            }
        };

        let mut result = SearchResult::empty(SearchType::Kb, &req.query, req.source);
        result.items = segments_to_items(&response);
        result.graph_nodes = graph_to_nodes(&response);
        result.finish();
        result
    }
}

fn segments_to_items(response: &KbResponse) -> Vec<ResultItem> {
    response
        .segments
        .iter()
        .filter(|segment| !segment.text.is_empty())
        .map(|segment| {
            let title = segment
                .metadata
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            ResultItem {
                kind: Some(SearchType::Kb),
                score: segment.score,
                content: segment.text.clone(),
                title,
                document_id: (!segment.document_id.is_empty())
                    .then(|| segment.document_id.clone()),
                collection: (!segment.collection_id.is_empty())
                    .then(|| segment.collection_id.clone()),
                metadata: segment.metadata.clone(),
                ..Default::default()
            }
        })
        .collect()
}

fn graph_to_nodes(response: &KbResponse) -> Option<Vec<GraphNode>> {
    let graph = response.graph.as_ref()?;
    if graph.nodes.is_empty() {
        return None;
    }
    Some(
        graph
            .nodes
            .iter()
            .map(|node| GraphNode {
                id: node.id.clone(),
                node_type: node.entity_type.clone(),
                name: node
                    .properties
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                properties: node.properties.clone(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LodestoneError, Result as LodestoneResult};
    use crate::host::{KbGraph, KbNode, KbSegment};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// KB stub capturing the queries it receives.
    struct StubKb {
        response: LodestoneResult<KbResponse>,
        seen: Mutex<Vec<KbQuery>>,
    }

    impl StubKb {
        fn ok(response: KbResponse) -> Self {
            Self {
                response: Ok(response),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(LodestoneError::Other(message.into())),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl KbApi for StubKb {
        async fn search(
            &self,
            _cancel: &CancellationToken,
            queries: Vec<KbQuery>,
        ) -> LodestoneResult<KbResponse> {
            self.seen.lock().unwrap().extend(queries);
            match &self.response {
                Ok(response) => Ok(response.clone()),
                Err(e) => Err(LodestoneError::Other(e.to_string())),
            }
        }
    }

    fn segment(collection: &str, text: &str, score: f64) -> KbSegment {
        KbSegment {
            document_id: "doc-1".into(),
            collection_id: collection.into(),
            text: text.into(),
            score,
            metadata: serde_json::Map::new(),
        }
    }

    fn handler_with(
        api: Arc<StubKb>,
        configure: impl FnOnce(&mut SearchConfig),
    ) -> KbHandler {
        let mut config = SearchConfig::default();
        configure(&mut config);
        KbHandler::new(api, Arc::new(config))
    }

    // ============================================================================
    // Collection fallback
    // ============================================================================

    #[tokio::test]
    async fn test_no_collections_is_empty_success() {
        let api = Arc::new(StubKb::ok(KbResponse::default()));
        let handler = handler_with(api.clone(), |_| {});
        let ctx = SearchContext::new("a1");
        let result = handler.search(&ctx, &SearchRequest::kb("q")).await;
        assert!(result.error.is_none());
        assert!(result.items.is_empty());
        assert!(api.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_collections_fallback() {
        let api = Arc::new(StubKb::ok(KbResponse::default()));
        let handler = handler_with(api.clone(), |config| {
            config.kb.collections = vec!["docs".into(), "faq".into()];
        });
        let ctx = SearchContext::new("a1");
        handler.search(&ctx, &SearchRequest::kb("q")).await;

        let seen = api.seen.lock().unwrap();
        let collections: Vec<&str> = seen.iter().map(|q| q.collection_id.as_str()).collect();
        assert_eq!(collections, vec!["docs", "faq"]);
    }

    #[tokio::test]
    async fn test_request_collections_win() {
        let api = Arc::new(StubKb::ok(KbResponse::default()));
        let handler = handler_with(api.clone(), |config| {
            config.kb.collections = vec!["fallback".into()];
        });
        let ctx = SearchContext::new("a1");
        let mut req = SearchRequest::kb("q");
        req.collections = vec!["mine".into()];
        handler.search(&ctx, &req).await;

        let seen = api.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].collection_id, "mine");
    }

    // ============================================================================
    // Query parameter resolution
    // ============================================================================

    #[tokio::test]
    async fn test_threshold_and_limit_defaults() {
        let api = Arc::new(StubKb::ok(KbResponse::default()));
        let handler = handler_with(api.clone(), |config| {
            config.kb.collections = vec!["docs".into()];
        });
        let ctx = SearchContext::new("a1");
        handler.search(&ctx, &SearchRequest::kb("q")).await;

        let seen = api.seen.lock().unwrap();
        assert!((seen[0].threshold - 0.7).abs() < 1e-9);
        assert_eq!(seen[0].page_size, 10);
        assert_eq!(seen[0].mode, KbMode::Vector);
    }

    #[tokio::test]
    async fn test_graph_mode_or_of_request_and_config() {
        let api = Arc::new(StubKb::ok(KbResponse::default()));
        let handler = handler_with(api.clone(), |config| {
            config.kb.collections = vec!["docs".into()];
            config.kb.graph = true;
        });
        let ctx = SearchContext::new("a1");
        handler.search(&ctx, &SearchRequest::kb("q")).await;
        assert_eq!(api.seen.lock().unwrap()[0].mode, KbMode::Expand);
    }

    // ============================================================================
    // Result mapping
    // ============================================================================

    #[tokio::test]
    async fn test_segments_map_to_items() {
        let mut seg = segment("docs", "segment body", 0.91);
        seg.metadata
            .insert("title".into(), json!("Segment Title"));
        let api = Arc::new(StubKb::ok(KbResponse {
            segments: vec![seg, segment("docs", "", 0.5)],
            graph: None,
        }));
        let handler = handler_with(api, |config| {
            config.kb.collections = vec!["docs".into()];
        });
        let ctx = SearchContext::new("a1");
        let result = handler.search(&ctx, &SearchRequest::kb("q")).await;

        // the empty-text segment is dropped
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.total, 1);
        let item = &result.items[0];
        assert_eq!(item.kind, Some(SearchType::Kb));
        assert_eq!(item.content, "segment body");
        assert_eq!(item.title.as_deref(), Some("Segment Title"));
        assert_eq!(item.collection.as_deref(), Some("docs"));
        assert_eq!(item.document_id.as_deref(), Some("doc-1"));
        assert!((item.score - 0.91).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_graph_nodes_mapped() {
        let mut properties = serde_json::Map::new();
        properties.insert("name".into(), json!("Alice"));
        properties.insert("role".into(), json!("author"));
        let api = Arc::new(StubKb::ok(KbResponse {
            segments: vec![segment("docs", "text", 0.8)],
            graph: Some(KbGraph {
                nodes: vec![KbNode {
                    id: "n1".into(),
                    entity_type: "person".into(),
                    properties,
                }],
            }),
        }));
        let handler = handler_with(api, |config| {
            config.kb.collections = vec!["docs".into()];
        });
        let ctx = SearchContext::new("a1");
        let mut req = SearchRequest::kb("q");
        req.graph = true;
        let result = handler.search(&ctx, &req).await;

        let nodes = result.graph_nodes.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "n1");
        assert_eq!(nodes[0].node_type, "person");
        assert_eq!(nodes[0].name, "Alice");
        assert_eq!(nodes[0].properties.get("role"), Some(&json!("author")));
    }

    // ============================================================================
    // Failure path
    // ============================================================================

    #[tokio::test]
    async fn test_api_failure_degrades_gracefully() {
        let api = Arc::new(StubKb::failing("connection refused"));
        let handler = handler_with(api, |config| {
            config.kb.collections = vec!["docs".into()];
        });
        let ctx = SearchContext::new("a1");
        let result = handler.search(&ctx, &SearchRequest::kb("q")).await;
        assert!(result.items.is_empty());
        let error = result.error.unwrap();
        assert!(error.contains("KB search failed"));
        assert!(error.contains("connection refused"));
    }
}
