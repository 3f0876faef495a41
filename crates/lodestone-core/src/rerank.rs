// crates/lodestone-core/src/rerank.rs
// Result reranking (builtin weighted sort / agent / tool)

use anyhow::{Result, anyhow, bail};
use serde_json::{Value, json};
use std::cmp::Ordering;

use crate::config::RerankConfig;
use crate::host::SearchContext;
use crate::interop;
use crate::provider::ProviderMode;
use lodestone_types::ResultItem;

/// Weight assumed for items whose request source never set one.
const FALLBACK_WEIGHT: f64 = 0.6;

/// Tri-mode reranker over a citation-tagged item stream.
pub struct Reranker {
    mode: std::result::Result<ProviderMode, String>,
    config: RerankConfig,
}

impl Reranker {
    pub fn new(uses: &str, config: RerankConfig) -> Self {
        Self {
            mode: ProviderMode::parse_lenient(uses),
            config,
        }
    }

    /// Rerank `items` for `query`, truncating to `top_n`.
    ///
    /// `top_n == 0` falls back to the configured default; negative values
    /// (or values larger than the item count) pass everything through.
    pub async fn rerank(
        &self,
        ctx: Option<&SearchContext>,
        query: &str,
        items: Vec<ResultItem>,
        top_n: i64,
    ) -> Result<Vec<ResultItem>> {
        let top_n = if top_n == 0 { self.config.top_n } else { top_n };

        match &self.mode {
            Err(msg) => bail!("{msg}"),
            Ok(ProviderMode::Builtin) => Ok(rerank_builtin(items, top_n)),
            Ok(ProviderMode::Tool { server, tool }) => {
                let ctx = ctx.ok_or_else(|| anyhow!("context is required for reranking"))?;
                let args = rerank_args(query, &items, top_n)?;
                let payload = interop::call_tool(ctx, server, tool, args).await?;
                reorder_from_payload(payload, items, top_n)
            }
            Ok(ProviderMode::Agent { id }) => {
                let ctx = ctx.ok_or_else(|| anyhow!("context is required for reranking"))?;
                let args = rerank_args(query, &items, top_n)?;
                let payload = interop::call_agent(ctx, id, args).await?;
                reorder_from_payload(payload, items, top_n)
            }
        }
    }
}

fn rerank_args(query: &str, items: &[ResultItem], top_n: i64) -> Result<Value> {
    Ok(json!({
        "query": query,
        "items": serde_json::to_value(items)?,
        "topN": top_n,
        "action": "rerank",
    }))
}

/// Builtin reranking: sort by `score × weight` descending, then truncate.
/// The sort is stable, so equal-scored items keep their incoming order and
/// repeated application is idempotent.
pub fn rerank_builtin(mut items: Vec<ResultItem>, top_n: i64) -> Vec<ResultItem> {
    items.sort_by(|a, b| {
        weighted_score(b)
            .partial_cmp(&weighted_score(a))
            .unwrap_or(Ordering::Equal)
    });
    apply_top_n(&mut items, top_n);
    items
}

fn weighted_score(item: &ResultItem) -> f64 {
    let weight = if item.weight == 0.0 {
        FALLBACK_WEIGHT
    } else {
        item.weight
    };
    item.score * weight
}

fn apply_top_n(items: &mut Vec<ResultItem>, top_n: i64) {
    if top_n > 0 && (top_n as usize) < items.len() {
        items.truncate(top_n as usize);
    }
}

/// Apply an agent/tool-provided ordering to the original items.
///
/// The payload carries either an `order` array of citation IDs or an
/// `items` array of `{citation_id, ...}` objects (a bare array of either
/// shape is also accepted). Items the payload references come first, in
/// payload order, deduplicated by citation ID; everything unreferenced
/// (including items without a citation ID) is appended in original order.
fn reorder_from_payload(
    payload: Value,
    items: Vec<ResultItem>,
    top_n: i64,
) -> Result<Vec<ResultItem>> {
    let entries = match payload {
        Value::Object(mut map) => match map.remove("order").or_else(|| map.remove("items")) {
            Some(Value::Array(entries)) => entries,
            _ => bail!("rerank payload has no order or items array"),
        },
        Value::Array(entries) => entries,
        other => bail!("unexpected rerank payload: {}", other),
    };

    let mut order: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(id) => order.push(id),
            Value::Number(n) => order.push(n.to_string()),
            Value::Object(map) => {
                let id = map
                    .get("citation_id")
                    .or_else(|| map.get("citationId"))
                    .or_else(|| map.get("id"));
                match id {
                    Some(Value::String(id)) => order.push(id.clone()),
                    Some(Value::Number(n)) => order.push(n.to_string()),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let mut taken = vec![false; items.len()];
    let mut reordered = Vec::with_capacity(items.len());
    for id in &order {
        if id.is_empty() {
            continue;
        }
        if let Some(pos) = items
            .iter()
            .enumerate()
            .position(|(i, item)| !taken[i] && !item.citation_id.is_empty() && item.citation_id == *id)
        {
            taken[pos] = true;
            reordered.push(items[pos].clone());
        }
    }
    for (i, item) in items.into_iter().enumerate() {
        if !taken[i] {
            reordered.push(item);
        }
    }

    apply_top_n(&mut reordered, top_n);
    Ok(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_types::ResultItem;

    fn item(id: &str, score: f64, weight: f64) -> ResultItem {
        ResultItem {
            citation_id: id.to_string(),
            score,
            weight,
            content: format!("content {id}"),
            ..Default::default()
        }
    }

    // ============================================================================
    // Builtin reranking
    // ============================================================================

    #[test]
    fn test_builtin_weighted_order() {
        let items = vec![
            item("A", 0.8, 0.6),
            item("B", 0.6, 1.0),
            item("C", 0.9, 0.8),
            item("D", 0.5, 1.0),
        ];
        let reranked = rerank_builtin(items, 10);
        let ids: Vec<&str> = reranked.iter().map(|i| i.citation_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "B", "D", "A"]);
    }

    #[test]
    fn test_builtin_zero_weight_falls_back() {
        let items = vec![item("A", 0.5, 0.0), item("B", 0.4, 1.0)];
        let reranked = rerank_builtin(items, 10);
        // A: 0.5 × 0.6 = 0.30 < B: 0.40
        assert_eq!(reranked[0].citation_id, "B");
    }

    #[test]
    fn test_builtin_truncates_to_top_n() {
        let items = vec![item("A", 0.9, 1.0), item("B", 0.8, 1.0), item("C", 0.7, 1.0)];
        let reranked = rerank_builtin(items, 2);
        assert_eq!(reranked.len(), 2);
        assert_eq!(reranked[0].citation_id, "A");
    }

    #[test]
    fn test_builtin_nonpositive_top_n_passes_through() {
        let items = vec![item("A", 0.9, 1.0), item("B", 0.8, 1.0)];
        assert_eq!(rerank_builtin(items.clone(), -1).len(), 2);
        assert_eq!(rerank_builtin(items, 100).len(), 2);
    }

    #[test]
    fn test_builtin_idempotent() {
        let items = vec![
            item("A", 0.8, 0.6),
            item("B", 0.6, 1.0),
            item("C", 0.9, 0.8),
        ];
        let once = rerank_builtin(items, 10);
        let twice = rerank_builtin(once.clone(), 10);
        let once_ids: Vec<&str> = once.iter().map(|i| i.citation_id.as_str()).collect();
        let twice_ids: Vec<&str> = twice.iter().map(|i| i.citation_id.as_str()).collect();
        assert_eq!(once_ids, twice_ids);
    }

    // ============================================================================
    // Payload-driven reordering
    // ============================================================================

    #[test]
    fn test_reorder_by_order_array() {
        let items = vec![item("1", 0.5, 1.0), item("2", 0.6, 1.0), item("3", 0.7, 1.0)];
        let payload = serde_json::json!({"order": ["3", "1"]});
        let reordered = reorder_from_payload(payload, items, 10).unwrap();
        let ids: Vec<&str> = reordered.iter().map(|i| i.citation_id.as_str()).collect();
        // unreferenced "2" is appended in original order
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_reorder_by_items_array() {
        let items = vec![item("1", 0.5, 1.0), item("2", 0.6, 1.0)];
        let payload = serde_json::json!({"items": [{"citation_id": "2"}, {"citation_id": "1"}]});
        let reordered = reorder_from_payload(payload, items, 10).unwrap();
        let ids: Vec<&str> = reordered.iter().map(|i| i.citation_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_reorder_numeric_ids() {
        let items = vec![item("1", 0.5, 1.0), item("2", 0.6, 1.0)];
        let payload = serde_json::json!({"order": [2, 1]});
        let reordered = reorder_from_payload(payload, items, 10).unwrap();
        assert_eq!(reordered[0].citation_id, "2");
    }

    #[test]
    fn test_reorder_dedups_repeated_ids() {
        let items = vec![item("1", 0.5, 1.0), item("2", 0.6, 1.0)];
        let payload = serde_json::json!({"order": ["2", "2", "1"]});
        let reordered = reorder_from_payload(payload, items, 10).unwrap();
        assert_eq!(reordered.len(), 2);
    }

    #[test]
    fn test_reorder_uncited_items_append_last() {
        let mut uncited = item("", 0.9, 1.0);
        uncited.content = "no citation".into();
        let items = vec![item("1", 0.5, 1.0), uncited, item("2", 0.6, 1.0)];
        let payload = serde_json::json!({"order": ["2"]});
        let reordered = reorder_from_payload(payload, items, 10).unwrap();
        let ids: Vec<&str> = reordered.iter().map(|i| i.citation_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", ""]);
    }

    #[test]
    fn test_reorder_applies_top_n() {
        let items = vec![item("1", 0.5, 1.0), item("2", 0.6, 1.0), item("3", 0.7, 1.0)];
        let payload = serde_json::json!({"order": ["3", "2", "1"]});
        let reordered = reorder_from_payload(payload, items, 2).unwrap();
        assert_eq!(reordered.len(), 2);
    }

    #[test]
    fn test_reorder_rejects_scalar_payload() {
        assert!(reorder_from_payload(serde_json::json!("nope"), vec![], 10).is_err());
        assert!(reorder_from_payload(serde_json::json!({"weird": true}), vec![], 10).is_err());
    }

    // ============================================================================
    // Mode handling
    // ============================================================================

    #[tokio::test]
    async fn test_agent_mode_requires_context() {
        let reranker = Reranker::new("rr-agent", RerankConfig::default());
        let err = reranker.rerank(None, "q", vec![], 10).await.unwrap_err();
        assert!(err.to_string().contains("context is required"));
    }

    #[tokio::test]
    async fn test_builtin_default_top_n_from_config() {
        let reranker = Reranker::new("builtin", RerankConfig { top_n: 2 });
        let items = vec![item("A", 0.9, 1.0), item("B", 0.8, 1.0), item("C", 0.7, 1.0)];
        let reranked = reranker.rerank(None, "q", items, 0).await.unwrap();
        assert_eq!(reranked.len(), 2);
    }
}
