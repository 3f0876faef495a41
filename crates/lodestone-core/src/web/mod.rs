// crates/lodestone-core/src/web/mod.rs
// Web search handler: builtin vendor clients, delegated agent, or remote tool

mod serpapi;
mod serper;
mod tavily;

pub use serpapi::SerpApiClient;
pub use serper::SerperClient;
pub use tavily::TavilyClient;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{DEFAULT_LIMIT, SearchConfig, resolve_env_ref};
use crate::host::SearchContext;
use crate::interop;
use crate::keyword::KeywordExtractor;
use crate::provider::ProviderMode;
use crate::registry::SearchHandler;
use lodestone_types::{ResultItem, SearchRequest, SearchResult, SearchType};

/// Per-call timeout for vendor HTTP requests, independent of the caller's
/// cancellation deadline.
const VENDOR_TIMEOUT_SECS: u64 = 30;

/// Queries longer than this get keyword-compressed before hitting a vendor.
const QUERY_KEYWORD_THRESHOLD: usize = 100;

/// Resolved web query parameters after request/config fallback.
#[derive(Debug, Clone)]
pub struct WebQuery {
    pub query: String,
    pub limit: usize,
    pub sites: Vec<String>,
    pub time_range: Option<String>,
}

impl WebQuery {
    fn resolve(req: &SearchRequest, config: &SearchConfig) -> Self {
        let sites = if req.sites.is_empty() {
            config.web.sites.clone()
        } else {
            req.sites.clone()
        };
        let time_range = req.time_range.clone().or_else(|| config.web.time_range.clone());
        let limit = req.limit.or(config.web.limit).unwrap_or(DEFAULT_LIMIT);
        Self {
            query: req.query.clone(),
            limit,
            sites,
            time_range,
        }
    }
}

/// Position-based relevance for vendors that don't score results.
/// `position` is 1-based.
pub(crate) fn position_score(position: usize) -> f64 {
    (1.0 - 0.05 * position as f64).max(0.1)
}

/// `tbs` recency parameter for the Google-backed vendors.
pub(crate) fn google_time_range(range: &str) -> Option<&'static str> {
    match range {
        "hour" => Some("qdr:h"),
        "day" => Some("qdr:d"),
        "week" => Some("qdr:w"),
        "month" => Some("qdr:m"),
        "year" => Some("qdr:y"),
        _ => None,
    }
}

/// Prepend `site:` restrictions to the query text, joined by ` OR `.
pub(crate) fn site_prefixed_query(query: &str, sites: &[String]) -> String {
    if sites.is_empty() {
        return query.to_string();
    }
    let restriction: Vec<String> = sites.iter().map(|s| format!("site:{s}")).collect();
    format!("{} {}", restriction.join(" OR "), query)
}

/// Web search handler. Mode comes from `uses.web`; the builtin mode picks
/// a vendor from `config.web.provider`.
pub struct WebHandler {
    mode: std::result::Result<ProviderMode, String>,
    config: Arc<SearchConfig>,
    keyword: KeywordExtractor,
    http: reqwest::Client,
}

impl WebHandler {
    pub fn new(config: Arc<SearchConfig>) -> Self {
        let mode = ProviderMode::parse_lenient(&config.uses.web);
        let keyword = KeywordExtractor::new(&config.uses.keyword, config.keyword.clone());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(VENDOR_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            mode,
            config,
            keyword,
            http,
        }
    }

    /// Compress long queries down to their keywords before vendor dispatch.
    /// Extraction failures keep the original query.
    async fn effective_query(&self, ctx: &SearchContext, query: &str) -> String {
        if query.chars().count() <= QUERY_KEYWORD_THRESHOLD {
            return query.to_string();
        }
        match self
            .keyword
            .extract(Some(ctx), query, Some(self.config.keyword.max_keywords), None)
            .await
        {
            Ok(keywords) if !keywords.is_empty() => {
                let compressed: Vec<String> =
                    keywords.into_iter().map(|k| k.word).collect();
                debug!(terms = compressed.len(), "Compressed long web query to keywords");
                compressed.join(" ")
            }
            _ => query.to_string(),
        }
    }

    async fn search_builtin(&self, ctx: &SearchContext, query: &WebQuery) -> Result<Vec<ResultItem>> {
        let provider = self.config.web.provider.as_str();
        let key = resolve_env_ref(&self.config.web.api_key);
        let vendor_call = async {
            match provider {
                "tavily" => {
                    let key = key
                        .ok_or_else(|| anyhow::anyhow!("Tavily API key not configured"))?;
                    TavilyClient::new(self.http.clone(), key).search(query).await
                }
                "serper" => {
                    let key = key
                        .ok_or_else(|| anyhow::anyhow!("Serper API key not configured"))?;
                    SerperClient::new(self.http.clone(), key).search(query).await
                }
                "serpapi" => {
                    let key = key
                        .ok_or_else(|| anyhow::anyhow!("SerpAPI API key not configured"))?;
                    SerpApiClient::new(self.http.clone(), key).search(query).await
                }
                other => anyhow::bail!("unknown web provider: {other}"),
            }
        };

        tokio::select! {
            outcome = vendor_call => outcome,
            _ = ctx.cancel.cancelled() => anyhow::bail!("task cancelled"),
        }
    }

    async fn search_delegated(&self, ctx: &SearchContext, query: &WebQuery) -> Result<Vec<ResultItem>> {
        let args = json!({
            "query": query.query,
            "limit": query.limit,
            "sites": query.sites,
            "timeRange": query.time_range,
        });
        let payload = match &self.mode {
            Ok(ProviderMode::Tool { server, tool }) => {
                interop::call_tool(ctx, server, tool, args).await?
            }
            Ok(ProviderMode::Agent { id }) => interop::call_agent(ctx, id, args).await?,
            _ => anyhow::bail!("web provider mode is not delegated"),
        };
        Ok(parse_web_payload(payload))
    }
}

#[async_trait]
impl SearchHandler for WebHandler {
    fn kind(&self) -> SearchType {
        SearchType::Web
    }

    async fn search(&self, ctx: &SearchContext, req: &SearchRequest) -> SearchResult {
        if let Err(msg) = &self.mode {
            return SearchResult::failure(SearchType::Web, &req.query, req.source, msg.clone());
        }

        let mut query = WebQuery::resolve(req, &self.config);
        query.query = self.effective_query(ctx, &query.query).await;

        let outcome = match &self.mode {
            Ok(ProviderMode::Builtin) => self.search_builtin(ctx, &query).await,
            _ => self.search_delegated(ctx, &query).await,
        };

        match outcome {
            Ok(items) => {
                let mut result = SearchResult::empty(SearchType::Web, &req.query, req.source);
                result.items = items;
                for item in &mut result.items {
                    item.kind = Some(SearchType::Web);
                }
                result.finish();
                result
            }
            Err(e) => SearchResult::failure(SearchType::Web, &req.query, req.source, e.to_string()),
        }
    }
}

/// Decode an agent/tool web payload of shape `{items: [...], total}` (or a
/// bare item array). Scores are preserved as provided; missing fields
/// default to zero or empty.
fn parse_web_payload(payload: Value) -> Vec<ResultItem> {
    let entries = match payload {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        Value::Array(entries) => entries,
        _ => Vec::new(),
    };

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(map) = entry else { continue };
        let title = map
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let mut content = map
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if content.is_empty() {
            content = title.clone().unwrap_or_default();
        }
        if content.is_empty() {
            continue;
        }
        items.push(ResultItem {
            kind: Some(SearchType::Web),
            title,
            content,
            url: map
                .get("url")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            score: map.get("score").and_then(Value::as_f64).unwrap_or(0.0),
            ..Default::default()
        });
    }
    items
}
