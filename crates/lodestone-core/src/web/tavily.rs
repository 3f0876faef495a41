// crates/lodestone-core/src/web/tavily.rs
// Tavily search API client

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{WebQuery, position_score};
use lodestone_types::{ResultItem, SearchType};

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// Tavily web search client. Tavily scores results itself; positions are
/// only used when a result comes back unscored.
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
}

impl TavilyClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    pub async fn search(&self, query: &WebQuery) -> Result<Vec<ResultItem>> {
        let mut body = json!({
            "api_key": self.api_key,
            "query": query.query,
            "max_results": query.limit,
        });
        if !query.sites.is_empty() {
            body["include_domains"] = json!(query.sites);
        }
        if let Some(range) = query.time_range.as_deref() {
            body["time_range"] = json!(range);
        }

        let response = self
            .http
            .post(TAVILY_API_URL)
            .json(&body)
            .send()
            .await
            .context("Tavily request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Tavily API error {}: {}", status, error_body);
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .context("Tavily response parse failed")?;

        let mut items = Vec::with_capacity(parsed.results.len() + 1);
        if let Some(answer) = parsed.answer.filter(|a| !a.is_empty()) {
            items.push(answer_box_item(answer));
        }
        for (i, result) in parsed.results.into_iter().enumerate() {
            let content = if result.content.is_empty() {
                result.title.clone()
            } else {
                result.content
            };
            if content.is_empty() {
                continue;
            }
            items.push(ResultItem {
                kind: Some(SearchType::Web),
                title: (!result.title.is_empty()).then_some(result.title),
                content,
                url: (!result.url.is_empty()).then_some(result.url),
                score: result
                    .score
                    .unwrap_or_else(|| position_score(i + 1))
                    .clamp(0.0, 1.0),
                ..Default::default()
            });
        }
        Ok(items)
    }
}

fn answer_box_item(answer: String) -> ResultItem {
    let mut item = ResultItem {
        kind: Some(SearchType::Web),
        content: answer,
        score: 1.0,
        ..Default::default()
    };
    item.metadata
        .insert("type".into(), Value::String("answer_box".into()));
    item
}
