// crates/lodestone-core/src/web/serper.rs
// Serper (google.serper.dev) search API client

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{WebQuery, google_time_range, position_score, site_prefixed_query};
use lodestone_types::{ResultItem, SearchType};

const SERPER_API_URL: &str = "https://google.serper.dev/search";

/// Serper web search client. Google-backed: site restrictions ride in the
/// query text and recency maps to `tbs=qdr:*`.
pub struct SerperClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(rename = "answerBox", default)]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct AnswerBox {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: Option<usize>,
}

impl SerperClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    pub async fn search(&self, query: &WebQuery) -> Result<Vec<ResultItem>> {
        let mut body = json!({
            "q": site_prefixed_query(&query.query, &query.sites),
            "num": query.limit,
        });
        if let Some(tbs) = query.time_range.as_deref().and_then(google_time_range) {
            body["tbs"] = json!(tbs);
        }

        let response = self
            .http
            .post(SERPER_API_URL)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Serper request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Serper API error {}: {}", status, error_body);
        }

        let parsed: SerperResponse = response
            .json()
            .await
            .context("Serper response parse failed")?;

        Ok(collect_items(parsed))
    }
}

fn collect_items(response: SerperResponse) -> Vec<ResultItem> {
    let mut items = Vec::with_capacity(response.organic.len() + 1);

    if let Some(answer_box) = response.answer_box {
        let content = answer_box
            .answer
            .or(answer_box.snippet)
            .unwrap_or_default();
        if !content.is_empty() {
            let mut item = ResultItem {
                kind: Some(SearchType::Web),
                title: answer_box.title.filter(|t| !t.is_empty()),
                content,
                url: answer_box.link.filter(|l| !l.is_empty()),
                score: 1.0,
                ..Default::default()
            };
            item.metadata
                .insert("type".into(), Value::String("answer_box".into()));
            items.push(item);
        }
    }

    for (i, organic) in response.organic.into_iter().enumerate() {
        let content = if organic.snippet.is_empty() {
            organic.title.clone()
        } else {
            organic.snippet
        };
        if content.is_empty() {
            continue;
        }
        let position = organic.position.unwrap_or(i + 1);
        items.push(ResultItem {
            kind: Some(SearchType::Web),
            title: (!organic.title.is_empty()).then_some(organic.title),
            content,
            url: (!organic.link.is_empty()).then_some(organic.link),
            score: position_score(position),
            ..Default::default()
        });
    }
    items
}
