// crates/lodestone-core/src/web/serpapi.rs
// SerpAPI (serpapi.com) search API client

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;

use super::{WebQuery, google_time_range, position_score, site_prefixed_query};
use lodestone_types::{ResultItem, SearchType};

const SERPAPI_BASE_URL: &str = "https://serpapi.com/search";

/// SerpAPI client. GET-style API; parameters ride urlencoded in the query
/// string, with the same Google conventions as Serper.
pub struct SerpApiClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    answer_box: Option<SerpApiAnswerBox>,
    #[serde(default)]
    organic_results: Vec<SerpApiOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerpApiAnswerBox {
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
struct SerpApiOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: Option<usize>,
}

impl SerpApiClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    fn build_url(&self, query: &WebQuery) -> String {
        let q = site_prefixed_query(&query.query, &query.sites);
        let mut url = format!(
            "{}?engine=google&q={}&api_key={}&num={}",
            SERPAPI_BASE_URL,
            urlencoding::encode(&q),
            urlencoding::encode(&self.api_key),
            query.limit,
        );
        if let Some(tbs) = query.time_range.as_deref().and_then(google_time_range) {
            url.push_str("&tbs=");
            url.push_str(&urlencoding::encode(tbs));
        }
        url
    }

    pub async fn search(&self, query: &WebQuery) -> Result<Vec<ResultItem>> {
        let response = self
            .http
            .get(self.build_url(query))
            .send()
            .await
            .context("SerpAPI request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("SerpAPI error {}: {}", status, error_body);
        }

        let parsed: SerpApiResponse = response
            .json()
            .await
            .context("SerpAPI response parse failed")?;

        Ok(collect_items(parsed))
    }
}

fn collect_items(response: SerpApiResponse) -> Vec<ResultItem> {
    let mut items = Vec::with_capacity(response.organic_results.len() + 1);

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

    for (i, organic) in response.organic_results.into_iter().enumerate() {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SerpApiClient {
        SerpApiClient::new(reqwest::Client::new(), "secret key".into())
    }

    #[test]
    fn test_build_url_encodes_query() {
        let query = WebQuery {
            query: "rust async & await".into(),
            limit: 5,
            sites: vec![],
            time_range: None,
        };
        let url = client().build_url(&query);
        assert!(url.starts_with("https://serpapi.com/search?engine=google&q="));
        assert!(url.contains("rust%20async%20%26%20await"));
        assert!(url.contains("num=5"));
        assert!(!url.contains("tbs="));
    }

    #[test]
    fn test_build_url_with_sites_and_time_range() {
        let query = WebQuery {
            query: "tokio".into(),
            limit: 3,
            sites: vec!["docs.rs".into()],
            time_range: Some("week".into()),
        };
        let url = client().build_url(&query);
        assert!(url.contains(&urlencoding::encode("site:docs.rs tokio").into_owned()));
        assert!(url.contains("tbs=qdr%3Aw"));
    }

    #[test]
    fn test_collect_items_scoring() {
        let response: SerpApiResponse = serde_json::from_str(
            r#"{
                "answer_box": {"snippet": "direct answer"},
                "organic_results": [
                    {"title": "T1", "link": "https://a", "snippet": "S1", "position": 3}
                ]
            }"#,
        )
        .unwrap();
        let items = collect_items(response);
        assert_eq!(items.len(), 2);
        assert!((items[0].score - 1.0).abs() < 1e-9);
        assert!((items[1].score - 0.85).abs() < 1e-9);
    }
}
