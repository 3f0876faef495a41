// crates/lodestone-core/src/keyword/mod.rs
// Keyword extraction for web-query preprocessing (builtin / agent / tool)

mod stopwords;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::config::KeywordConfig;
use crate::host::SearchContext;
use crate::interop;
use crate::provider::ProviderMode;

/// One extracted keyword with a frequency-normalized score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub score: f64,
}

/// Tri-mode keyword extractor.
///
/// Builtin mode is a local frequency tokenizer and needs no context;
/// agent and tool modes delegate and require one.
pub struct KeywordExtractor {
    mode: std::result::Result<ProviderMode, String>,
    config: KeywordConfig,
}

impl KeywordExtractor {
    pub fn new(uses: &str, config: KeywordConfig) -> Self {
        Self {
            mode: ProviderMode::parse_lenient(uses),
            config,
        }
    }

    pub async fn extract(
        &self,
        ctx: Option<&SearchContext>,
        content: &str,
        max_keywords: Option<usize>,
        language: Option<&str>,
    ) -> Result<Vec<Keyword>> {
        let max = max_keywords.unwrap_or(self.config.max_keywords);
        let language = language.or(self.config.language.as_deref());

        match &self.mode {
            Err(msg) => bail!("{msg}"),
            Ok(ProviderMode::Builtin) => Ok(extract_builtin(content, max)),
            Ok(ProviderMode::Tool { server, tool }) => {
                let ctx =
                    ctx.ok_or_else(|| anyhow!("context is required for keyword extraction"))?;
                let args = keyword_args(content, max, language);
                let payload = interop::call_tool(ctx, server, tool, args).await?;
                parse_keywords(payload, max)
            }
            Ok(ProviderMode::Agent { id }) => {
                let ctx =
                    ctx.ok_or_else(|| anyhow!("context is required for keyword extraction"))?;
                let args = keyword_args(content, max, language);
                let payload = interop::call_agent(ctx, id, args).await?;
                parse_keywords(payload, max)
            }
        }
    }
}

fn keyword_args(content: &str, max: usize, language: Option<&str>) -> Value {
    json!({
        "content": content,
        "maxKeywords": max,
        "language": language,
    })
}

/// Decode `{keywords: [...]}` or a bare array. Entries may be plain strings
/// or objects carrying `word`/`keyword` and an optional `score`.
fn parse_keywords(payload: Value, max: usize) -> Result<Vec<Keyword>> {
    let list = match payload {
        Value::Object(mut map) => match map.remove("keywords") {
            Some(Value::Array(items)) => items,
            _ => bail!("keyword payload has no keywords array"),
        },
        Value::Array(items) => items,
        other => bail!("unexpected keyword payload: {}", other),
    };

    let mut keywords = Vec::new();
    for entry in list {
        match entry {
            Value::String(word) if !word.trim().is_empty() => keywords.push(Keyword {
                word: word.trim().to_string(),
                score: 1.0,
            }),
            Value::Object(map) => {
                let word = map
                    .get("word")
                    .or_else(|| map.get("keyword"))
                    .or_else(|| map.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                if word.is_empty() {
                    continue;
                }
                let score = map.get("score").and_then(Value::as_f64).unwrap_or(1.0);
                keywords.push(Keyword { word, score });
            }
            _ => {}
        }
    }
    if max > 0 {
        keywords.truncate(max);
    }
    Ok(keywords)
}

// -- Builtin frequency extractor --------------------------------------------

/// Frequency-based multilingual extraction: tokenize, filter, count, and
/// return the top `max` tokens with scores normalized to the maximum
/// observed frequency.
pub fn extract_builtin(content: &str, max: usize) -> Vec<Keyword> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokenize(content) {
        let word = token.to_lowercase();
        if word.chars().count() < 2 || stopwords::is_stopword(&word) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    // Descending frequency; ties broken lexicographically for determinism
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let max_count = entries.first().map(|(_, c)| *c).unwrap_or(0).max(1);
    if max > 0 {
        entries.truncate(max);
    }
    entries
        .into_iter()
        .map(|(word, count)| Keyword {
            word,
            score: count as f64 / max_count as f64,
        })
        .collect()
}

/// Split on whitespace and punctuation, then split runs further wherever
/// the script flips between Han and non-Han.
fn tokenize(content: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_han = false;

    for c in content.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        let han = is_han(c);
        if !current.is_empty() && han != current_han {
            tokens.push(std::mem::take(&mut current));
        }
        current_han = han;
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// CJK Unified Ideographs (base block, extension A, compatibility block).
fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
    )
}
