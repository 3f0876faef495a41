// crates/lodestone-core/src/config/mod.rs
// Layered search configuration and engine defaults

pub mod file;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::provider::Uses;
use lodestone_types::{Scenario, Source};

/// Default per-source weights when no `weights` section is configured.
pub const DEFAULT_WEIGHT_USER: f64 = 1.0;
pub const DEFAULT_WEIGHT_HOOK: f64 = 0.8;
pub const DEFAULT_WEIGHT_AUTO: f64 = 0.6;
/// Default KB similarity threshold.
pub const DEFAULT_KB_THRESHOLD: f64 = 0.7;
/// Default item limit for handlers that don't receive one.
pub const DEFAULT_LIMIT: usize = 10;
/// Default rerank truncation.
pub const DEFAULT_RERANK_TOP_N: i64 = 10;
/// Default citation marker format.
pub const DEFAULT_CITATION_FORMAT: &str = "#ref:{id}";

/// Web handler defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Builtin vendor: one of tavily, serper, serpapi.
    #[serde(default = "WebConfig::default_provider")]
    pub provider: String,
    /// Environment variable holding the vendor API key, either as
    /// `$ENV.NAME` or a bare `NAME`.
    #[serde(default)]
    pub api_key: String,
    /// Default site restriction applied when the request has none.
    #[serde(default)]
    pub sites: Vec<String>,
    /// Default recency window.
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl WebConfig {
    fn default_provider() -> String {
        "tavily".into()
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            api_key: String::new(),
            sites: Vec::new(),
            time_range: None,
            limit: None,
        }
    }
}

/// Knowledge-base handler defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbConfig {
    /// Collections searched when the request names none.
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Force graph expansion on every KB request.
    #[serde(default)]
    pub graph: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Database handler defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbConfig {
    /// Models searched when the request names none.
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub scenario: Option<Scenario>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Keyword extraction tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default = "KeywordConfig::default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default)]
    pub language: Option<String>,
}

impl KeywordConfig {
    fn default_max_keywords() -> usize {
        DEFAULT_LIMIT
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            max_keywords: Self::default_max_keywords(),
            language: None,
        }
    }
}

/// QueryDSL synthesis tunables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDslConfig {
    /// Upper bound clamped onto generated limits, when set.
    #[serde(default)]
    pub max_limit: Option<i64>,
}

/// Reranking tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default = "RerankConfig::default_top_n")]
    pub top_n: i64,
}

impl RerankConfig {
    fn default_top_n() -> i64 {
        DEFAULT_RERANK_TOP_N
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_n: Self::default_top_n(),
        }
    }
}

/// Citation formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    /// Marker format; `{id}` is replaced with the citation ID.
    #[serde(default = "CitationConfig::default_format")]
    pub format: String,
    /// Whether the citation prompt is injected into built context.
    #[serde(default = "CitationConfig::default_auto_inject")]
    pub auto_inject: bool,
    /// Custom citation prompt overriding the built-in one.
    #[serde(default)]
    pub prompt: Option<String>,
}

impl CitationConfig {
    fn default_format() -> String {
        DEFAULT_CITATION_FORMAT.into()
    }
    fn default_auto_inject() -> bool {
        true
    }

    /// Render the in-text marker for a citation ID, e.g. `#ref:3`.
    /// Hosts use this to locate citations in model output.
    pub fn marker(&self, id: &str) -> String {
        self.format.replace("{id}", id)
    }
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            format: Self::default_format(),
            auto_inject: Self::default_auto_inject(),
            prompt: None,
        }
    }
}

/// Per-source relevance weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "WeightsConfig::default_user")]
    pub user: f64,
    #[serde(default = "WeightsConfig::default_hook")]
    pub hook: f64,
    #[serde(default = "WeightsConfig::default_auto")]
    pub auto: f64,
}

impl WeightsConfig {
    fn default_user() -> f64 {
        DEFAULT_WEIGHT_USER
    }
    fn default_hook() -> f64 {
        DEFAULT_WEIGHT_HOOK
    }
    fn default_auto() -> f64 {
        DEFAULT_WEIGHT_AUTO
    }

    pub fn for_source(&self, source: Source) -> f64 {
        match source {
            Source::User => self.user,
            Source::Hook => self.hook,
            Source::Auto => self.auto,
        }
    }
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            user: Self::default_user(),
            hook: Self::default_hook(),
            auto: Self::default_auto(),
        }
    }
}

/// Engine-wide behavior switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Drop items scoring below this value during post-processing.
    #[serde(default)]
    pub skip_threshold: Option<f64>,
}

/// Assembled configuration for one assistant.
///
/// Built once by merging global defaults, assistant-declared overrides, and
/// hook-supplied overrides; immutable for the lifetime of a dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub kb: KbConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub keyword: KeywordConfig,
    #[serde(default, alias = "queryDSL")]
    pub query_dsl: QueryDslConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub citation: CitationConfig,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub options: OptionsConfig,
    #[serde(default)]
    pub uses: Uses,
}

impl SearchConfig {
    /// Per-item weight for a request source.
    pub fn weight(&self, source: Source) -> f64 {
        self.weights.for_source(source)
    }

    /// Assemble a configuration by overlaying layers left to right
    /// (global defaults first, then assistant overrides, then hook
    /// overrides). Unparseable layers fall back to the merge of the rest;
    /// a wholly unparseable stack falls back to hardcoded defaults.
    pub fn layered(layers: &[Value]) -> Self {
        let mut merged = Value::Object(serde_json::Map::new());
        for layer in layers {
            deep_merge(&mut merged, layer);
        }
        match serde_json::from_value(merged) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to parse merged search config, using defaults");
                Self::default()
            }
        }
    }
}

/// Deep-merge `overlay` into `base`: objects merge key-by-key, everything
/// else (arrays included) replaces wholesale.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Resolve an environment reference of the form `$ENV.NAME` or a bare
/// variable name. Empty values are treated as unset.
pub fn resolve_env_ref(reference: &str) -> Option<String> {
    let name = reference.strip_prefix("$ENV.").unwrap_or(reference).trim();
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
