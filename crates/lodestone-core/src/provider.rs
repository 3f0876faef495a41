// crates/lodestone-core/src/provider.rs
// Provider mode selection for the pluggable retrieval roles

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LodestoneError;

/// How a pluggable role (web search, keyword extraction, QueryDSL synthesis,
/// reranking) is fulfilled at runtime.
///
/// Parsed once from the role's `uses` string at construction time:
/// - `"builtin"` or empty selects the local algorithm
/// - `"mcp:<server>.<tool>"` selects a remote tool
/// - anything else is treated as a delegated-agent ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderMode {
    Builtin,
    Tool { server: String, tool: String },
    Agent { id: String },
}

impl ProviderMode {
    /// Parse a `uses` value into a mode.
    pub fn parse(value: &str) -> Result<Self, LodestoneError> {
        let value = value.trim();
        if value.is_empty() || value == "builtin" {
            return Ok(Self::Builtin);
        }
        if let Some(rest) = value.strip_prefix("mcp:") {
            return match rest.split_once('.') {
                Some((server, tool)) if !server.is_empty() && !tool.is_empty() => Ok(Self::Tool {
                    server: server.to_string(),
                    tool: tool.to_string(),
                }),
                _ => Err(LodestoneError::Config(format!(
                    "Invalid MCP format: {value}"
                ))),
            };
        }
        Ok(Self::Agent {
            id: value.to_string(),
        })
    }

    /// Parse, collapsing the error into its display string. Handlers keep
    /// the parse outcome and surface a stored error on each call rather
    /// than failing construction.
    pub fn parse_lenient(value: &str) -> Result<Self, String> {
        Self::parse(value).map_err(|e| e.to_string_bare())
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin)
    }
}

impl LodestoneError {
    /// Error text without the enum prefix, for result-level error strings.
    fn to_string_bare(&self) -> String {
        match self {
            LodestoneError::Config(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Tool { server, tool } => write!(f, "mcp:{server}.{tool}"),
            Self::Agent { id } => write!(f, "{id}"),
        }
    }
}

/// Mode selection for every pluggable role, as configured per assistant.
///
/// Each field follows the `builtin` | `mcp:<server>.<tool>` | `<agent-id>`
/// grammar. `search` additionally admits `"disabled"` to gate the whole
/// subsystem off.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Uses {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub web: String,
    #[serde(default)]
    pub keyword: String,
    #[serde(default, alias = "queryDSL")]
    pub query_dsl: String,
    #[serde(default)]
    pub rerank: String,
}

impl Uses {
    /// Whether the whole search subsystem is gated off.
    pub fn search_disabled(&self) -> bool {
        self.search.trim() == "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // ProviderMode::parse tests
    // ============================================================================

    #[test]
    fn test_parse_builtin() {
        assert_eq!(ProviderMode::parse("builtin").unwrap(), ProviderMode::Builtin);
        assert_eq!(ProviderMode::parse("").unwrap(), ProviderMode::Builtin);
        assert_eq!(ProviderMode::parse("  ").unwrap(), ProviderMode::Builtin);
    }

    #[test]
    fn test_parse_tool() {
        let mode = ProviderMode::parse("mcp:search-server.web_search").unwrap();
        assert_eq!(
            mode,
            ProviderMode::Tool {
                server: "search-server".into(),
                tool: "web_search".into(),
            }
        );
    }

    #[test]
    fn test_parse_tool_extra_dots_split_on_first() {
        let mode = ProviderMode::parse("mcp:srv.ns.tool").unwrap();
        assert_eq!(
            mode,
            ProviderMode::Tool {
                server: "srv".into(),
                tool: "ns.tool".into(),
            }
        );
    }

    #[test]
    fn test_parse_invalid_mcp() {
        let err = ProviderMode::parse("mcp:invalid").unwrap_err();
        assert!(err.to_string().contains("Invalid MCP format"));

        assert!(ProviderMode::parse("mcp:.tool").is_err());
        assert!(ProviderMode::parse("mcp:srv.").is_err());
        assert!(ProviderMode::parse("mcp:").is_err());
    }

    #[test]
    fn test_parse_agent() {
        let mode = ProviderMode::parse("web-searcher-v2").unwrap();
        assert_eq!(
            mode,
            ProviderMode::Agent {
                id: "web-searcher-v2".into(),
            }
        );
    }

    #[test]
    fn test_parse_lenient_error_is_bare() {
        let err = ProviderMode::parse_lenient("mcp:invalid").unwrap_err();
        assert_eq!(err, "Invalid MCP format: mcp:invalid");
    }

    #[test]
    fn test_display_roundtrip() {
        for raw in ["builtin", "mcp:srv.tool", "my-agent"] {
            let mode = ProviderMode::parse(raw).unwrap();
            assert_eq!(mode.to_string(), raw);
        }
    }

    // ============================================================================
    // Uses tests
    // ============================================================================

    #[test]
    fn test_uses_search_disabled() {
        let uses = Uses {
            search: "disabled".into(),
            ..Default::default()
        };
        assert!(uses.search_disabled());
        assert!(!Uses::default().search_disabled());
    }

    #[test]
    fn test_uses_deserialize_camel_alias() {
        let uses: Uses =
            serde_json::from_str(r#"{"queryDSL": "dsl-agent", "web": "mcp:s.t"}"#).unwrap();
        assert_eq!(uses.query_dsl, "dsl-agent");
        assert_eq!(uses.web, "mcp:s.t");
        assert_eq!(uses.keyword, "");
    }
}
