// crates/lodestone-core/src/host.rs
// Surfaces consumed from the hosting agent runtime and its backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

// ===================================================
// AGENT RUNTIME
// ===================================================

/// Reply from a delegated agent call. Hooks deposit structured outputs
/// into `next`; callers must tolerate `{data: ...}` wrappers and
/// string-encoded JSON at this boundary.
#[derive(Debug, Clone, Default)]
pub struct AgentReply {
    pub next: Value,
}

/// A resolved agent that can be stream-called with a message list.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    /// Stream-call the agent. `options.skip` suppresses history persistence
    /// and user-visible output.
    async fn stream(
        &self,
        cancel: &CancellationToken,
        messages: Vec<Value>,
        options: Value,
    ) -> Result<AgentReply>;
}

/// The hosting runtime's agent directory.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Resolve an agent by ID. May fail for unknown agents.
    async fn get_agent(&self, id: &str) -> Result<Arc<dyn AgentHandle>>;
}

// ===================================================
// TOOL TRANSPORT
// ===================================================

/// One content block of a tool response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: text.into(),
        }
    }
}

/// Response from a remote tool invocation. `is_error` promotes to a
/// handler-level error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResponse {
    /// First text content block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|c| c.kind == "text")
            .map(|c| c.text.as_str())
    }
}

/// A connected tool server.
#[async_trait]
pub trait ToolClient: Send + Sync {
    async fn call_tool(
        &self,
        cancel: &CancellationToken,
        name: &str,
        args: Value,
    ) -> Result<ToolResponse>;
}

/// Name-addressable registry of remote tool servers.
pub trait ToolTransport: Send + Sync {
    fn select_tool(&self, server_id: &str) -> Result<Arc<dyn ToolClient>>;
}

// ===================================================
// KNOWLEDGE BASE API
// ===================================================

/// Search mode for a single KB query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KbMode {
    /// Pure vector similarity search.
    Vector,
    /// Vector search plus graph expansion.
    Expand,
}

/// One query against one KB collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbQuery {
    pub collection_id: String,
    pub input: String,
    pub mode: KbMode,
    pub threshold: f64,
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A matched segment from the KB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbSegment {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// An entity node from graph expansion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbGraph {
    #[serde(default)]
    pub nodes: Vec<KbNode>,
}

/// Combined response across all submitted queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbResponse {
    #[serde(default)]
    pub segments: Vec<KbSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<KbGraph>,
}

/// External knowledge-base search API.
#[async_trait]
pub trait KbApi: Send + Sync {
    async fn search(&self, cancel: &CancellationToken, queries: Vec<KbQuery>) -> Result<KbResponse>;
}

// ===================================================
// QUERY ENGINE
// ===================================================

/// A query loaded into the engine, ready for execution.
#[async_trait]
pub trait LoadedQuery: Send + Sync {
    async fn get(&self, cancel: &CancellationToken) -> Result<Vec<Map<String, Value>>>;
}

/// One named query engine.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn load(&self, raw_json: &str) -> Result<Arc<dyn LoadedQuery>>;
}

/// Registry of named query engines. The DB pipeline executes against the
/// engine named [`DEFAULT_QUERY_ENGINE`].
pub trait QueryEngineRegistry: Send + Sync {
    fn select(&self, name: &str) -> Result<Arc<dyn QueryEngine>>;
}

/// Name of the engine the DB pipeline loads queries into.
pub const DEFAULT_QUERY_ENGINE: &str = "default";

// ===================================================
// MODEL REGISTRY
// ===================================================

/// One column of a model's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A resolved data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// Lookup of model schemas by ID.
pub trait ModelRegistry: Send + Sync {
    fn get(&self, id: &str) -> Option<ModelInfo>;
}

// ===================================================
// SEARCH CONTEXT
// ===================================================

/// Request-scoped context handed to every dispatch.
///
/// Carries the caller's identity, its cancellation signal, and the runtime
/// collaborators needed by delegated-agent and remote-tool provider modes.
/// Built by the hosting runtime; the core treats it as already authorized.
#[derive(Clone)]
pub struct SearchContext {
    /// The assistant this dispatch runs on behalf of.
    pub assistant_id: String,
    /// Chat session identity, when the dispatch originates from a chat.
    pub session_id: Option<String>,
    /// Caller cancellation. Honored at every suspension point.
    pub cancel: CancellationToken,
    /// Agent directory for delegated-agent provider modes.
    pub agents: Option<Arc<dyn AgentRuntime>>,
    /// Tool transport for remote-tool provider modes.
    pub tools: Option<Arc<dyn ToolTransport>>,
}

impl SearchContext {
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            session_id: None,
            cancel: CancellationToken::new(),
            agents: None,
            tools: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_agents(mut self, agents: Arc<dyn AgentRuntime>) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolTransport>) -> Self {
        self.tools = Some(tools);
        self
    }
}

impl std::fmt::Debug for SearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchContext")
            .field("assistant_id", &self.assistant_id)
            .field("session_id", &self.session_id)
            .field("has_agents", &self.agents.is_some())
            .field("has_tools", &self.tools.is_some())
            .finish()
    }
}
