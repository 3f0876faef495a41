// crates/lodestone-core/src/db/generator.rs
// Natural-language to QueryDSL synthesis (builtin heuristic / agent / tool)

use anyhow::{Result, bail};
use serde_json::{Value, json};
use tracing::debug;

use super::dsl::QueryDsl;
use crate::host::SearchContext;
use crate::interop;
use crate::keyword;
use crate::provider::ProviderMode;
use lodestone_types::Scenario;

/// Terms considered by the builtin heuristic.
const BUILTIN_MAX_TERMS: usize = 8;

/// Inputs to one synthesis call. `schema` is a single object when one model
/// is searched and an array when several are.
#[derive(Debug, Clone)]
pub struct GenerateParams<'a> {
    pub query: &'a str,
    pub model_ids: &'a [String],
    pub scenario: Option<Scenario>,
    pub limit: Option<usize>,
    pub schema: Value,
}

/// Tri-mode QueryDSL generator.
///
/// Agent and tool modes delegate synthesis (the production path); the
/// builtin mode is a deterministic keyword-to-column matcher that needs no
/// context.
pub struct DslGenerator {
    mode: std::result::Result<ProviderMode, String>,
}

impl DslGenerator {
    pub fn new(uses: &str) -> Self {
        Self {
            mode: ProviderMode::parse_lenient(uses),
        }
    }

    /// Whether the selected mode needs a collaborator the given context
    /// does not carry.
    pub fn missing_context(&self, ctx: &SearchContext) -> bool {
        match &self.mode {
            Ok(ProviderMode::Agent { .. }) => ctx.agents.is_none(),
            Ok(ProviderMode::Tool { .. }) => ctx.tools.is_none(),
            _ => false,
        }
    }

    /// Synthesize a DSL. `Ok(None)` means the provider produced nothing.
    pub async fn generate(
        &self,
        ctx: &SearchContext,
        params: &GenerateParams<'_>,
    ) -> Result<Option<QueryDsl>> {
        match &self.mode {
            Err(msg) => bail!("{msg}"),
            Ok(ProviderMode::Builtin) => Ok(generate_builtin(params)),
            Ok(ProviderMode::Tool { server, tool }) => {
                let args = generate_args(params);
                let payload = interop::call_tool(ctx, server, tool, args).await?;
                decode_dsl(payload)
            }
            Ok(ProviderMode::Agent { id }) => {
                let args = generate_args(params);
                let payload = interop::call_agent(ctx, id, args).await?;
                decode_dsl(payload)
            }
        }
    }
}

fn generate_args(params: &GenerateParams<'_>) -> Value {
    json!({
        "query": params.query,
        "modelIds": params.model_ids,
        "scenario": params.scenario,
        "limit": params.limit,
        "extraParams": { "schema": params.schema },
    })
}

fn decode_dsl(payload: Value) -> Result<Option<QueryDsl>> {
    match payload {
        Value::Null => Ok(None),
        Value::Object(map) => {
            let dsl: QueryDsl = serde_json::from_value(Value::Object(map))?;
            Ok(Some(dsl))
        }
        other => bail!("unexpected QueryDSL payload: {}", other),
    }
}

/// Deterministic local synthesis: extract the query's keywords, pin terms
/// matching a column name or label to that column, and funnel the rest into
/// the first text-like column. Scenario hints only shape LLM-backed modes;
/// the heuristic ignores them.
fn generate_builtin(params: &GenerateParams<'_>) -> Option<QueryDsl> {
    let schema = match &params.schema {
        Value::Array(schemas) => schemas.first()?,
        other => other,
    };
    let table = schema.get("name").and_then(Value::as_str)?;
    let columns = schema
        .get("columns")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let terms = keyword::extract_builtin(params.query, BUILTIN_MAX_TERMS);
    let mut wheres = Vec::new();
    let mut leftover: Vec<String> = Vec::new();

    for term in terms {
        match column_matching(&columns, &term.word) {
            Some(column) => wheres.push(like_clause(&column, &term.word)),
            None => leftover.push(term.word),
        }
    }

    if !leftover.is_empty() {
        if let Some(column) = first_text_column(&columns) {
            for term in leftover {
                wheres.push(like_clause(&column, &term));
            }
        }
    }

    debug!(table = table, clauses = wheres.len(), "Builtin QueryDSL synthesis");

    Some(QueryDsl {
        from: Some(Value::String(table.to_string())),
        wheres,
        limit: params.limit.map(|l| l as i64),
        ..Default::default()
    })
}

fn like_clause(column: &str, term: &str) -> Value {
    json!({"column": column, "op": "like", "value": format!("%{term}%")})
}

/// A column whose name or label contains the term (case-insensitive).
fn column_matching(columns: &[Value], term: &str) -> Option<String> {
    let term = term.to_lowercase();
    columns.iter().find_map(|column| {
        let name = column.get("name").and_then(Value::as_str)?;
        let label = column.get("label").and_then(Value::as_str).unwrap_or("");
        if name.to_lowercase().contains(&term) || label.to_lowercase().contains(&term) {
            Some(name.to_string())
        } else {
            None
        }
    })
}

fn first_text_column(columns: &[Value]) -> Option<String> {
    columns.iter().find_map(|column| {
        let kind = column
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        if kind.contains("char") || kind.contains("text") || kind.contains("string") {
            column
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
        } else {
            None
        }
    })
}
