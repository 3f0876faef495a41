// crates/lodestone-core/src/interop.rs
// Tolerant JSON boundaries for delegated-agent and remote-tool calls

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::host::SearchContext;

/// Normalize a loosely shaped boundary payload.
///
/// Agent and tool responses may arrive as a map, a JSON-encoded string, or
/// wrapped in `{data: ...}`. Recursively unwraps until the value stops
/// changing shape. A string that does not parse as JSON is returned as-is.
pub fn normalize_payload(value: Value) -> Value {
    let mut current = value;
    loop {
        match current {
            Value::String(s) => match serde_json::from_str::<Value>(&s) {
                Ok(parsed) if !parsed.is_string() => current = parsed,
                _ => return Value::String(s),
            },
            Value::Object(mut map) if map.contains_key("data") => {
                // Tolerate a {data: ...} envelope around the real payload
                current = map.remove("data").unwrap_or(Value::Null);
            }
            other => return other,
        }
    }
}

/// Normalize and coerce to a JSON object, if possible.
pub fn payload_as_object(value: Value) -> Option<Map<String, Value>> {
    match normalize_payload(value) {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Call a delegated agent with a single user message carrying the marshalled
/// request, suppressing history persistence and user-visible output, and
/// return the normalized `next` payload.
pub async fn call_agent(ctx: &SearchContext, agent_id: &str, payload: Value) -> Result<Value> {
    let runtime = ctx
        .agents
        .as_ref()
        .ok_or_else(|| anyhow!("agent runtime not available in context"))?;
    let agent = runtime
        .get_agent(agent_id)
        .await
        .map_err(|e| anyhow!("agent '{}' not found: {}", agent_id, e))?;

    let request_id = Uuid::new_v4().to_string();
    debug!(request_id = %request_id, agent = %agent_id, "Delegating to agent");

    let message = json!({
        "role": "user",
        "content": payload.to_string(),
    });
    let options = json!({
        "skip": { "history": true, "output": true },
    });

    let reply = agent
        .stream(&ctx.cancel, vec![message], options)
        .await
        .map_err(|e| anyhow!("agent call failed: {}", e))?;

    Ok(normalize_payload(reply.next))
}

/// Call a remote tool and return its text content parsed as JSON.
pub async fn call_tool(
    ctx: &SearchContext,
    server: &str,
    tool: &str,
    args: Value,
) -> Result<Value> {
    let transport = ctx
        .tools
        .as_ref()
        .ok_or_else(|| anyhow!("tool transport not available in context"))?;
    let client = transport
        .select_tool(server)
        .map_err(|e| anyhow!("tool server '{}' not found: {}", server, e))?;

    debug!(server = %server, tool = %tool, "Calling remote tool");

    let response = client
        .call_tool(&ctx.cancel, tool, args)
        .await
        .map_err(|e| anyhow!("tool call failed: {}", e))?;

    let text = response
        .first_text()
        .map(str::to_string)
        .unwrap_or_default();

    if response.is_error {
        bail!("tool '{}' returned an error: {}", tool, text);
    }
    if text.is_empty() {
        bail!("tool '{}' returned no text content", tool);
    }

    Ok(normalize_payload(Value::String(text)))
}
