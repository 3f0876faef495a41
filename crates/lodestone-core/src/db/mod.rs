// crates/lodestone-core/src/db/mod.rs
// Database handler: schema introspection, DSL synthesis, execution, shaping

mod dsl;
mod generator;

pub use dsl::QueryDsl;
pub use generator::{DslGenerator, GenerateParams};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::host::{
    DEFAULT_QUERY_ENGINE, ModelInfo, ModelRegistry, QueryEngineRegistry, SearchContext,
};
use crate::registry::SearchHandler;
use crate::utils::truncate_bytes;
use lodestone_types::{ResultItem, SearchRequest, SearchResult, SearchType};

/// Row JSON is clamped to this many bytes when no content-like column exists.
const ROW_CONTENT_MAX_BYTES: usize = 500;

/// Columns probed, in order, for an item title.
const TITLE_COLUMNS: &[&str] = &["title", "name", "subject", "label"];
/// Columns probed, in order, for item content.
const CONTENT_COLUMNS: &[&str] = &["content", "description", "summary", "text", "body"];

/// Structured-database handler.
///
/// Runs the full pipeline: validate, introspect model schemas, synthesize a
/// QueryDSL from the natural-language query, merge request presets, execute
/// against the default query engine, and shape rows into result items.
pub struct DbHandler {
    engines: Arc<dyn QueryEngineRegistry>,
    models: Arc<dyn ModelRegistry>,
    config: Arc<SearchConfig>,
    generator: DslGenerator,
}

impl DbHandler {
    pub fn new(
        engines: Arc<dyn QueryEngineRegistry>,
        models: Arc<dyn ModelRegistry>,
        config: Arc<SearchConfig>,
    ) -> Self {
        let generator = DslGenerator::new(&config.uses.query_dsl);
        Self {
            engines,
            models,
            config,
            generator,
        }
    }

    fn resolve_models(&self, ids: &[String]) -> Vec<ModelInfo> {
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            match self.models.get(id) {
                Some(model) => resolved.push(model),
                None => debug!(model = %id, "Skipping unresolvable model"),
            }
        }
        resolved
    }

    async fn execute(
        &self,
        ctx: &SearchContext,
        dsl: &QueryDsl,
    ) -> Result<Vec<Map<String, Value>>, String> {
        let raw = serde_json::to_string(dsl).map_err(|e| format!("query marshal failed: {e}"))?;
        let engine = self
            .engines
            .select(DEFAULT_QUERY_ENGINE)
            .map_err(|e| format!("query engine unavailable: {e}"))?;
        let query = engine
            .load(&raw)
            .await
            .map_err(|e| format!("query execution failed: {e}"))?;
        query
            .get(&ctx.cancel)
            .await
            .map_err(|e| format!("query execution failed: {e}"))
    }
}

#[async_trait]
impl SearchHandler for DbHandler {
    fn kind(&self) -> SearchType {
        SearchType::Db
    }

    async fn search(&self, ctx: &SearchContext, req: &SearchRequest) -> SearchResult {
        let fail = |message: String| {
            SearchResult::failure(SearchType::Db, &req.query, req.source, message)
        };

        // 1. Validation
        if req.query.trim().is_empty() {
            return fail("query is required".into());
        }
        let model_ids = if req.models.is_empty() {
            self.config.db.models.clone()
        } else {
            req.models.clone()
        };
        if model_ids.is_empty() {
            return fail("no models specified".into());
        }
        if self.generator.missing_context(ctx) {
            return fail("context is required for DB search".into());
        }

        // 2. Schema introspection
        let models = self.resolve_models(&model_ids);
        if models.is_empty() {
            return fail("no valid models found".into());
        }
        let schema = schema_value(&models);

        // 3. DSL synthesis
        let scenario = req.scenario.or(self.config.db.scenario);
        let limit = req.limit.or(self.config.db.limit);
        let params = GenerateParams {
            query: &req.query,
            model_ids: &model_ids,
            scenario,
            limit,
            schema,
        };
        let mut dsl = match self.generator.generate(ctx, &params).await {
            Ok(Some(dsl)) => dsl,
            Ok(None) => return fail("no QueryDSL generated".into()),
            Err(e) => return fail(format!("QueryDSL generation failed: {e}")),
        };

        // 4. Preset merge
        dsl.merge_presets(req);
        dsl.clamp_limit(self.config.query_dsl.max_limit);

        // 5. Execute
        let rows = match self.execute(ctx, &dsl).await {
            Ok(rows) => rows,
            Err(message) => {
                warn!(error = %message, "DB query failed");
                let mut result = fail(message);
                result.dsl = serde_json::to_value(&dsl).ok();
                return result;
            }
        };

        // 6. Result shaping
        let model = primary_model(&dsl, &models);
        let effective_limit = limit.or(dsl.limit.map(|l| l.max(0) as usize));
        let mut items: Vec<ResultItem> = rows
            .into_iter()
            .map(|row| shape_row(row, model))
            .collect();
        if let Some(limit) = effective_limit {
            items.truncate(limit);
        }

        let mut result = SearchResult::empty(SearchType::Db, &req.query, req.source);
        result.items = items;
        result.dsl = serde_json::to_value(&dsl).ok();
        result.finish();
        result
    }
}

/// Simplified schema handed to the synthesizer: one object per model, a
/// single object when exactly one model is searched.
fn schema_value(models: &[ModelInfo]) -> Value {
    let schemas: Vec<Value> = models
        .iter()
        .map(|model| {
            json!({
                "name": model.id,
                "columns": model
                    .columns
                    .iter()
                    .map(|column| {
                        let mut entry = json!({
                            "name": column.name,
                            "type": column.column_type,
                        });
                        if let Some(label) = &column.label {
                            entry["label"] = json!(label);
                        }
                        if let Some(description) = &column.description {
                            entry["description"] = json!(description);
                        }
                        entry
                    })
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    if schemas.len() == 1 {
        schemas.into_iter().next().unwrap_or(Value::Null)
    } else {
        Value::Array(schemas)
    }
}

/// The model whose table the DSL selects from; first requested model when
/// nothing matches.
fn primary_model<'a>(dsl: &QueryDsl, models: &'a [ModelInfo]) -> &'a ModelInfo {
    dsl.from_name()
        .and_then(|table| {
            models
                .iter()
                .find(|model| model.table_name == table || model.id == table)
        })
        .unwrap_or(&models[0])
}

fn shape_row(row: Map<String, Value>, model: &ModelInfo) -> ResultItem {
    let title = first_string(&row, TITLE_COLUMNS);
    let content = match first_string(&row, CONTENT_COLUMNS) {
        Some(content) => content,
        None => truncate_bytes(
            &serde_json::to_string(&row).unwrap_or_default(),
            ROW_CONTENT_MAX_BYTES,
        ),
    };
    let key = model.primary_key.as_deref().unwrap_or("id");
    let record_id = row.get(key).and_then(value_to_string);

    ResultItem {
        kind: Some(SearchType::Db),
        title,
        content,
        model: Some(model.id.clone()),
        record_id,
        data: Some(Value::Object(row)),
        ..Default::default()
    }
}

fn first_string(row: &Map<String, Value>, columns: &[&str]) -> Option<String> {
    columns.iter().find_map(|column| {
        row.get(*column)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
