// crates/lodestone-core/src/db/dsl.rs
// QueryDSL document and preset-condition merging

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use lodestone_types::SearchRequest;

/// The engine-facing query document produced by the synthesis step.
///
/// Only the clauses the pipeline manipulates are typed; everything else the
/// generator emits (joins, groups, havings) flattens into `extra` and rides
/// through to the engine untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDsl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<Value>>,
    /// Either a bare table name or an object carrying `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wheres: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orders: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryDsl {
    /// The table this query selects from, tolerating both the string and
    /// `{name: ...}` forms.
    pub fn from_name(&self) -> Option<&str> {
        match self.from.as_ref()? {
            Value::String(name) => Some(name.as_str()),
            Value::Object(map) => map.get("name").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Merge request presets into the generated DSL. Preset conditions take
    /// precedence by position: request `wheres`/`orders` are prepended, a
    /// preset `select` replaces an absent one or is prepended to an existing
    /// one, and the request limit fills in only when the DSL has none.
    pub fn merge_presets(&mut self, req: &SearchRequest) {
        if !req.wheres.is_empty() {
            let mut wheres = req.wheres.clone();
            wheres.append(&mut self.wheres);
            self.wheres = wheres;
        }
        if !req.orders.is_empty() {
            let mut orders = req.orders.clone();
            orders.append(&mut self.orders);
            self.orders = orders;
        }
        if !req.select.is_empty() {
            match self.select.take() {
                None => self.select = Some(req.select.clone()),
                Some(mut generated) => {
                    let mut select = req.select.clone();
                    select.append(&mut generated);
                    self.select = Some(select);
                }
            }
        }
        if self.limit.is_none() {
            self.limit = req.limit.map(|l| l as i64);
        }
    }

    /// Clamp the limit to an upper bound, when one is configured.
    pub fn clamp_limit(&mut self, max_limit: Option<i64>) {
        if let (Some(limit), Some(max)) = (self.limit, max_limit) {
            if limit > max {
                self.limit = Some(max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn where_clause(column: &str) -> Value {
        json!({"column": column, "op": "like", "value": "%x%"})
    }

    // ============================================================================
    // from_name tests
    // ============================================================================

    #[test]
    fn test_from_name_string() {
        let dsl: QueryDsl = serde_json::from_value(json!({"from": "orders"})).unwrap();
        assert_eq!(dsl.from_name(), Some("orders"));
    }

    #[test]
    fn test_from_name_object() {
        let dsl: QueryDsl = serde_json::from_value(json!({"from": {"name": "orders"}})).unwrap();
        assert_eq!(dsl.from_name(), Some("orders"));
    }

    #[test]
    fn test_from_name_missing() {
        assert_eq!(QueryDsl::default().from_name(), None);
    }

    // ============================================================================
    // Preset merging
    // ============================================================================

    #[test]
    fn test_preset_wheres_prepended() {
        let mut dsl = QueryDsl {
            wheres: vec![where_clause("generated")],
            ..Default::default()
        };
        let mut req = lodestone_types::SearchRequest::db("q");
        req.wheres = vec![where_clause("preset")];
        dsl.merge_presets(&req);

        assert_eq!(dsl.wheres.len(), 2);
        assert_eq!(dsl.wheres[0]["column"], "preset");
        assert_eq!(dsl.wheres[1]["column"], "generated");
    }

    #[test]
    fn test_preset_orders_prepended() {
        let mut dsl = QueryDsl {
            orders: vec![json!({"column": "created_at", "option": "desc"})],
            ..Default::default()
        };
        let mut req = lodestone_types::SearchRequest::db("q");
        req.orders = vec![json!({"column": "priority", "option": "desc"})];
        dsl.merge_presets(&req);

        assert_eq!(dsl.orders[0]["column"], "priority");
        assert_eq!(dsl.orders[1]["column"], "created_at");
    }

    #[test]
    fn test_preset_select_fills_absent() {
        let mut dsl = QueryDsl::default();
        let mut req = lodestone_types::SearchRequest::db("q");
        req.select = vec![json!("id"), json!("title")];
        dsl.merge_presets(&req);
        assert_eq!(dsl.select, Some(vec![json!("id"), json!("title")]));
    }

    #[test]
    fn test_preset_select_prepends_to_existing() {
        let mut dsl = QueryDsl {
            select: Some(vec![json!("status")]),
            ..Default::default()
        };
        let mut req = lodestone_types::SearchRequest::db("q");
        req.select = vec![json!("id")];
        dsl.merge_presets(&req);
        assert_eq!(dsl.select, Some(vec![json!("id"), json!("status")]));
    }

    #[test]
    fn test_limit_copied_only_when_absent() {
        let mut dsl = QueryDsl {
            limit: Some(5),
            ..Default::default()
        };
        let req = lodestone_types::SearchRequest::db("q").with_limit(20);
        dsl.merge_presets(&req);
        assert_eq!(dsl.limit, Some(5));

        let mut dsl = QueryDsl::default();
        dsl.merge_presets(&req);
        assert_eq!(dsl.limit, Some(20));
    }

    #[test]
    fn test_clamp_limit() {
        let mut dsl = QueryDsl {
            limit: Some(500),
            ..Default::default()
        };
        dsl.clamp_limit(Some(100));
        assert_eq!(dsl.limit, Some(100));

        dsl.clamp_limit(None);
        assert_eq!(dsl.limit, Some(100));
    }

    // ============================================================================
    // Serialization
    // ============================================================================

    #[test]
    fn test_extra_clauses_flatten_through() {
        let raw = json!({
            "from": "orders",
            "wheres": [where_clause("status")],
            "groups": ["customer_id"],
            "havings": [{"column": "total", "op": ">", "value": 100}],
        });
        let dsl: QueryDsl = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(dsl.extra.get("groups"), Some(&json!(["customer_id"])));

        let back = serde_json::to_value(&dsl).unwrap();
        assert_eq!(back["groups"], raw["groups"]);
        assert_eq!(back["havings"], raw["havings"]);
    }

    #[test]
    fn test_empty_clauses_omitted_from_wire() {
        let dsl = QueryDsl {
            from: Some(json!("orders")),
            ..Default::default()
        };
        let value = serde_json::to_value(&dsl).unwrap();
        assert!(value.get("wheres").is_none());
        assert!(value.get("select").is_none());
        assert!(value.get("limit").is_none());
    }
}
