use serde_json::Value;

use crate::schema::{FlattenedRow, Scalar};

/// Flattens a value into rows of (keys, terminal value), depth first.
///
/// Object keys extend the path in the order they were parsed. Array elements
/// do not: every element lands on its parent's path. Empty containers yield
/// nothing.
pub fn flatten(value: &Value) -> Vec<FlattenedRow> {
    let mut rows = Vec::new();
    visit(value, Vec::new(), &mut rows);
    rows
}

fn visit(value: &Value, path: Vec<String>, rows: &mut Vec<FlattenedRow>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let mut next = path.clone();
                next.push(key.clone());
                visit(child, next, rows);
            }
        }
        Value::Array(elements) => {
            for element in elements {
                visit(element, path.clone(), rows);
            }
        }
        scalar => {
            if let Some(value) = Scalar::from_value(scalar) {
                rows.push(FlattenedRow {
                    segments: path,
                    value,
                });
            }
        }
    }
}

/// Grid width for a set of rows: one column per key level plus the value.
pub fn column_count(rows: &[FlattenedRow]) -> usize {
    1 + rows.iter().map(FlattenedRow::depth).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(rows: &[FlattenedRow]) -> Vec<String> {
        rows.iter().map(|r| r.segments.join(".")).collect()
    }

    #[test]
    fn test_nested_object() {
        let rows = flatten(&json!({"user": {"email": "a@b.com"}}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].segments, vec!["user", "email"]);
        assert_eq!(rows[0].value, Scalar::String("a@b.com".to_string()));
    }

    #[test]
    fn test_empty_containers_yield_nothing() {
        assert!(flatten(&json!({"tags": []})).is_empty());
        assert!(flatten(&json!({"meta": {}})).is_empty());
        assert!(flatten(&json!({})).is_empty());

        let rows = flatten(&json!({"tags": [], "name": "x"}));
        assert_eq!(paths(&rows), vec!["name"]);
    }

    #[test]
    fn test_array_index_not_in_path() {
        let rows = flatten(&json!({"items": [{"id": 1}, {"id": 2}]}));
        assert_eq!(paths(&rows), vec!["items.id", "items.id"]);
        assert_eq!(rows[0].value.to_string(), "1");
        assert_eq!(rows[1].value.to_string(), "2");
    }

    #[test]
    fn test_preserves_key_order() {
        let value: Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": {"b": true, "a": null}, "mid": "m"}"#)
                .unwrap();
        let rows = flatten(&value);
        assert_eq!(paths(&rows), vec!["zeta", "alpha.b", "alpha.a", "mid"]);
        assert!(rows[2].value.is_null());
    }

    #[test]
    fn test_rows_are_terminal() {
        let value = json!({
            "type": "object",
            "properties": {"a": {"type": ["string", "null"], "enum": [1, [2, {"x": 3}]]}},
            "required": ["a"]
        });
        for row in flatten(&value) {
            assert!(!matches!(
                serde_json::to_value(&row.value).unwrap(),
                Value::Array(_) | Value::Object(_)
            ));
        }
    }

    #[test]
    fn test_scalar_root() {
        let rows = flatten(&json!(42));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].segments.is_empty());
        assert_eq!(column_count(&rows), 1);
    }

    #[test]
    fn test_column_count() {
        let rows = flatten(&json!({"a": {"b": {"c": 1}}, "d": 2}));
        assert_eq!(column_count(&rows), 4);
        assert_eq!(column_count(&[]), 1);
    }
}
