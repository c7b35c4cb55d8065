use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::path::PathKey;
use crate::schema::Descriptor;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Also record properties without a description, with an empty text.
    pub include_undescribed: bool,
}

/// Walks a schema and collects described properties keyed by their path.
///
/// Only `properties`, `allOf` and `items` are followed. `allOf` members are
/// merged into the current level; `items` adds an `"items"` segment. A later
/// property with the same path replaces an earlier one.
pub struct DescriptorExtractor {
    options: ExtractOptions,
}

impl DescriptorExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn extract(&self, schema: &Value, document: &str) -> BTreeMap<PathKey, String> {
        let mut out = BTreeMap::new();
        self.visit(schema, PathKey::root(document), &mut out);
        out
    }

    pub fn extract_descriptors(&self, schema: &Value, document: &str) -> Vec<Descriptor> {
        self.extract(schema, document)
            .into_iter()
            .map(|(key, description)| Descriptor { key, description })
            .collect()
    }

    fn visit(&self, node: &Value, path: PathKey, out: &mut BTreeMap<PathKey, String>) {
        let Value::Object(node) = node else {
            return;
        };

        if let Some(Value::Object(properties)) = node.get("properties") {
            let base = path.child("properties");
            for (name, property) in properties {
                if name.is_empty() {
                    continue;
                }
                let key = base.child(name);
                self.record(&key, property, out);
                self.visit(property, key, out);
            }
        }

        if let Some(Value::Array(members)) = node.get("allOf") {
            for member in members {
                self.visit(member, path.clone(), out);
            }
        }

        if let Some(items) = node.get("items").filter(|v| v.is_object()) {
            self.visit(items, path.child("items"), out);
        }
    }

    fn record(&self, key: &PathKey, property: &Value, out: &mut BTreeMap<PathKey, String>) {
        let description = property
            .as_object()
            .and_then(description_of)
            .unwrap_or_default();

        if description.is_empty() && !self.options.include_undescribed {
            return;
        }

        if key.is_ambiguous() {
            warn!(key = %key, "Property path contains a separator and will not round-trip");
        }

        out.insert(key.clone(), description.to_string());
    }
}

impl Default for DescriptorExtractor {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

fn description_of(schema: &Map<String, Value>) -> Option<&str> {
    schema.get("description").and_then(Value::as_str)
}
