pub mod label;
pub mod prompt;
pub mod retry;
pub mod client;
pub mod cache;
pub mod runner;

pub use label::{ClassificationResult, ErrorKind, SensitivityLabel, Severity};
pub use retry::RetryPolicy;
pub use client::{ClassifyError, OllamaClassifier, OllamaSettings};
pub use cache::{CacheStore, ClassificationCache, ClassificationMap, JsonFileStore, MemoryStore};
pub use runner::{ClassificationRunner, RunSummary, RunnerSettings};

use async_trait::async_trait;
use extract::PathKey;
use sha2::{Digest, Sha256};
use std::path::Path;

/// What the classification service is told about one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    /// Document name without extension.
    pub document_context: String,
    pub full_path: String,
    pub leaf_name: String,
    pub description: String,
}

impl ClassificationRequest {
    pub fn from_descriptor(key: &PathKey, description: &str) -> Self {
        let document_context = Path::new(key.document())
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| key.document().to_string());

        Self {
            document_context,
            full_path: key.dotted_path(),
            leaf_name: key.leaf().unwrap_or_default().to_string(),
            description: description.to_string(),
        }
    }

    pub fn description_or_placeholder(&self) -> &str {
        if self.description.trim().is_empty() {
            "N/A"
        } else {
            &self.description
        }
    }
}

/// A sensitivity classifier. Failures come back as error-labeled results.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult;
}

/// Stable fingerprint of a description (first 16 bytes of its SHA-256).
pub fn description_digest(description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_descriptor() {
        let key = PathKey::new("models/customer.json", ["properties", "address", "properties", "zip"]);
        let request = ClassificationRequest::from_descriptor(&key, "postal code");
        assert_eq!(request.document_context, "customer");
        assert_eq!(request.full_path, "properties.address.properties.zip");
        assert_eq!(request.leaf_name, "zip");
        assert_eq!(request.description_or_placeholder(), "postal code");
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(description_digest("a"), description_digest("a"));
        assert_ne!(description_digest("a"), description_digest("b"));
        assert_eq!(description_digest("a").len(), 32);
    }
}
