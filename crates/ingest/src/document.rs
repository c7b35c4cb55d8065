use serde_json::Value;
use std::path::{Path, PathBuf};

/// Parsed body of a document, or the reason it could not be read.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    Parsed(Value),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    /// File name relative to the input directory, `/`-separated.
    pub id: String,
    pub path: PathBuf,
    pub body: DocumentBody,
}

impl SchemaDocument {
    pub fn parsed(id: impl Into<String>, path: impl Into<PathBuf>, value: Value) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            body: DocumentBody::Parsed(value),
        }
    }

    pub fn failed(id: impl Into<String>, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            body: DocumentBody::Failed(reason.into()),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            DocumentBody::Parsed(value) => Some(value),
            DocumentBody::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.body {
            DocumentBody::Parsed(_) => None,
            DocumentBody::Failed(reason) => Some(reason),
        }
    }

    /// Base name without the extension, used for sheet names and prompts.
    pub fn stem(&self) -> String {
        document_stem(&self.id)
    }
}

pub fn document_stem(id: &str) -> String {
    let file_name = id.rsplit('/').next().unwrap_or(id);
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string())
}
