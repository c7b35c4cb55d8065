use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::document::SchemaDocument;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Descend into subdirectories of the input directory.
    pub recursive: bool,
}

pub struct DocumentReader {
    options: ReaderOptions,
}

impl DocumentReader {
    pub fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Read and parse one document. Failures are kept on the document.
    pub async fn read_file(&self, path: &Path, id: String) -> SchemaDocument {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(document = %id, error = %e, "Failed to read document");
                return SchemaDocument::failed(id, path, format!("Failed to read file: {}", e));
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(value) => SchemaDocument::parsed(id, path, value),
            Err(e) => {
                warn!(document = %id, error = %e, "Failed to parse document");
                SchemaDocument::failed(id, path, format!("Invalid JSON: {}", e))
            }
        }
    }

    /// Read every `.json` file in `dir`, sorted by id.
    ///
    /// Errors only when the directory itself cannot be listed.
    pub async fn read_directory(&self, dir: &Path) -> Result<Vec<SchemaDocument>> {
        let files = self.list_json_files(dir)?;

        let mut documents = Vec::with_capacity(files.len());
        for (id, path) in files {
            documents.push(self.read_file(&path, id).await);
        }

        let failed = documents.iter().filter(|d| d.error().is_some()).count();
        info!(
            dir = %dir.display(),
            documents = documents.len(),
            failed,
            "Read input documents"
        );

        Ok(documents)
    }

    fn list_json_files(&self, dir: &Path) -> Result<Vec<(String, PathBuf)>> {
        if !dir.is_dir() {
            anyhow::bail!("Input directory not found: {}", dir.display());
        }

        let max_depth = if self.options.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(true);

        for entry in walker {
            // only the input directory itself is fatal; broken entries below it are skipped
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e).with_context(|| format!("Failed to list {}", dir.display()));
                }
                Err(e) => {
                    let at = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    warn!(path = %at, error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();

            if !entry.file_type().is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let relative = path.strip_prefix(dir).unwrap_or(path);
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((id, path.to_path_buf()));
        }

        files.sort();
        Ok(files)
    }
}

impl Default for DocumentReader {
    fn default() -> Self {
        Self::new(ReaderOptions::default())
    }
}
