pub mod document;
pub mod reader;

pub use document::{DocumentBody, SchemaDocument, document_stem};
pub use reader::{DocumentReader, ReaderOptions};

use anyhow::Result;
use std::path::Path;

/// Ingest every `.json` document under `dir`.
///
/// Fails when the directory is missing or holds no `.json` file; individual
/// unreadable documents are returned as failed documents instead.
pub async fn ingest_directory(dir: &Path, options: ReaderOptions) -> Result<Vec<SchemaDocument>> {
    let documents = DocumentReader::new(options).read_directory(dir).await?;

    if documents.is_empty() {
        anyhow::bail!("No .json files found in {}", dir.display());
    }

    Ok(documents)
}
