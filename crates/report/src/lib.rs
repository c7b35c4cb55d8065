pub mod resolve;
pub mod merge;
pub mod sheet;
pub mod summary;
pub mod sink;

pub use merge::{Cell, CellStyle, CellWrite, column_width, plan_column};
pub use resolve::{Highlight, HighlightMap, longest_classified_prefix, resolve, resolve_document, with_instance_views};
pub use sheet::{ColumnSpec, PlacedWrite, SheetKind, SheetPlan, document_sheet, error_sheet, sheet_name};
pub use summary::{SummaryRow, summary_rows, summary_sheet};
pub use sink::{MemorySink, SheetSink, XlsxSink};

use anyhow::Result;
use classify::ClassificationMap;
use extract::{FlattenedRow, PathKey, flatten};
use ingest::{DocumentBody, SchemaDocument};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Rows of a document ready for rendering, or why it has none.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentRows {
    Rows(Vec<FlattenedRow>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDocument {
    pub id: String,
    pub stem: String,
    pub rows: DocumentRows,
    /// Rows of a schema match classified keys directly; instance rows go
    /// through the instance views.
    pub schema_shaped: bool,
}

impl PreparedDocument {
    pub fn from_document(document: &SchemaDocument) -> Self {
        let rows = match &document.body {
            DocumentBody::Parsed(value) => DocumentRows::Rows(flatten(value)),
            DocumentBody::Failed(reason) => DocumentRows::Failed(reason.clone()),
        };
        Self {
            id: document.id.clone(),
            stem: document.stem(),
            rows,
            schema_shaped: document.value().is_some_and(is_schema_shaped),
        }
    }

    pub fn row_count(&self) -> usize {
        match &self.rows {
            DocumentRows::Rows(rows) => rows.len(),
            DocumentRows::Failed(_) => 0,
        }
    }
}

/// A document whose root carries `properties`, `allOf` or `items`.
pub fn is_schema_shaped(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|root| ["properties", "allOf", "items"].iter().any(|k| root.contains_key(*k)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub document_sheets: usize,
    pub error_sheets: usize,
    pub empty_sheets: usize,
    pub skipped_sheets: usize,
    pub summary_rows: usize,
}

/// Render every document, then the summary, and finish the sink.
pub fn generate_report<S: SheetSink + ?Sized>(
    documents: &[PreparedDocument],
    descriptors: &BTreeMap<PathKey, String>,
    classifications: &ClassificationMap,
    sink: &mut S,
) -> Result<ReportStats> {
    let mut stats = ReportStats::default();
    let lookup = with_instance_views(classifications);

    for document in documents {
        let plan = match &document.rows {
            DocumentRows::Failed(reason) => {
                stats.error_sheets += 1;
                error_sheet(&document.stem, reason)
            }
            DocumentRows::Rows(rows) => {
                if rows.is_empty() {
                    stats.empty_sheets += 1;
                }
                stats.document_sheets += 1;
                let matching = if document.schema_shaped {
                    classifications
                } else {
                    &lookup
                };
                document_sheet(sheet_name(&document.stem), &document.id, rows, matching)
            }
        };

        if !sink.write_sheet(&plan)? {
            stats.skipped_sheets += 1;
        }
    }

    let ids: BTreeSet<String> = documents.iter().map(|d| d.id.clone()).collect();
    let rows = summary_rows(&ids, descriptors, classifications);
    stats.summary_rows = rows.len();
    if !sink.write_sheet(&summary_sheet(rows))? {
        warn!("Summary sheet name collided with a document sheet");
        stats.skipped_sheets += 1;
    }

    sink.finish()?;

    info!(
        documents = stats.document_sheets,
        errors = stats.error_sheets,
        summary_rows = stats.summary_rows,
        "Report generated"
    );

    Ok(stats)
}
