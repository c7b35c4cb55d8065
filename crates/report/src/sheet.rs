use classify::ClassificationMap;
use extract::{FlattenedRow, column_count};
use regex::Regex;
use std::sync::OnceLock;

use crate::merge::{Cell, CellStyle, CellWrite, capped_width, column_width, plan_column};
use crate::resolve::{HighlightMap, resolve_document};

/// Sheet names longer than this are rejected by spreadsheet applications.
pub const MAX_SHEET_NAME_CHARS: usize = 31;
pub const VALUE_HEADER: &str = "Leaf Value";
pub const EMPTY_NOTICE: &str = "Empty Schema or No Data to Display.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Document,
    Error,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub header: String,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedWrite {
    pub column: usize,
    pub write: CellWrite,
}

/// Everything a sink needs to render one sheet. Data rows start below the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPlan {
    pub name: String,
    pub kind: SheetKind,
    pub columns: Vec<ColumnSpec>,
    pub writes: Vec<PlacedWrite>,
}

impl SheetPlan {
    /// Header plus one cell holding `message`.
    pub fn notice(name: String, kind: SheetKind, headers: Vec<String>, message: &str) -> Self {
        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(i, header)| {
                let width = if i == 0 {
                    column_width(&header, [message])
                } else {
                    column_width(&header, std::iter::empty())
                };
                ColumnSpec { header, width }
            })
            .collect();

        Self {
            name,
            kind,
            columns,
            writes: vec![PlacedWrite {
                column: 0,
                write: CellWrite::Single {
                    row: 0,
                    value: Some(message.to_string()),
                    style: CellStyle::Default,
                },
            }],
        }
    }

    /// Writes of one column, in row order.
    pub fn column_writes(&self, column: usize) -> impl Iterator<Item = &CellWrite> {
        self.writes
            .iter()
            .filter(move |w| w.column == column)
            .map(|w| &w.write)
    }
}

/// Sheet name from a document stem: forbidden characters replaced, truncated,
/// no apostrophe at either end.
pub fn sheet_name(stem: &str) -> String {
    static FORBIDDEN: OnceLock<Regex> = OnceLock::new();
    let forbidden =
        FORBIDDEN.get_or_init(|| Regex::new(r"[\[\]:*?/\\]").expect("sheet name pattern is valid"));

    let cleaned = forbidden.replace_all(stem.trim_matches('\''), "_");
    let truncated: String = cleaned.chars().take(MAX_SHEET_NAME_CHARS).collect();
    let name = truncated.trim_matches('\'');

    if name.trim().is_empty() {
        "Sheet".to_string()
    } else {
        name.to_string()
    }
}

pub fn level_headers(columns: usize) -> Vec<String> {
    let mut headers: Vec<String> = (1..columns).map(|i| format!("Level {}", i)).collect();
    headers.push(VALUE_HEADER.to_string());
    headers
}

/// The grid of one document: path segments, then the value, padded with blanks.
pub fn build_grid(rows: &[FlattenedRow], columns: usize, highlights: &HighlightMap) -> Vec<Vec<Cell>> {
    (0..columns)
        .map(|column| {
            rows.iter()
                .enumerate()
                .map(|(row_index, row)| {
                    let value = match column.cmp(&row.segments.len()) {
                        std::cmp::Ordering::Less => Some(row.segments[column].clone()),
                        std::cmp::Ordering::Equal => row.value.as_cell_text(),
                        std::cmp::Ordering::Greater => None,
                    };
                    let style = highlights
                        .get(&(row_index, column))
                        .map(|h| CellStyle::Highlight(*h))
                        .unwrap_or_default();
                    Cell::new(value, style)
                })
                .collect()
        })
        .collect()
}

/// Sheet of one parsed document, highlighted from `classifications`.
pub fn document_sheet(
    name: String,
    document: &str,
    rows: &[FlattenedRow],
    classifications: &ClassificationMap,
) -> SheetPlan {
    let columns = column_count(rows);
    let headers = level_headers(columns);

    if rows.is_empty() {
        return SheetPlan::notice(name, SheetKind::Document, headers, EMPTY_NOTICE);
    }

    let highlights = resolve_document(rows, document, classifications, columns);
    let grid = build_grid(rows, columns, &highlights);

    let mut specs = Vec::with_capacity(columns);
    let mut writes = Vec::new();
    for (column, (header, cells)) in headers.into_iter().zip(grid).enumerate() {
        let width = column_width(&header, cells.iter().filter_map(|c| c.value.as_deref()));
        specs.push(ColumnSpec { header, width });
        writes.extend(
            plan_column(&cells)
                .into_iter()
                .map(|write| PlacedWrite { column, write }),
        );
    }

    SheetPlan {
        name,
        kind: SheetKind::Document,
        columns: specs,
        writes,
    }
}

/// Notice sheet for a document that could not be read.
pub fn error_sheet(stem: &str, reason: &str) -> SheetPlan {
    let name = sheet_name(&format!("Error_{}", stem));
    let mut plan = SheetPlan::notice(name, SheetKind::Error, vec!["Error".to_string()], reason);
    plan.columns[0].width = capped_width("Error", [reason]);
    plan
}

/// A sheet of plain rows; every cell written on its own.
pub fn table_sheet(name: String, kind: SheetKind, headers: &[&str], rows: &[Vec<String>]) -> SheetPlan {
    let columns = headers
        .iter()
        .enumerate()
        .map(|(column, header)| ColumnSpec {
            header: header.to_string(),
            width: capped_width(
                header,
                rows.iter().filter_map(|r| r.get(column)).map(String::as_str),
            ),
        })
        .collect();

    let writes = rows
        .iter()
        .enumerate()
        .flat_map(|(row, values)| {
            values.iter().enumerate().map(move |(column, value)| PlacedWrite {
                column,
                write: CellWrite::Single {
                    row,
                    value: Some(value.clone()),
                    style: CellStyle::Default,
                },
            })
        })
        .collect();

    SheetPlan {
        name,
        kind,
        columns,
        writes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Highlight;
    use classify::{ClassificationResult, SensitivityLabel};
    use extract::{PathKey, flatten};
    use serde_json::json;

    #[test]
    fn test_sheet_name_rules() {
        assert_eq!(sheet_name("customer"), "customer");
        assert_eq!(sheet_name("a/b:c*d?[e]\\f"), "a_b_c_d__e__f");
        let long = "x".repeat(40);
        assert_eq!(sheet_name(&long).chars().count(), MAX_SHEET_NAME_CHARS);
        assert_eq!(sheet_name(""), "Sheet");
        assert_eq!(sheet_name("ééééééééééééééééééééééééééééééééé").chars().count(), 31);
        assert_eq!(sheet_name("'quoted'"), "quoted");
        assert_eq!(sheet_name("it's"), "it's");
        assert_eq!(sheet_name("'''"), "Sheet");
        // an apostrophe exposed by truncation is dropped too
        let edge = format!("{}'tail", "x".repeat(30));
        assert_eq!(sheet_name(&edge), "x".repeat(30));
    }

    #[test]
    fn test_level_headers() {
        assert_eq!(level_headers(3), vec!["Level 1", "Level 2", "Leaf Value"]);
        assert_eq!(level_headers(1), vec!["Leaf Value"]);
    }

    #[test]
    fn test_document_sheet_merges_and_highlights() {
        let value = json!({
            "user": {"email": "a@b.com", "name": "Ann"},
            "id": 7
        });
        let rows = flatten(&value);
        let mut map = ClassificationMap::new();
        map.insert(
            PathKey::new("doc", ["user", "email"]),
            ClassificationResult::new(SensitivityLabel::PersonalDataHighSensitivity, "email"),
        );

        let plan = document_sheet("doc".into(), "doc", &rows, &map);
        assert_eq!(plan.columns.len(), 3);
        assert_eq!(plan.columns[2].header, "Leaf Value");

        // "user" twice but styles differ (email row highlighted), so no merge
        let first: Vec<_> = plan.column_writes(0).collect();
        assert_eq!(first.len(), 3);
        assert!(matches!(
            first[0],
            CellWrite::Single { style: CellStyle::Highlight(Highlight::High), .. }
        ));

        // id row: value sits in column 1, column 2 is blank
        let third: Vec<_> = plan.column_writes(2).collect();
        assert!(matches!(third[2], CellWrite::Single { value: None, .. }));
    }

    #[test]
    fn test_document_sheet_merges_unhighlighted_runs() {
        let rows = flatten(&json!({"user": {"a": 1, "b": 2, "c": 3}}));
        let plan = document_sheet("doc".into(), "doc", &rows, &ClassificationMap::new());
        let first: Vec<_> = plan.column_writes(0).collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].span(), 3);
    }

    #[test]
    fn test_empty_document_notice() {
        let plan = document_sheet("doc".into(), "doc", &[], &ClassificationMap::new());
        assert_eq!(plan.columns.len(), 1);
        assert_eq!(plan.writes.len(), 1);
        assert!(matches!(
            &plan.writes[0].write,
            CellWrite::Single { value: Some(v), .. } if v == EMPTY_NOTICE
        ));
    }

    #[test]
    fn test_error_sheet() {
        let plan = error_sheet("a-very-long-document-name-for-errors", "Invalid JSON: eof");
        assert_eq!(plan.kind, SheetKind::Error);
        assert!(plan.name.starts_with("Error_a-very"));
        assert_eq!(plan.name.chars().count(), MAX_SHEET_NAME_CHARS);
        assert_eq!(plan.columns[0].header, "Error");
    }

    #[test]
    fn test_table_sheet() {
        let rows = vec![vec!["a".to_string(), "b".to_string()]];
        let plan = table_sheet("t".into(), SheetKind::Summary, &["One", "Two"], &rows);
        assert_eq!(plan.writes.len(), 2);
        assert_eq!(plan.columns[0].width, 8);
    }
}
