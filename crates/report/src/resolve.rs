use classify::{ClassificationMap, ClassificationResult, Severity};
use extract::{FlattenedRow, PathKey};
use std::collections::{BTreeMap, BTreeSet};

/// Fill color of a highlighted cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Highlight {
    High,
    Medium,
}

impl Highlight {
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::High => Highlight::High,
            Severity::Medium => Highlight::Medium,
        }
    }

    /// Fill color as `0xRRGGBB`.
    pub fn rgb(&self) -> u32 {
        match self {
            Highlight::High => 0xFFC7CE,   // light red
            Highlight::Medium => 0xFFEB9C, // light yellow
        }
    }

    pub fn hex(&self) -> String {
        format!("#{:06X}", self.rgb())
    }
}

/// Highlighted cells of a sheet, keyed by (row, column).
pub type HighlightMap = BTreeMap<(usize, usize), Highlight>;

/// Most specific classified prefix of `segments`, with its length.
pub fn longest_classified_prefix<'a>(
    segments: &[String],
    document: &str,
    classifications: &'a ClassificationMap,
) -> Option<(PathKey, &'a ClassificationResult)> {
    (1..=segments.len()).rev().find_map(|i| {
        let candidate = PathKey::new(document, segments[..i].iter().cloned());
        // empty segments are dropped, so a shorter key would stand in for this prefix
        if candidate.len() != i {
            return None;
        }
        classifications.get(&candidate).map(|result| (candidate, result))
    })
}

/// Cells of one row to highlight.
///
/// The row's path columns are marked up to the matched prefix, each only if it
/// equals the matched key's segment. The value column is marked only when the
/// whole path was classified, and dropped when it falls outside `max_columns`.
pub fn resolve(
    row: &FlattenedRow,
    document: &str,
    classifications: &ClassificationMap,
    max_columns: usize,
) -> BTreeSet<(usize, Highlight)> {
    let mut marks = BTreeSet::new();

    let Some((matched, result)) = longest_classified_prefix(&row.segments, document, classifications)
    else {
        return marks;
    };

    let Some(color) = result.label.severity().map(Highlight::from_severity) else {
        return marks;
    };

    for (column, segment) in matched.segments().iter().enumerate() {
        if column >= max_columns {
            break;
        }
        if row.segments.get(column) == Some(segment) {
            marks.insert((column, color));
        }
    }

    let value_column = row.segments.len();
    if matched.len() == value_column && value_column < max_columns {
        marks.insert((value_column, color));
    }

    marks
}

pub fn resolve_document(
    rows: &[FlattenedRow],
    document: &str,
    classifications: &ClassificationMap,
    max_columns: usize,
) -> HighlightMap {
    let mut highlights = HighlightMap::new();
    for (row_index, row) in rows.iter().enumerate() {
        for (column, color) in resolve(row, document, classifications, max_columns) {
            highlights.insert((row_index, column), color);
        }
    }
    highlights
}

/// Lookup for instance-shaped rows: every classified key plus its instance view.
///
/// Schema-shaped keys win over views; between two views the more severe label wins.
pub fn with_instance_views(classifications: &ClassificationMap) -> ClassificationMap {
    let mut lookup = ClassificationMap::new();

    for (key, result) in classifications {
        let Some(view) = key.instance_view() else {
            continue;
        };
        let replace = match lookup.get(&view) {
            Some(existing) => result.label.severity() > existing.label.severity(),
            None => true,
        };
        if replace {
            lookup.insert(view, result.clone());
        }
    }

    for (key, result) in classifications {
        lookup.insert(key.clone(), result.clone());
    }

    lookup
}
