use classify::ClassificationMap;
use extract::PathKey;
use std::collections::{BTreeMap, BTreeSet};

use crate::sheet::{SheetKind, SheetPlan, table_sheet};

pub const SUMMARY_SHEET_NAME: &str = "PII Analysis Summary";
pub const SUMMARY_HEADERS: [&str; 5] = [
    "Source File",
    "Schema Key Path",
    "Original Description",
    "PII Classification",
    "Justification",
];
pub const NOTHING_TO_REPORT: &str = "No personal data classifications to report.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub source_file: String,
    pub key_path: String,
    pub description: String,
    pub label: String,
    pub justification: String,
}

impl SummaryRow {
    fn into_cells(self) -> Vec<String> {
        vec![
            self.source_file,
            self.key_path,
            self.description,
            self.label,
            self.justification,
        ]
    }
}

/// Reportable classifications of `documents`, ordered by key.
pub fn summary_rows(
    documents: &BTreeSet<String>,
    descriptors: &BTreeMap<PathKey, String>,
    classifications: &ClassificationMap,
) -> Vec<SummaryRow> {
    classifications
        .iter()
        .filter(|(key, _)| documents.contains(key.document()))
        .filter(|(_, result)| result.label.is_reportable())
        .map(|(key, result)| SummaryRow {
            source_file: key.document().to_string(),
            key_path: key.dotted_path(),
            description: descriptors.get(key).cloned().unwrap_or_default(),
            label: result.label.to_string(),
            justification: result.justification.clone(),
        })
        .collect()
}

pub fn summary_sheet(rows: Vec<SummaryRow>) -> SheetPlan {
    if rows.is_empty() {
        return SheetPlan::notice(
            SUMMARY_SHEET_NAME.to_string(),
            SheetKind::Summary,
            SUMMARY_HEADERS.iter().map(|h| h.to_string()).collect(),
            NOTHING_TO_REPORT,
        );
    }

    let cells: Vec<Vec<String>> = rows.into_iter().map(SummaryRow::into_cells).collect();
    table_sheet(
        SUMMARY_SHEET_NAME.to_string(),
        SheetKind::Summary,
        &SUMMARY_HEADERS,
        &cells,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify::{ClassificationResult, ErrorKind, SensitivityLabel};

    fn fixture() -> (BTreeMap<PathKey, String>, ClassificationMap) {
        let email = PathKey::new("user.json", ["properties", "email"]);
        let flag = PathKey::new("user.json", ["properties", "flag"]);
        let broken = PathKey::new("user.json", ["properties", "broken"]);
        let stale = PathKey::new("gone.json", ["properties", "ssn"]);

        let descriptors = BTreeMap::from([
            (email.clone(), "Email address".to_string()),
            (flag.clone(), "Feature flag".to_string()),
            (broken.clone(), "Something".to_string()),
        ]);

        let classifications = ClassificationMap::from([
            (
                email,
                ClassificationResult::new(SensitivityLabel::PersonalDataHighSensitivity, "contact"),
            ),
            (
                flag,
                ClassificationResult::new(SensitivityLabel::NotPersonalData, "config"),
            ),
            (broken, ClassificationResult::error(ErrorKind::Http, "500")),
            (
                stale,
                ClassificationResult::new(SensitivityLabel::PersonalDataHighSensitivity, "id"),
            ),
        ]);

        (descriptors, classifications)
    }

    #[test]
    fn test_only_reportable_rows_of_run_documents() {
        let (descriptors, classifications) = fixture();
        let documents = BTreeSet::from(["user.json".to_string()]);

        let rows = summary_rows(&documents, &descriptors, &classifications);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key_path, "properties.email");
        assert_eq!(rows[0].description, "Email address");
        assert_eq!(rows[0].label, "PERSONAL_DATA_HIGH_SENSITIVITY");
    }

    #[test]
    fn test_empty_summary_notice() {
        let plan = summary_sheet(Vec::new());
        assert_eq!(plan.name, SUMMARY_SHEET_NAME);
        assert_eq!(plan.columns.len(), 5);
        assert_eq!(plan.writes.len(), 1);
    }

    #[test]
    fn test_summary_sheet_cells() {
        let (descriptors, classifications) = fixture();
        let documents = BTreeSet::from(["user.json".to_string(), "gone.json".to_string()]);
        let plan = summary_sheet(summary_rows(&documents, &descriptors, &classifications));
        // two rows of five cells
        assert_eq!(plan.writes.len(), 10);
        assert_eq!(plan.columns[0].header, "Source File");
    }
}
