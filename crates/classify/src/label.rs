use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a classification call did not produce an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Http,
    Timeout,
    Request,
    DecodeResponse,
    Api,
    UnexpectedShape,
    DecodeAssessment,
    AssessmentFormat,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Http,
        ErrorKind::Timeout,
        ErrorKind::Request,
        ErrorKind::DecodeResponse,
        ErrorKind::Api,
        ErrorKind::UnexpectedShape,
        ErrorKind::DecodeAssessment,
        ErrorKind::AssessmentFormat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Http => "ERROR_OLLAMA_HTTP",
            ErrorKind::Timeout => "ERROR_OLLAMA_TIMEOUT",
            ErrorKind::Request => "ERROR_OLLAMA_REQUEST",
            ErrorKind::DecodeResponse => "ERROR_OLLAMA_DECODE_RESPONSE",
            ErrorKind::Api => "ERROR_OLLAMA_API",
            ErrorKind::UnexpectedShape => "ERROR_OLLAMA_UNEXPECTED_SHAPE",
            ErrorKind::DecodeAssessment => "ERROR_OLLAMA_DECODE_ASSESSMENT",
            ErrorKind::AssessmentFormat => "ERROR_OLLAMA_ASSESSMENT_FORMAT",
        }
    }
}

/// How much highlighting a label earns in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensitivityLabel {
    NotPersonalData,
    PersonalDataLowSensitivity,
    PersonalDataMediumSensitivity,
    PersonalDataHighSensitivity,
    SpecificHealthData,
    SensitiveLocationData,
    SensitiveFinancialData,
    OtherSensitiveData,
    Error(ErrorKind),
    /// Anything else the model answered, kept verbatim.
    Other(String),
}

impl SensitivityLabel {
    pub fn as_str(&self) -> &str {
        match self {
            SensitivityLabel::NotPersonalData => "NOT_PERSONAL_DATA",
            SensitivityLabel::PersonalDataLowSensitivity => "PERSONAL_DATA_LOW_SENSITIVITY",
            SensitivityLabel::PersonalDataMediumSensitivity => "PERSONAL_DATA_MEDIUM_SENSITIVITY",
            SensitivityLabel::PersonalDataHighSensitivity => "PERSONAL_DATA_HIGH_SENSITIVITY",
            SensitivityLabel::SpecificHealthData => "SPECIFIC_HEALTH_DATA",
            SensitivityLabel::SensitiveLocationData => "SENSITIVE_LOCATION_DATA",
            SensitivityLabel::SensitiveFinancialData => "SENSITIVE_FINANCIAL_DATA",
            SensitivityLabel::OtherSensitiveData => "OTHER_SENSITIVE_DATA",
            SensitivityLabel::Error(kind) => kind.as_str(),
            SensitivityLabel::Other(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "NOT_PERSONAL_DATA" => SensitivityLabel::NotPersonalData,
            "PERSONAL_DATA_LOW_SENSITIVITY" => SensitivityLabel::PersonalDataLowSensitivity,
            "PERSONAL_DATA_MEDIUM_SENSITIVITY" => SensitivityLabel::PersonalDataMediumSensitivity,
            "PERSONAL_DATA_HIGH_SENSITIVITY" => SensitivityLabel::PersonalDataHighSensitivity,
            "SPECIFIC_HEALTH_DATA" => SensitivityLabel::SpecificHealthData,
            "SENSITIVE_LOCATION_DATA" => SensitivityLabel::SensitiveLocationData,
            "SENSITIVE_FINANCIAL_DATA" => SensitivityLabel::SensitiveFinancialData,
            "OTHER_SENSITIVE_DATA" => SensitivityLabel::OtherSensitiveData,
            other => ErrorKind::ALL
                .iter()
                .find(|kind| kind.as_str() == other)
                .map(|kind| SensitivityLabel::Error(*kind))
                .unwrap_or_else(|| SensitivityLabel::Other(raw.to_string())),
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            SensitivityLabel::PersonalDataHighSensitivity
            | SensitivityLabel::SpecificHealthData
            | SensitivityLabel::SensitiveLocationData => Some(Severity::High),
            SensitivityLabel::PersonalDataMediumSensitivity
            | SensitivityLabel::SensitiveFinancialData
            | SensitivityLabel::OtherSensitiveData => Some(Severity::Medium),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SensitivityLabel::Error(_))
    }

    /// Listed in the summary sheet: everything except "not personal data" and errors.
    pub fn is_reportable(&self) -> bool {
        !matches!(
            self,
            SensitivityLabel::NotPersonalData | SensitivityLabel::Error(_)
        )
    }

    /// Labels the model may answer with, for the prompt.
    pub fn assessable() -> [SensitivityLabel; 8] {
        [
            SensitivityLabel::NotPersonalData,
            SensitivityLabel::PersonalDataLowSensitivity,
            SensitivityLabel::PersonalDataMediumSensitivity,
            SensitivityLabel::PersonalDataHighSensitivity,
            SensitivityLabel::SpecificHealthData,
            SensitivityLabel::SensitiveLocationData,
            SensitivityLabel::SensitiveFinancialData,
            SensitivityLabel::OtherSensitiveData,
        ]
    }
}

impl From<String> for SensitivityLabel {
    fn from(raw: String) -> Self {
        SensitivityLabel::parse(&raw)
    }
}

impl From<SensitivityLabel> for String {
    fn from(label: SensitivityLabel) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for SensitivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one property, as cached and reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: SensitivityLabel,
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Fingerprint of the description that was classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_digest: Option<String>,
}

impl ClassificationResult {
    pub fn new(label: SensitivityLabel, justification: impl Into<String>) -> Self {
        Self {
            label,
            justification: justification.into(),
            status_code: None,
            description_digest: None,
        }
    }

    pub fn error(kind: ErrorKind, justification: impl Into<String>) -> Self {
        Self::new(SensitivityLabel::Error(kind), justification)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_digest(mut self, digest: String) -> Self {
        self.description_digest = Some(digest);
        self
    }
}
