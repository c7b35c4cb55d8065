use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::label::{ClassificationResult, ErrorKind, SensitivityLabel};
use crate::prompt;
use crate::retry::RetryPolicy;
use crate::{ClassificationRequest, Classifier, description_digest};

/// Diagnostics kept in error results are cut to this many characters.
const MAX_DIAGNOSTIC_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("failed to decode response body: {0}")]
    DecodeResponse(String),
    #[error("Ollama returned an error: {0}")]
    Api(String),
    #[error("response has neither 'response' nor 'error': {0}")]
    UnexpectedShape(String),
    #[error("assessment is not valid JSON: {0}")]
    DecodeAssessment(String),
    #[error("assessment lacks a label or justification: {0}")]
    AssessmentFormat(String),
}

impl ClassifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifyError::Timeout(_) => ErrorKind::Timeout,
            ClassifyError::Request(_) => ErrorKind::Request,
            ClassifyError::Http { .. } => ErrorKind::Http,
            ClassifyError::DecodeResponse(_) => ErrorKind::DecodeResponse,
            ClassifyError::Api(_) => ErrorKind::Api,
            ClassifyError::UnexpectedShape(_) => ErrorKind::UnexpectedShape,
            ClassifyError::DecodeAssessment(_) => ErrorKind::DecodeAssessment,
            ClassifyError::AssessmentFormat(_) => ErrorKind::AssessmentFormat,
        }
    }

    /// Worth another attempt: the service may answer differently next time.
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifyError::Timeout(_) | ClassifyError::Request(_) => true,
            ClassifyError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn into_result(self) -> ClassificationResult {
        let status = match &self {
            ClassifyError::Http { status, .. } => Some(*status),
            _ => None,
        };
        let result = ClassificationResult::error(self.kind(), self.to_string());
        match status {
            Some(status) => result.with_status(status),
            None => result,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma3:1b".to_string(),
            request_timeout_secs: 240,
        }
    }
}

#[derive(Clone)]
pub struct OllamaClassifier {
    settings: OllamaSettings,
    retry: RetryPolicy,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str, // "json" for structured output
}

impl OllamaClassifier {
    pub fn new(settings: OllamaSettings, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            settings,
            retry,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, ClassifyError> {
        let url = format!("{}/api/generate", self.settings.base_url.trim_end_matches('/'));

        let request = OllamaRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
            format: "json", // Force JSON output
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        interpret_generate_response(status, &body)
    }

    /// Generate with retries for transient failures and one repair round for invalid JSON
    async fn assess(&self, request: &ClassificationRequest) -> Result<(SensitivityLabel, String), ClassifyError> {
        let prompt = prompt::build_classification_prompt(request);

        let raw = self
            .retry
            .retry("ollama_generate", || self.generate(&prompt), ClassifyError::is_transient)
            .await?;

        match parse_assessment(&raw) {
            Err(ClassifyError::DecodeAssessment(_)) => {
                debug!(path = %request.full_path, "Assessment is not JSON, asking for a fix");
                let corrected = self.generate(&prompt::build_retry_prompt(&raw)).await?;
                parse_assessment(&corrected).map_err(|e| match e {
                    // report the original answer, not the repair attempt
                    ClassifyError::DecodeAssessment(_) => {
                        ClassifyError::DecodeAssessment(truncate(&raw))
                    }
                    other => other,
                })
            }
            other => other,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassifyError {
        if e.is_timeout() {
            ClassifyError::Timeout(self.settings.request_timeout_secs)
        } else {
            ClassifyError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let result = match self.assess(request).await {
            Ok((label, justification)) => ClassificationResult::new(label, justification),
            Err(e) => {
                warn!(path = %request.full_path, error = %e, "Classification failed");
                e.into_result()
            }
        };

        debug!(path = %request.full_path, label = %result.label, "Classified");
        result.with_digest(description_digest(&request.description))
    }
}

/// Map a raw `/api/generate` answer to the model's text or a failure.
pub fn interpret_generate_response(status: u16, body: &str) -> Result<String, ClassifyError> {
    if !(200..300).contains(&status) {
        return Err(ClassifyError::Http {
            status,
            body: truncate(body),
        });
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ClassifyError::DecodeResponse(format!("{}: {}", e, truncate(body))))?;

    if let Some(text) = value.get("response").and_then(Value::as_str) {
        return Ok(text.to_string());
    }

    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ClassifyError::Api(message));
    }

    Err(ClassifyError::UnexpectedShape(truncate(body)))
}

/// Read the label and justification out of the model's JSON answer.
pub fn parse_assessment(raw: &str) -> Result<(SensitivityLabel, String), ClassifyError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|_| ClassifyError::DecodeAssessment(truncate(raw)))?;

    match (
        string_field(&value, &["pii_sensitivity_assessment", "label"]),
        string_field(&value, &["gdpr_justification", "justification"]),
    ) {
        (Some(label), Some(justification)) => Ok((SensitivityLabel::parse(&label), justification)),
        _ => Err(ClassifyError::AssessmentFormat(truncate(raw))),
    }
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| value.get(*name).and_then(Value::as_str))
        .map(str::to_string)
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
    format!("{}...", cut)
}
