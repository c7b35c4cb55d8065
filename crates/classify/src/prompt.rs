use crate::ClassificationRequest;
use crate::label::SensitivityLabel;

pub fn build_classification_prompt(request: &ClassificationRequest) -> String {
    let labels = SensitivityLabel::assessable()
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join("|");

    format!(
        r#"You are a data protection analyst assessing fields of a data model under the GDPR.

CONTEXT:
- Data model: {}
- Full field path: {}
- Field name: {}
- Field description: {}

INSTRUCTIONS:
1. Decide whether values stored in this field are personal data
2. If they are, pick the most specific sensitivity category
3. Justify the decision in one or two sentences
4. Output ONLY valid JSON, nothing else

SCHEMA:
{{"pii_sensitivity_assessment": "{}", "gdpr_justification": "short justification"}}

JSON OUTPUT:"#,
        request.document_context,
        request.full_path,
        request.leaf_name,
        request.description_or_placeholder(),
        labels,
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
