//! Asks the model to judge a batch output against an input list and an
//! expected reference output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::analysis::{parse_analysis, AnalysisClient};
use crate::error::RequestError;
use crate::prompt::render_named;

pub const VALIDATION_SYSTEM_PROMPT: &str =
    "You are a data validation expert specializing in JSON data analysis and comparison.";

pub const DEFAULT_VALIDATION_TEMPLATE: &str = r#"You are a data validation expert. Validate the correctness of the system-generated output.

**INPUT DATA (original companies):**
{input_json}

**EXPECTED OUTPUT (reference example):**
{expected_json}

**ACTUAL OUTPUT (to validate):**
{actual_json}

Ignore:
- Data completeness (not all inputs need to appear in actual)
- Format compliance (don't check structure/schema)
- Missing elements

Focus only on validating the **data values** in each result's text.

Check the following:
1. **Company Name Match**: Does `company` exactly equal the `company_name` in the generated text?
2. **Twitter Handle Validity**: Is `main_twitter_handle` in the correct format (must start with `@`)?
3. **Twitter Handle Accuracy**: Compare with the style/pattern in EXPECTED (e.g., `Apple Inc.` -> `@Apple`, `Tesla Inc.` -> `@Tesla`). Assess if the mapping is reasonable for the company in ACTUAL.
4. **Inconsistencies**: List mismatches between `company` and `company_name`, invalid handles, or unlikely mappings.
5. **Final Verdict**: Is the ACTUAL output data correct and usable?

Return only structured JSON:

{
  "company_name_match": "score/assessment",
  "twitter_handle_validity": "score/assessment",
  "twitter_handle_accuracy": "score/assessment",
  "inconsistencies": ["list of issues"],
  "overall_assessment": "final verdict",
  "recommendations": ["suggestion1", "suggestion2"]
}"#;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing {0} document: load input, expected and actual JSON before validating")]
    MissingDocument(&'static str),

    #[error(transparent)]
    Request(#[from] RequestError),
}

#[derive(Debug, Clone, Default)]
pub struct ValidationInputs {
    pub input: Option<Value>,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
}

impl ValidationInputs {
    fn require(&self) -> Result<(&Value, &Value, &Value), ValidationError> {
        let input = required(&self.input, "input")?;
        let expected = required(&self.expected, "expected")?;
        let actual = required(&self.actual, "actual")?;
        Ok((input, expected, actual))
    }

    pub fn render(&self, template: &str) -> Result<String, ValidationError> {
        let (input, expected, actual) = self.require()?;
        let (input, expected, actual) = (pretty(input), pretty(expected), pretty(actual));
        Ok(render_named(
            template,
            &[
                ("input_json", input.as_str()),
                ("expected_json", expected.as_str()),
                ("actual_json", actual.as_str()),
            ],
        ))
    }
}

fn required<'a>(doc: &'a Option<Value>, name: &'static str) -> Result<&'a Value, ValidationError> {
    doc.as_ref().ok_or(ValidationError::MissingDocument(name))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|_| value.to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub validation_timestamp: DateTime<Utc>,
    pub input_summary: Value,
    pub expected_summary: Value,
    pub actual_summary: Value,
    pub validation_analysis: Value,
}

fn count_summary(value: &Value) -> Value {
    match value.as_array() {
        Some(items) => json!(items.len()),
        None => json!("N/A"),
    }
}

fn total_companies(value: &Value) -> Value {
    value
        .get("total_companies")
        .cloned()
        .unwrap_or_else(|| json!("N/A"))
}

pub async fn run_validation(
    client: &AnalysisClient,
    template: &str,
    inputs: &ValidationInputs,
) -> Result<ValidationReport, ValidationError> {
    let prompt = inputs.render(template)?;
    let (input, expected, actual) = inputs.require()?;

    let client = client.clone().with_system_prompt(VALIDATION_SYSTEM_PROMPT);
    let text = client.analyze(&prompt).await?;
    log::info!("Validation analysis completed");

    Ok(ValidationReport {
        validation_timestamp: Utc::now(),
        input_summary: json!({
            "type": "input_companies",
            "count": count_summary(input),
        }),
        expected_summary: json!({
            "type": "expected_results",
            "total_companies": total_companies(expected),
        }),
        actual_summary: json!({
            "type": "actual_results",
            "total_companies": total_companies(actual),
        }),
        validation_analysis: parse_analysis(&text),
    })
}
