use serde::{Deserialize, Serialize};

use super::applicant::ApplicantMetadata;
use super::router::ExtractionMethod;

/// The record handed to the display layer.
///
/// `ai_text` is `null` whenever the vision strategy did not run or produced
/// nothing; an empty `parser_text` likewise means "not applicable".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub full_name: String,
    pub age: u32,
    pub extraction_method: String,
    pub ai_text: Option<String>,
    pub parser_text: String,
}

pub fn assemble(
    metadata: &ApplicantMetadata,
    method: ExtractionMethod,
    ai_text: Option<String>,
    parser_text: String,
) -> ExtractionResult {
    ExtractionResult {
        full_name: metadata.full_name(),
        age: metadata.age,
        extraction_method: method.label().to_string(),
        ai_text,
        parser_text: parser_text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn metadata() -> ApplicantMetadata {
        ApplicantMetadata {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 9).expect("valid"),
            age: 33,
        }
    }

    #[test]
    fn serializes_display_contract() {
        let result = assemble(
            &metadata(),
            ExtractionMethod::Standard,
            None,
            "  Invoice 42\n".to_string(),
        );
        let value = serde_json::to_value(&result).expect("serializes");
        assert_eq!(
            value,
            json!({
                "fullName": "Grace Hopper",
                "age": 33,
                "extractionMethod": "standard-method",
                "aiText": null,
                "parserText": "Invoice 42",
            })
        );
    }

    #[test]
    fn keeps_ai_text_verbatim() {
        let result = assemble(
            &metadata(),
            ExtractionMethod::Ai,
            Some("  raw model output \n".to_string()),
            String::new(),
        );
        assert_eq!(result.ai_text.as_deref(), Some("  raw model output \n"));
        assert_eq!(result.extraction_method, "ai-method");
        assert!(result.parser_text.is_empty());
    }
}
