//! Gemini vision extraction.
//!
//! Sends the raw document (base64 inline data) plus an instruction naming the
//! applicant to `models/<model>:generateContent` and returns the model's text
//! untouched. One attempt per request; failures are classified so callers can
//! tell a rejected credential (`UpstreamUnavailable`) from any other upstream
//! problem (`UpstreamError`).

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{ExtractionError, ExtractionInput, TextExtractor};
use crate::config::AiConfig;
use crate::intake::applicant::ApplicantMetadata;

pub fn vision_instruction(applicant: &ApplicantMetadata) -> String {
    format!(
        "You are an intelligent document parser. This document is for {}, DOB {}. \
         Extract the full text to the best of your abilities.",
        applicant.full_name(),
        applicant.date_of_birth.format("%Y-%m-%d")
    )
}

pub struct GeminiVision {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl GeminiVision {
    pub fn new(config: &AiConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                ExtractionError::UpstreamUnavailable(format!("HTTP client unavailable: {err}"))
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

fn response_text(response: GenerateContentResponse) -> Result<String, ExtractionError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ExtractionError::UpstreamError {
            status: None,
            message: format!("prompt blocked: {reason}"),
        });
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::UpstreamError {
            status: None,
            message: "response contained no candidates".to_string(),
        })?;

    Ok(candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

#[async_trait]
impl TextExtractor for GeminiVision {
    async fn extract(&self, input: ExtractionInput<'_>) -> Result<String, ExtractionError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ExtractionError::UpstreamUnavailable("GOOGLE_GEMINI_API is not configured".to_string())
        })?;

        let instruction = vision_instruction(input.applicant);
        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [
                    Part::Text { text: &instruction },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: input.kind.mime_type(),
                            data: base64::engine::general_purpose::STANDARD.encode(&input.bytes),
                        },
                    },
                ],
            }],
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ExtractionError::UpstreamError {
                status: None,
                message: if err.is_timeout() {
                    "request timed out".to_string()
                } else {
                    err.to_string()
                },
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::UpstreamUnavailable(format!(
                "credential rejected ({status}): {}",
                upstream_message(&body)
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::UpstreamError {
                status: Some(status.as_u16()),
                message: upstream_message(&body),
            });
        }

        let parsed: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|err| ExtractionError::UpstreamError {
                    status: Some(status.as_u16()),
                    message: format!("unreadable response: {err}"),
                })?;
        let text = response_text(parsed)?;

        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            chars = text.len(),
            "vision extraction complete"
        );
        Ok(text)
    }
}
