use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::errors::GradingError;
use crate::llm_providers::{JsonResponseParser, LLMProviderFactory, TextCompletion};
use crate::config::LLMConfig;

// Import logging macros
use crate::log_llm_operation;

const GRADING_SYSTEM_MESSAGE: &str = "You are an experienced examiner grading student answers. Award credit for correct concepts even when wording differs. Always respond with a single valid JSON object in the requested format.";

/// Everything the AI collaborator needs to grade one free-text answer.
#[derive(Debug, Clone, Serialize)]
pub struct AiGradingRequest {
    pub question_text: String,
    pub student_answer: String,
    pub model_answer: Option<String>,
    pub max_points: f64,
    pub section: Option<String>,
    pub detailed_feedback: bool,
}

/// Parsed AI verdict. The score is not yet clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGradingResponse {
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default, alias = "corrected_answer")]
    pub corrected_answer: Option<String>,
}

#[derive(Clone)]
pub struct LLMService {
    completion: Arc<dyn TextCompletion>,
}

impl LLMService {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }

    pub fn from_config(config: &LLMConfig) -> Self {
        Self::new(Arc::new(LLMProviderFactory::from_config(config)))
    }

    /// Get the provider name for logging and testing
    pub fn provider_name(&self) -> &str {
        self.completion.provider_name()
    }

    pub async fn grade_open_ended(
        &self,
        request: &AiGradingRequest,
    ) -> Result<AiGradingResponse, GradingError> {
        let started = Instant::now();
        log_llm_operation!(start, "grade_open_ended", provider = self.provider_name());

        let prompt = build_grading_prompt(request);
        let response_text = match self
            .completion
            .complete(Some(GRADING_SYSTEM_MESSAGE), &prompt)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                log_llm_operation!(error, "grade_open_ended", provider = self.provider_name(), error = e);
                return Err(GradingError::AiRequestFailed(e.to_string()));
            }
        };

        debug!(
            response_length = response_text.len(),
            extracted_json = %JsonResponseParser::extract_json_from_response(&response_text),
            "Raw LLM response for answer grading"
        );

        let parsed = parse_grading_response(&response_text)?;

        log_llm_operation!(
            success,
            "grade_open_ended",
            provider = self.provider_name(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(parsed)
    }
}

pub fn parse_grading_response(response_text: &str) -> Result<AiGradingResponse, GradingError> {
    let parsed: AiGradingResponse = JsonResponseParser::parse_json_response(response_text)?;

    if !parsed.score.is_finite() {
        return Err(GradingError::InvalidAiResponse(format!(
            "score is not a finite number: {}",
            parsed.score
        )));
    }

    Ok(parsed)
}

pub fn build_grading_prompt(request: &AiGradingRequest) -> String {
    let reference = match request.model_answer.as_deref() {
        Some(model_answer) => format!("Model Answer: {}", model_answer),
        None => "Model Answer: (none provided) - evaluate the answer from the question content and your own subject knowledge.".to_string(),
    };

    let feedback_instruction = if request.detailed_feedback {
        "Give detailed feedback: explain which key points were covered, which were missing or wrong, and how the answer could be improved."
    } else {
        "Give brief feedback in one or two sentences."
    };

    format!(
        r#"Grade the following student answer.

Section: {section}
Question: {question}
{reference}
Student Answer: {answer}
Maximum Points: {max_points}

{feedback_instruction}

The score must be a number between 0 and {max_points}.

Respond with a JSON object in this exact format:
{{
    "score": <number>,
    "feedback": "<feedback for the student>",
    "correctedAnswer": "<a complete model answer to the question>"
}}"#,
        section = request.section.as_deref().unwrap_or("default"),
        question = request.question_text,
        reference = reference,
        answer = request.student_answer,
        max_points = request.max_points,
        feedback_instruction = feedback_instruction,
    )
}
