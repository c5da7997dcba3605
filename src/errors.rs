use uuid::Uuid;

use crate::models::QuestionType;

/// Failures inside the grading pipeline.
///
/// None of these escape the orchestrator: each one is absorbed at its tier
/// boundary and turned into a scored `GradingOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("AI request failed: {0}")]
    AiRequestFailed(String),

    #[error("AI grading timed out after {timeout_ms}ms")]
    AiTimeout { timeout_ms: u64 },

    #[error("Invalid AI response: {0}")]
    InvalidAiResponse(String),

    #[error("Question type '{0}' is not supported for automatic grading")]
    UnsupportedQuestionType(QuestionType),

    #[error("Question {0} not found in exam")]
    QuestionNotFound(Uuid),

    #[error("Internal grading error: {0}")]
    Internal(String),
}

impl GradingError {
    /// Failures of the remote AI collaborator, which degrade to keyword grading.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            GradingError::AiRequestFailed(_)
                | GradingError::AiTimeout { .. }
                | GradingError::InvalidAiResponse(_)
        )
    }

    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GradingError::AiRequestFailed(_) => "ai_request_failed",
            GradingError::AiTimeout { .. } => "ai_timeout",
            GradingError::InvalidAiResponse(_) => "invalid_ai_response",
            GradingError::UnsupportedQuestionType(_) => "unsupported_question_type",
            GradingError::QuestionNotFound(_) => "question_not_found",
            GradingError::Internal(_) => "internal",
        }
    }
}

impl From<anyhow::Error> for GradingError {
    fn from(err: anyhow::Error) -> Self {
        GradingError::AiRequestFailed(err.to_string())
    }
}

impl From<serde_json::Error> for GradingError {
    fn from(err: serde_json::Error) -> Self {
        GradingError::InvalidAiResponse(err.to_string())
    }
}
