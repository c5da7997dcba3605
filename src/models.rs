use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Section tag that selects brief AI feedback. Any other section gets the detailed treatment.
pub const DEFAULT_SECTION: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillInBlank,
    OpenEnded,
    Matching,
    Ordering,
    DragDrop,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::TrueFalse => "true-false",
            QuestionType::FillInBlank => "fill-in-blank",
            QuestionType::OpenEnded => "open-ended",
            QuestionType::Matching => "matching",
            QuestionType::Ordering => "ordering",
            QuestionType::DragDrop => "drag-drop",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: Uuid,
    pub text: String,
    pub letter: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question_text: String,
    pub points: Option<f64>,
    pub section: Option<String>,
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Maximum score for this question. Missing, zero or invalid point values count as 1.
    pub fn max_points(&self) -> f64 {
        match self.points {
            Some(points) if points.is_finite() && points > 0.0 => points,
            _ => 1.0,
        }
    }

    /// Reference answer with surrounding whitespace removed, if there is a non-empty one.
    pub fn model_answer(&self) -> Option<&str> {
        self.correct_answer
            .as_deref()
            .map(str::trim)
            .filter(|answer| !answer.is_empty())
    }

    pub fn wants_detailed_feedback(&self) -> bool {
        match self.section.as_deref().map(str::trim) {
            Some(section) if !section.is_empty() => !section.eq_ignore_ascii_case(DEFAULT_SECTION),
            _ => false,
        }
    }
}

/// Closed vocabulary of grading strategies. Serialized names are consumed by reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMethod {
    EnhancedGrading,
    EnhancedAiGrading,
    KeywordMatching,
    DefaultFallback,
    NoAnswer,
    NotSelected,
    Error,
    ErrorFallback,
    FallbackError,
}

impl GradingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradingMethod::EnhancedGrading => "enhanced_grading",
            GradingMethod::EnhancedAiGrading => "enhanced_ai_grading",
            GradingMethod::KeywordMatching => "keyword_matching",
            GradingMethod::DefaultFallback => "default_fallback",
            GradingMethod::NoAnswer => "no_answer",
            GradingMethod::NotSelected => "not_selected",
            GradingMethod::Error => "error",
            GradingMethod::ErrorFallback => "error_fallback",
            GradingMethod::FallbackError => "fallback_error",
        }
    }

    pub fn is_ai_graded(&self) -> bool {
        matches!(self, GradingMethod::EnhancedAiGrading)
    }
}

impl fmt::Display for GradingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub detailed_feedback: String,
    pub model_answer: String,
    pub score: f64,
    pub max_points: f64,
}

/// Per-answer result returned by a grader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingOutcome {
    pub score: f64,
    pub feedback: String,
    pub corrected_answer: String,
    pub grading_method: GradingMethod,
    pub is_correct: Option<bool>,
    pub ai_analysis: Option<AiAnalysis>,
}

impl GradingOutcome {
    pub fn new(
        score: f64,
        feedback: impl Into<String>,
        corrected_answer: impl Into<String>,
        grading_method: GradingMethod,
    ) -> Self {
        Self {
            score,
            feedback: feedback.into(),
            corrected_answer: corrected_answer.into(),
            grading_method,
            is_correct: None,
            ai_analysis: None,
        }
    }

    pub fn with_correct(mut self, is_correct: bool) -> Self {
        self.is_correct = Some(is_correct);
        self
    }

    pub fn with_ai_analysis(mut self, analysis: AiAnalysis) -> Self {
        self.ai_analysis = Some(analysis);
        self
    }

    pub fn no_answer(corrected_answer: impl Into<String>) -> Self {
        Self::new(0.0, "No answer provided.", corrected_answer, GradingMethod::NoAnswer)
            .with_correct(false)
    }

    pub fn not_selected() -> Self {
        Self::new(
            0.0,
            "Question was not selected for answering.",
            "",
            GradingMethod::NotSelected,
        )
        .with_correct(false)
    }

    /// Outermost guard result for a grader that failed unexpectedly.
    pub fn grading_error() -> Self {
        Self::new(0.0, "Grading error occurred", "", GradingMethod::Error).with_correct(false)
    }
}

fn default_selected() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: Uuid,
    pub selected_option: Option<Uuid>,
    pub selected_option_letter: Option<String>,
    pub text_answer: Option<String>,
    pub matching_answer: Option<serde_json::Value>,
    pub ordering_answer: Option<serde_json::Value>,
    pub drag_drop_answer: Option<serde_json::Value>,
    #[serde(default = "default_selected")]
    pub is_selected: bool,

    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub corrected_answer: Option<String>,
    #[serde(default)]
    pub grading_method: Option<GradingMethod>,
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
}

impl Answer {
    pub fn new(question_id: Uuid) -> Self {
        Self {
            question_id,
            selected_option: None,
            selected_option_letter: None,
            text_answer: None,
            matching_answer: None,
            ordering_answer: None,
            drag_drop_answer: None,
            is_selected: true,
            score: None,
            is_correct: None,
            feedback: None,
            corrected_answer: None,
            grading_method: None,
            ai_analysis: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_answer = Some(text.into());
        self
    }

    pub fn with_letter(mut self, letter: impl Into<String>) -> Self {
        self.selected_option_letter = Some(letter.into());
        self
    }

    /// Trimmed free-text answer, if any non-blank text was given.
    pub fn text(&self) -> Option<&str> {
        self.text_answer
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn has_content(&self) -> bool {
        let has_payload = |value: &Option<serde_json::Value>| match value {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(serde_json::Value::Object(fields)) => !fields.is_empty(),
            Some(serde_json::Value::String(text)) => !text.trim().is_empty(),
            Some(_) => true,
        };

        self.text().is_some()
            || self.selected_option.is_some()
            || self
                .selected_option_letter
                .as_deref()
                .is_some_and(|letter| !letter.trim().is_empty())
            || has_payload(&self.matching_answer)
            || has_payload(&self.ordering_answer)
            || has_payload(&self.drag_drop_answer)
    }

    pub fn apply_outcome(&mut self, outcome: GradingOutcome) {
        self.score = Some(outcome.score);
        self.is_correct = outcome.is_correct;
        self.feedback = Some(outcome.feedback);
        self.corrected_answer = Some(outcome.corrected_answer);
        self.grading_method = Some(outcome.grading_method);
        self.ai_analysis = outcome.ai_analysis;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAttempt {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Option<String>,
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub total_score: f64,
    #[serde(default)]
    pub max_possible_score: f64,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
}

impl ExamAttempt {
    pub fn new(exam_id: Uuid, answers: Vec<Answer>) -> Self {
        Self {
            id: Uuid::new_v4(),
            exam_id,
            student_id: None,
            answers,
            total_score: 0.0,
            max_possible_score: 0.0,
            graded_at: None,
        }
    }
}

/// Pipeline-level numbers reported after an attempt has been graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingMetrics {
    pub total_score: f64,
    pub max_possible_score: f64,
    pub processed_count: usize,
    pub ai_graded_count: usize,
    pub total_time_ms: u64,
}
