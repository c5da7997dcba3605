use async_trait::async_trait;

use crate::config::GradingConfig;
use crate::errors::GradingError;
use crate::llm_service::LLMService;
use crate::models::{Answer, GradingMethod, GradingOutcome, Question, QuestionType};
use crate::type_graders::{MultipleChoiceGrader, OpenEndedGrader, ShortAnswerGrader};

/// Grades one answer against its question.
///
/// The orchestrator only depends on this seam; an `Err` is absorbed by its
/// outermost guard, never propagated.
#[async_trait]
pub trait AnswerGrader: Send + Sync {
    async fn grade(&self, question: &Question, answer: &Answer) -> Result<GradingOutcome, GradingError>;
}

/// Routes a (question, answer) pair to the grader for its question type.
#[derive(Clone)]
pub struct GradingDispatcher {
    multiple_choice: MultipleChoiceGrader,
    short_answer: ShortAnswerGrader,
    open_ended: OpenEndedGrader,
}

impl GradingDispatcher {
    pub fn new(llm_service: LLMService, config: &GradingConfig) -> Self {
        Self {
            multiple_choice: MultipleChoiceGrader,
            short_answer: ShortAnswerGrader::new(config.clone()),
            open_ended: OpenEndedGrader::new(llm_service, config),
        }
    }

    pub async fn dispatch(&self, question: &Question, answer: &Answer) -> GradingOutcome {
        match question.question_type {
            QuestionType::MultipleChoice => self.multiple_choice.grade(question, answer),
            QuestionType::TrueFalse | QuestionType::FillInBlank => {
                self.short_answer.grade(question, answer)
            }
            QuestionType::OpenEnded => self.open_ended.grade(question, answer).await,
            QuestionType::Matching | QuestionType::Ordering | QuestionType::DragDrop => {
                unsupported(question)
            }
        }
    }
}

fn unsupported(question: &Question) -> GradingOutcome {
    let reason = GradingError::UnsupportedQuestionType(question.question_type);
    GradingOutcome::new(
        0.0,
        format!("{}. This answer requires manual grading.", reason),
        question.model_answer().unwrap_or_default(),
        GradingMethod::ErrorFallback,
    )
    .with_correct(false)
}

#[async_trait]
impl AnswerGrader for GradingDispatcher {
    async fn grade(&self, question: &Question, answer: &Answer) -> Result<GradingOutcome, GradingError> {
        Ok(self.dispatch(question, answer).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_providers::TextCompletion;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingCompletion {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextCompletion for CountingCompletion {
        async fn complete(&self, _system_message: Option<&str>, _prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"score": 3, "feedback": "Well argued", "correctedAnswer": "Model"}"#.to_string())
        }

        fn provider_name(&self) -> &str {
            "Counting"
        }
    }

    fn dispatcher() -> (GradingDispatcher, Arc<CountingCompletion>) {
        let completion = Arc::new(CountingCompletion {
            calls: AtomicUsize::new(0),
        });
        let service = LLMService::new(completion.clone());
        (GradingDispatcher::new(service, &GradingConfig::default()), completion)
    }

    fn question(question_type: QuestionType) -> Question {
        Question {
            id: Uuid::new_v4(),
            question_type,
            question_text: "Describe the role of the scheduler.".to_string(),
            points: Some(4.0),
            section: None,
            correct_answer: Some("selects the next process to run".to_string()),
            options: vec![],
        }
    }

    #[tokio::test]
    async fn test_unsupported_types_are_deterministic() {
        let (dispatcher, completion) = dispatcher();

        for question_type in [QuestionType::Matching, QuestionType::Ordering, QuestionType::DragDrop] {
            let question = question(question_type);
            let mut answer = Answer::new(question.id);
            answer.matching_answer = Some(json!({"a": "1"}));

            let outcome = dispatcher.dispatch(&question, &answer).await;
            assert_eq!(outcome.score, 0.0);
            assert_eq!(outcome.grading_method, GradingMethod::ErrorFallback);
            assert!(outcome.feedback.contains("not supported"));
        }
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_routes_open_ended_to_ai() {
        let (dispatcher, completion) = dispatcher();
        let question = question(QuestionType::OpenEnded);
        let answer = Answer::new(question.id).with_text("It picks which ready process gets the CPU next.");

        let outcome = dispatcher.grade(&question, &answer).await.unwrap();
        assert_eq!(outcome.grading_method, GradingMethod::EnhancedAiGrading);
        assert_eq!(outcome.score, 3.0);
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_routes_fill_in_blank_without_ai() {
        let (dispatcher, completion) = dispatcher();
        let question = question(QuestionType::FillInBlank);
        let answer = Answer::new(question.id).with_text("selects the next process to run");

        let outcome = dispatcher.dispatch(&question, &answer).await;
        assert_eq!(outcome.grading_method, GradingMethod::EnhancedGrading);
        assert_eq!(outcome.score, 4.0);
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
    }
}
