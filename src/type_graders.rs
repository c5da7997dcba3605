use std::time::Duration;

use crate::config::GradingConfig;
use crate::errors::GradingError;
use crate::keyword_grader::KeywordFallbackGrader;
use crate::llm_service::{AiGradingRequest, AiGradingResponse, LLMService};
use crate::models::{AiAnalysis, Answer, GradingMethod, GradingOutcome, Question, QuestionOption};
use crate::similarity::SimilarityScorer;

// Import logging macros
use crate::{log_grading, log_llm_operation};

fn option_label(option: &QuestionOption) -> String {
    format!("{}) {}", option.letter.trim(), option.text.trim())
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Binary grading for choice questions: full points or nothing.
#[derive(Debug, Clone, Default)]
pub struct MultipleChoiceGrader;

impl MultipleChoiceGrader {
    pub fn grade(&self, question: &Question, answer: &Answer) -> GradingOutcome {
        let points = question.max_points();
        let correct_option = question.options.iter().position(|option| option.is_correct);
        let corrected_answer = correct_option
            .map(|index| option_label(&question.options[index]))
            .or_else(|| question.model_answer().map(str::to_string))
            .unwrap_or_default();

        let letter = answer
            .selected_option_letter
            .as_deref()
            .map(str::trim)
            .filter(|letter| !letter.is_empty());
        let text = answer.text();

        if letter.is_none() && text.is_none() && answer.selected_option.is_none() {
            return GradingOutcome::no_answer(corrected_answer);
        }

        let selected_option = Self::resolve_selection(&question.options, letter, text, answer);

        let is_correct = match (selected_option, correct_option) {
            (Some(selected), Some(correct)) => selected == correct,
            _ => {
                let selected_option = selected_option.map(|index| &question.options[index]);
                let candidates = [
                    letter,
                    text,
                    selected_option.map(|option| option.letter.as_str()),
                    selected_option.map(|option| option.text.as_str()),
                ];
                question.model_answer().is_some_and(|model| {
                    candidates.iter().flatten().any(|candidate| same_text(candidate, model))
                })
            }
        };

        if is_correct {
            GradingOutcome::new(points, "Correct!", corrected_answer, GradingMethod::EnhancedGrading)
                .with_correct(true)
        } else {
            let feedback = if corrected_answer.is_empty() {
                "Incorrect.".to_string()
            } else {
                format!("Incorrect. The correct answer is {}.", corrected_answer)
            };
            GradingOutcome::new(0.0, feedback, corrected_answer, GradingMethod::EnhancedGrading)
                .with_correct(false)
        }
    }

    /// Letter match wins over text match, which wins over option identity.
    pub(crate) fn resolve_selection(
        options: &[QuestionOption],
        letter: Option<&str>,
        text: Option<&str>,
        answer: &Answer,
    ) -> Option<usize> {
        let by_letter = letter.and_then(|letter| {
            options
                .iter()
                .position(|option| option.letter.trim().eq_ignore_ascii_case(letter))
        });

        by_letter
            .or_else(|| {
                let wanted = text.or(letter)?;
                options.iter().position(|option| same_text(&option.text, wanted))
            })
            .or_else(|| {
                let id = answer.selected_option?;
                options.iter().position(|option| option.id == id)
            })
    }
}

/// Exact-or-similar grading for true/false and fill-in-the-blank questions.
#[derive(Debug, Clone)]
pub struct ShortAnswerGrader {
    config: GradingConfig,
    fallback: KeywordFallbackGrader,
}

impl ShortAnswerGrader {
    pub fn new(config: GradingConfig) -> Self {
        let fallback = KeywordFallbackGrader::from_config(&config);
        Self { config, fallback }
    }

    pub fn grade(&self, question: &Question, answer: &Answer) -> GradingOutcome {
        let points = question.max_points();
        let model_answer = question.model_answer().unwrap_or_default();

        let letter = answer
            .selected_option_letter
            .as_deref()
            .map(str::trim)
            .filter(|letter| !letter.is_empty());
        let text = answer.text();
        // a chosen option is graded by its text, not by its letter or id
        let selected_text = MultipleChoiceGrader::resolve_selection(&question.options, letter, text, answer)
            .map(|index| question.options[index].text.trim())
            .filter(|option_text| !option_text.is_empty());

        let student = match selected_text.or(text).or(letter) {
            Some(student) => student.to_lowercase(),
            None => return GradingOutcome::no_answer(model_answer),
        };

        if model_answer.is_empty() {
            return self.fallback.grade(&student, "", points);
        }

        let expected = model_answer.to_lowercase();
        if student == expected {
            return GradingOutcome::new(points, "Correct!", model_answer, GradingMethod::EnhancedGrading)
                .with_correct(true);
        }

        let similarity = SimilarityScorer::score(&student, &expected);
        let (score, feedback) = if similarity > self.config.similarity_full {
            (points, "Correct! Minor wording differences were accepted.".to_string())
        } else if similarity > self.config.similarity_high {
            (
                (points * self.config.high_credit_ratio).round(),
                format!("Mostly correct. The expected answer is \"{}\".", model_answer),
            )
        } else if similarity > self.config.similarity_partial {
            (
                (points * self.config.partial_credit_ratio).round(),
                format!("Partially correct. The expected answer is \"{}\".", model_answer),
            )
        } else {
            (0.0, format!("Incorrect. The expected answer is \"{}\".", model_answer))
        };

        GradingOutcome::new(score, feedback, model_answer, GradingMethod::EnhancedGrading)
            .with_correct(score >= points)
    }
}

/// Free-text grading through the AI collaborator with keyword grading as the safety net.
#[derive(Clone)]
pub struct OpenEndedGrader {
    llm_service: LLMService,
    fallback: KeywordFallbackGrader,
    timeout: Duration,
    short_answer_chars: usize,
}

impl OpenEndedGrader {
    pub fn new(llm_service: LLMService, config: &GradingConfig) -> Self {
        Self {
            llm_service,
            fallback: KeywordFallbackGrader::from_config(config),
            timeout: config.ai_timeout(),
            short_answer_chars: config.short_answer_chars,
        }
    }

    pub async fn grade(&self, question: &Question, answer: &Answer) -> GradingOutcome {
        let model_answer = question.model_answer().unwrap_or_default();
        let points = question.max_points();

        let student = match answer.text() {
            Some(student) => student,
            None => return GradingOutcome::no_answer(model_answer),
        };

        if student.chars().count() < self.short_answer_chars {
            return self.fallback.grade(student, model_answer, points);
        }

        let request = AiGradingRequest {
            question_text: question.question_text.clone(),
            student_answer: student.to_string(),
            model_answer: question.model_answer().map(str::to_string),
            max_points: points,
            section: question.section.clone(),
            detailed_feedback: question.wants_detailed_feedback(),
        };

        match self.grade_with_deadline(&request).await {
            Ok(response) => {
                let score = response.score.clamp(0.0, points);
                let corrected_answer = response
                    .corrected_answer
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| model_answer.to_string());
                let feedback = if response.feedback.trim().is_empty() {
                    log_llm_operation!(warn, "grade_open_ended", "AI response carried no feedback");
                    format!("Scored {} out of {} by AI grading.", score, points)
                } else {
                    response.feedback
                };

                let mut outcome = GradingOutcome::new(
                    score,
                    feedback.clone(),
                    corrected_answer.clone(),
                    GradingMethod::EnhancedAiGrading,
                )
                .with_correct(score >= points);

                if question.wants_detailed_feedback() {
                    outcome = outcome.with_ai_analysis(AiAnalysis {
                        detailed_feedback: feedback,
                        model_answer: corrected_answer,
                        score,
                        max_points: points,
                    });
                }
                outcome
            }
            Err(e) => {
                log_grading!(fallback, question_id = question.id, reason = e);
                self.fallback.grade(student, model_answer, points)
            }
        }
    }

    /// Races the AI call against the timeout. On expiry the call future is dropped,
    /// which cancels the request, so a late reply can never be observed.
    async fn grade_with_deadline(
        &self,
        request: &AiGradingRequest,
    ) -> Result<AiGradingResponse, GradingError> {
        match tokio::time::timeout(self.timeout, self.llm_service.grade_open_ended(request)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                log_llm_operation!(timeout, "grade_open_ended", timeout_ms = timeout_ms);
                Err(GradingError::AiTimeout { timeout_ms })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionType;
    use uuid::Uuid;

    fn choice_question(points: f64) -> Question {
        let letters = ["A", "B", "C", "D"];
        let texts = ["Compiler", "Operating system", "Editor", "Browser"];
        Question {
            id: Uuid::new_v4(),
            question_type: QuestionType::MultipleChoice,
            question_text: "Which program manages hardware resources?".to_string(),
            points: Some(points),
            section: None,
            correct_answer: Some("B".to_string()),
            options: letters
                .iter()
                .zip(texts.iter())
                .map(|(letter, text)| QuestionOption {
                    id: Uuid::new_v4(),
                    text: text.to_string(),
                    letter: letter.to_string(),
                    is_correct: *letter == "B",
                })
                .collect(),
        }
    }

    fn fill_in_blank(points: f64, model: &str) -> Question {
        Question {
            id: Uuid::new_v4(),
            question_type: QuestionType::FillInBlank,
            question_text: "Windows is an example of an ____".to_string(),
            points: Some(points),
            section: None,
            correct_answer: Some(model.to_string()),
            options: vec![],
        }
    }

    #[test]
    fn test_multiple_choice_by_letter() {
        let question = choice_question(2.0);
        let grader = MultipleChoiceGrader;

        let outcome = grader.grade(&question, &Answer::new(question.id).with_letter("b"));
        assert_eq!(outcome.score, 2.0);
        assert_eq!(outcome.is_correct, Some(true));
        assert_eq!(outcome.corrected_answer, "B) Operating system");

        let outcome = grader.grade(&question, &Answer::new(question.id).with_letter("C"));
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.is_correct, Some(false));
        assert!(outcome.feedback.contains("B) Operating system"));
    }

    #[test]
    fn test_multiple_choice_by_text_and_identity() {
        let question = choice_question(3.0);
        let grader = MultipleChoiceGrader;

        let by_text = Answer::new(question.id).with_text("  operating SYSTEM ");
        assert_eq!(grader.grade(&question, &by_text).score, 3.0);

        let mut by_id = Answer::new(question.id);
        by_id.selected_option = Some(question.options[1].id);
        assert_eq!(grader.grade(&question, &by_id).score, 3.0);

        // Letter takes precedence over a conflicting identity
        let mut conflicting = Answer::new(question.id).with_letter("A");
        conflicting.selected_option = Some(question.options[1].id);
        assert_eq!(grader.grade(&question, &conflicting).score, 0.0);
    }

    #[test]
    fn test_multiple_choice_without_option_objects() {
        let mut question = choice_question(1.0);
        question.options.clear();
        question.correct_answer = Some("Operating System".to_string());
        let grader = MultipleChoiceGrader;

        let outcome = grader.grade(&question, &Answer::new(question.id).with_text("operating system"));
        assert_eq!(outcome.score, 1.0);

        let outcome = grader.grade(&question, &Answer::new(question.id).with_letter("B"));
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn test_multiple_choice_no_selection() {
        let question = choice_question(2.0);
        let outcome = MultipleChoiceGrader.grade(&question, &Answer::new(question.id));
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.grading_method, GradingMethod::NoAnswer);
    }

    #[test]
    fn test_multiple_choice_is_binary() {
        let question = choice_question(5.0);
        for letter in ["A", "B", "C", "D", "E", "operating"] {
            let outcome = MultipleChoiceGrader.grade(&question, &Answer::new(question.id).with_letter(letter));
            assert!(outcome.score == 0.0 || outcome.score == 5.0);
        }
    }

    #[test]
    fn test_short_answer_exact_match() {
        let question = fill_in_blank(2.0, "operating system");
        let grader = ShortAnswerGrader::new(GradingConfig::default());

        let outcome = grader.grade(&question, &Answer::new(question.id).with_text(" Operating System "));
        assert_eq!(outcome.score, 2.0);
        assert_eq!(outcome.grading_method, GradingMethod::EnhancedGrading);
        assert_eq!(outcome.is_correct, Some(true));
    }

    #[test]
    fn test_short_answer_similarity_ladder() {
        let grader = ShortAnswerGrader::new(GradingConfig::default());
        let question = fill_in_blank(10.0, "one two three four five");

        // 5/5 tokens in a different order: similarity 1.0 but not an exact match
        let outcome = grader.grade(&question, &Answer::new(question.id).with_text("five four three two one"));
        assert_eq!(outcome.score, 10.0);

        // 4/5 = 0.8, not above 0.8, lands in the 80% band
        let outcome = grader.grade(&question, &Answer::new(question.id).with_text("one two three four"));
        assert_eq!(outcome.score, 8.0);

        // 3/5 = 0.6 lands in the 50% band
        let outcome = grader.grade(&question, &Answer::new(question.id).with_text("one two three"));
        assert_eq!(outcome.score, 5.0);

        // 2/5 = 0.4 gets nothing
        let outcome = grader.grade(&question, &Answer::new(question.id).with_text("one two"));
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.is_correct, Some(false));
    }

    #[test]
    fn test_short_answer_empty() {
        let grader = ShortAnswerGrader::new(GradingConfig::default());
        let question = fill_in_blank(2.0, "operating system");

        let outcome = grader.grade(&question, &Answer::new(question.id).with_text(""));
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.grading_method, GradingMethod::NoAnswer);
    }

    #[test]
    fn test_true_false_uses_short_answer_rules() {
        let grader = ShortAnswerGrader::new(GradingConfig::default());
        let mut question = fill_in_blank(1.0, "True");
        question.question_type = QuestionType::TrueFalse;

        assert_eq!(grader.grade(&question, &Answer::new(question.id).with_text("true")).score, 1.0);
        assert_eq!(grader.grade(&question, &Answer::new(question.id).with_letter("false")).score, 0.0);
    }
}
