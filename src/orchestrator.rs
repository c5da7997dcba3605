use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::GradingConfig;
use crate::dispatcher::{AnswerGrader, GradingDispatcher};
use crate::errors::GradingError;
use crate::llm_service::LLMService;
use crate::models::{Answer, Exam, ExamAttempt, GradingMetrics, GradingOutcome, Question};

// Import logging macros
use crate::{log_batch, log_grading, log_performance};

/// Result of one answer's trip through the pipeline before it is written back.
struct GradedAnswer {
    index: usize,
    outcome: GradingOutcome,
    /// False only for answers skipped because the student did not select the question
    processed: bool,
}

/// Grades a whole exam attempt in fixed-size batches.
///
/// Batches run strictly in index order with a pause in between; the answers of
/// one batch are graded concurrently, each in its own task. Every answer ends
/// up with a finite score in `[0, points]` whatever happens inside a grader.
#[derive(Clone)]
pub struct ChunkedGradingOrchestrator {
    grader: Arc<dyn AnswerGrader>,
    batch_size: usize,
    batch_pause: Duration,
}

impl ChunkedGradingOrchestrator {
    pub fn new(grader: Arc<dyn AnswerGrader>, config: &GradingConfig) -> Self {
        Self {
            grader,
            batch_size: config.batch_size.max(1),
            batch_pause: config.batch_pause(),
        }
    }

    /// Orchestrator backed by the standard type-based dispatcher.
    pub fn with_dispatcher(llm_service: LLMService, config: &GradingConfig) -> Self {
        Self::new(Arc::new(GradingDispatcher::new(llm_service, config)), config)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn grade_attempt(&self, attempt: &mut ExamAttempt, exam: &Exam) -> GradingMetrics {
        let started = Instant::now();
        let answer_count = attempt.answers.len();
        let total_batches = answer_count.div_ceil(self.batch_size);

        info!(
            attempt_id = %attempt.id,
            exam_id = %exam.id,
            answer_count,
            batch_size = self.batch_size,
            total_batches,
            "Grading exam attempt"
        );

        let mut processed_count = 0usize;
        let mut ai_graded_count = 0usize;

        for (batch_index, batch_start) in (0..answer_count).step_by(self.batch_size).enumerate() {
            if batch_index > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }

            let batch_started = Instant::now();
            let batch_end = (batch_start + self.batch_size).min(answer_count);
            log_batch!(
                start,
                batch = batch_index + 1,
                total_batches = total_batches,
                size = batch_end - batch_start
            );

            let tasks = (batch_start..batch_end).map(|index| {
                let answer = attempt.answers[index].clone();
                let question = exam.question(answer.question_id).cloned();
                Self::grade_one(Arc::clone(&self.grader), index, question, answer)
            });
            let results = join_all(tasks).await;

            for graded in results {
                let max_points = exam
                    .question(attempt.answers[graded.index].question_id)
                    .map(Question::max_points)
                    .unwrap_or(1.0);
                let mut outcome = graded.outcome;
                outcome.score = clamp_score(outcome.score, max_points);

                if graded.processed {
                    processed_count += 1;
                }
                if outcome.grading_method.is_ai_graded() {
                    ai_graded_count += 1;
                }

                log_grading!(
                    success,
                    answer_index = graded.index,
                    method = outcome.grading_method,
                    score = outcome.score
                );
                attempt.answers[graded.index].apply_outcome(outcome);
            }

            log_batch!(
                complete,
                batch = batch_index + 1,
                duration_ms = batch_started.elapsed().as_millis() as u64
            );
        }

        let total_score: f64 = attempt
            .answers
            .iter()
            .map(|answer| answer.score.unwrap_or(0.0))
            .sum();
        let max_possible_score: f64 = attempt
            .answers
            .iter()
            .map(|answer| {
                exam.question(answer.question_id)
                    .map(Question::max_points)
                    .unwrap_or(1.0)
            })
            .sum();
        let max_possible_score = if max_possible_score > 0.0 {
            max_possible_score
        } else {
            1.0
        };

        attempt.total_score = total_score;
        attempt.max_possible_score = max_possible_score;
        attempt.graded_at = Some(Utc::now());

        let total_time_ms = started.elapsed().as_millis() as u64;
        log_performance!("grade_attempt", duration_ms = total_time_ms, count = answer_count);
        info!(
            attempt_id = %attempt.id,
            total_score,
            max_possible_score,
            processed_count,
            ai_graded_count,
            "Exam attempt graded"
        );

        GradingMetrics {
            total_score,
            max_possible_score,
            processed_count,
            ai_graded_count,
            total_time_ms,
        }
    }

    async fn grade_one(
        grader: Arc<dyn AnswerGrader>,
        index: usize,
        question: Option<Question>,
        answer: Answer,
    ) -> GradedAnswer {
        if !answer.is_selected {
            return GradedAnswer {
                index,
                outcome: GradingOutcome::not_selected(),
                processed: false,
            };
        }

        let question = match question {
            Some(question) => question,
            None => {
                let error = GradingError::QuestionNotFound(answer.question_id);
                log_grading!(error, answer_index = index, error = error);
                return GradedAnswer {
                    index,
                    outcome: GradingOutcome::grading_error(),
                    processed: true,
                };
            }
        };

        if !answer.has_content() {
            return GradedAnswer {
                index,
                outcome: GradingOutcome::no_answer(question.model_answer().unwrap_or_default()),
                processed: true,
            };
        }

        log_grading!(start, answer_index = index, question_type = question.question_type);

        // A panic inside a grader surfaces as a JoinError instead of tearing down the batch
        let handle = tokio::spawn(async move { grader.grade(&question, &answer).await });
        let outcome = match handle.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                log_grading!(error, answer_index = index, error = e);
                GradingOutcome::grading_error()
            }
            Err(join_error) => {
                let error = GradingError::Internal(join_error.to_string());
                log_grading!(error, answer_index = index, error = error);
                GradingOutcome::grading_error()
            }
        };

        GradedAnswer {
            index,
            outcome,
            processed: true,
        }
    }
}

fn clamp_score(score: f64, max_points: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, max_points)
    } else {
        0.0
    }
}
