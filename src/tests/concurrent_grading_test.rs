#[cfg(test)]
mod concurrent_grading_tests {
    use crate::{
        config::GradingConfig,
        dispatcher::AnswerGrader,
        errors::GradingError,
        models::*,
        orchestrator::ChunkedGradingOrchestrator,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;
    use uuid::Uuid;

    /// Stub grader that records when each answer started and finished.
    struct TimedGrader {
        latency: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        events: Mutex<Vec<(usize, Instant, Instant)>>,
    }

    impl TimedGrader {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                latency,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AnswerGrader for TimedGrader {
        async fn grade(&self, question: &Question, answer: &Answer) -> Result<GradingOutcome, GradingError> {
            let started = Instant::now();
            let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now_running, Ordering::SeqCst);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            // answer text carries its original index
            let index: usize = answer.text().unwrap_or("0").parse().unwrap_or(0);
            self.events.lock().unwrap().push((index, started, Instant::now()));

            Ok(GradingOutcome::new(
                question.max_points(),
                "stub",
                "",
                GradingMethod::EnhancedGrading,
            ))
        }
    }

    fn exam_with_answers(count: usize) -> (Exam, ExamAttempt) {
        let questions: Vec<Question> = (0..count)
            .map(|i| Question {
                id: Uuid::new_v4(),
                question_type: QuestionType::FillInBlank,
                question_text: format!("Question {}", i),
                points: Some(1.0),
                section: None,
                correct_answer: Some(i.to_string()),
                options: vec![],
            })
            .collect();
        let answers = questions
            .iter()
            .enumerate()
            .map(|(i, question)| Answer::new(question.id).with_text(i.to_string()))
            .collect();
        let exam = Exam {
            id: Uuid::new_v4(),
            title: "Concurrency".to_string(),
            questions,
        };
        let attempt = ExamAttempt::new(exam.id, answers);
        (exam, attempt)
    }

    #[tokio::test]
    async fn test_batches_are_separated_by_pause() {
        let grader = TimedGrader::new(Duration::ZERO);
        let orchestrator = ChunkedGradingOrchestrator::new(grader.clone(), &GradingConfig::default());
        let (exam, mut attempt) = exam_with_answers(4);

        let metrics = orchestrator.grade_attempt(&mut attempt, &exam).await;
        assert_eq!(metrics.processed_count, 4);

        let events = grader.events.lock().unwrap().clone();
        assert_eq!(events.len(), 4);

        let finished = |index: usize| events.iter().find(|(i, _, _)| *i == index).unwrap().2;
        let started = |index: usize| events.iter().find(|(i, _, _)| *i == index).unwrap().1;

        let first_batch_done = finished(0).max(finished(1));
        let second_batch_started = started(2).min(started(3));
        let second_batch_done = finished(2).max(finished(3));

        assert!(second_batch_started >= first_batch_done);
        assert!(
            second_batch_done.duration_since(first_batch_done) >= Duration::from_millis(50),
            "expected at least 50ms between batch completions"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded_by_batch_size() {
        let grader = TimedGrader::new(Duration::from_millis(200));
        let orchestrator = ChunkedGradingOrchestrator::new(grader.clone(), &GradingConfig::default());
        let (exam, mut attempt) = exam_with_answers(5);

        let started = Instant::now();
        orchestrator.grade_attempt(&mut attempt, &exam).await;
        let elapsed = started.elapsed();

        assert_eq!(grader.max_in_flight.load(Ordering::SeqCst), 2);
        // three batches of 200ms plus two 50ms pauses
        assert!(elapsed >= Duration::from_millis(700), "elapsed {:?}", elapsed);
        // answers within a batch overlap instead of running back to back
        assert!(elapsed < Duration::from_millis(1000), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_order_is_preserved() {
        let grader = TimedGrader::new(Duration::from_millis(10));
        let orchestrator = ChunkedGradingOrchestrator::new(grader.clone(), &GradingConfig::default());
        let (exam, mut attempt) = exam_with_answers(6);

        orchestrator.grade_attempt(&mut attempt, &exam).await;

        let events = grader.events.lock().unwrap().clone();
        let batch_of = |index: usize| index / orchestrator.batch_size();
        for (a, a_start, a_end) in &events {
            for (b, b_start, _) in &events {
                if batch_of(*a) < batch_of(*b) {
                    assert!(a_end <= b_start, "answer {} must finish before answer {} starts", a, b);
                    assert!(a_start < b_start);
                }
            }
        }

        // results are written back to the answer they belong to
        for answer in &attempt.answers {
            assert_eq!(answer.score, Some(1.0));
            assert_eq!(answer.feedback.as_deref(), Some("stub"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_batch_size() {
        let grader = TimedGrader::new(Duration::from_millis(100));
        let config = GradingConfig {
            batch_size: 3,
            batch_pause_ms: 0,
            ..GradingConfig::default()
        };
        let orchestrator = ChunkedGradingOrchestrator::new(grader.clone(), &config);
        let (exam, mut attempt) = exam_with_answers(6);

        let started = Instant::now();
        orchestrator.grade_attempt(&mut attempt, &exam).await;

        assert_eq!(grader.max_in_flight.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() < Duration::from_millis(300));
    }
}
