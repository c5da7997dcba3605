use crate::config::GradingConfig;
use crate::models::{GradingMethod, GradingOutcome};

/// Deterministic grading by keyword coverage of the model answer.
///
/// Keywords are the whitespace-delimited tokens of the lower-cased model answer
/// that are at least `keyword_min_len` characters long. A keyword matches when
/// it occurs as a substring of the lower-cased student answer, and the score is
/// `round(matches / keywords * max_points)`.
///
/// Without a model answer (or with one that yields no keywords) the student
/// gets `no_model_answer_ratio` of the points, tagged `default_fallback`.
#[derive(Debug, Clone)]
pub struct KeywordFallbackGrader {
    keyword_min_len: usize,
    no_model_answer_ratio: f64,
}

impl Default for KeywordFallbackGrader {
    fn default() -> Self {
        Self::from_config(&GradingConfig::default())
    }
}

impl KeywordFallbackGrader {
    pub fn from_config(config: &GradingConfig) -> Self {
        Self {
            keyword_min_len: config.keyword_min_len,
            no_model_answer_ratio: config.no_model_answer_ratio,
        }
    }

    pub fn grade(&self, student_answer: &str, model_answer: &str, max_points: f64) -> GradingOutcome {
        if !max_points.is_finite() || max_points <= 0.0 {
            return GradingOutcome::new(
                0.0,
                "Unable to grade this answer: the question has no valid point value.",
                model_answer.trim(),
                GradingMethod::FallbackError,
            )
            .with_correct(false);
        }

        let model_answer = model_answer.trim();
        let keywords = self.keywords(model_answer);

        if keywords.is_empty() {
            let score = (max_points * self.no_model_answer_ratio).round();
            return GradingOutcome::new(
                score,
                "No model answer was available for comparison; partial credit has been awarded pending review.",
                model_answer,
                GradingMethod::DefaultFallback,
            )
            .with_correct(score >= max_points);
        }

        let student = student_answer.to_lowercase();
        let matches = keywords
            .iter()
            .filter(|keyword| student.contains(keyword.as_str()))
            .count();
        let match_ratio = matches as f64 / keywords.len() as f64;
        let score = (match_ratio * max_points).round();

        GradingOutcome::new(
            score,
            Self::feedback(score / max_points, matches, keywords.len()),
            model_answer,
            GradingMethod::KeywordMatching,
        )
        .with_correct(score >= max_points)
    }

    fn keywords(&self, model_answer: &str) -> Vec<String> {
        model_answer
            .to_lowercase()
            .split_whitespace()
            .filter(|token| token.chars().count() >= self.keyword_min_len)
            .map(str::to_string)
            .collect()
    }

    fn feedback(percentage: f64, matches: usize, keyword_count: usize) -> String {
        let coverage = format!("{}/{}", matches, keyword_count);
        if percentage >= 0.8 {
            format!("Excellent answer. You covered {} key concepts from the model answer.", coverage)
        } else if percentage >= 0.6 {
            format!("Good answer. You covered {} key concepts; a few points could be developed further.", coverage)
        } else if percentage >= 0.4 {
            format!("Partial answer. You covered {} key concepts; review the model answer for the missing points.", coverage)
        } else {
            format!("Your answer covers only {} key concepts. Review the model answer and the related material.", coverage)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_keyword_coverage() {
        let grader = KeywordFallbackGrader::default();
        let outcome = grader.grade(
            "The CPU SCHEDULER picks the next process",
            "cpu scheduler process",
            4.0,
        );

        assert_eq!(outcome.score, 4.0);
        assert_eq!(outcome.grading_method, GradingMethod::KeywordMatching);
        assert_eq!(outcome.is_correct, Some(true));
        assert!(outcome.feedback.contains("3/3"), "feedback: {}", outcome.feedback);
        assert!(outcome.feedback.starts_with("Excellent"));
        assert_eq!(outcome.corrected_answer, "cpu scheduler process");
    }

    #[test]
    fn test_short_tokens_are_not_keywords() {
        let grader = KeywordFallbackGrader::default();
        // "is" and "a" are ignored, leaving "deadlock" and "cycle"
        let outcome = grader.grade("a deadlock happens", "Deadlock is a cycle", 2.0);

        assert_eq!(outcome.score, 1.0);
        assert!(outcome.feedback.contains("1/2"));
        assert!(outcome.feedback.starts_with("Partial"));
    }

    #[test]
    fn test_keywords_match_as_substrings() {
        let grader = KeywordFallbackGrader::default();
        let outcome = grader.grade("threads", "thread", 1.0);
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn test_score_bands() {
        let grader = KeywordFallbackGrader::default();
        let model = "alpha bravo charlie delta echo";

        let good = grader.grade("alpha bravo charlie", model, 10.0);
        assert_eq!(good.score, 6.0);
        assert!(good.feedback.starts_with("Good"));
        assert!(good.feedback.contains("3/5"));

        let poor = grader.grade("alpha", model, 10.0);
        assert_eq!(poor.score, 2.0);
        assert!(poor.feedback.contains("only 1/5"));
        assert_eq!(poor.is_correct, Some(false));
    }

    #[test]
    fn test_empty_model_answer_gives_default_credit() {
        let grader = KeywordFallbackGrader::default();

        for student in ["", "anything at all", "a very long and detailed answer about kernels"] {
            let outcome = grader.grade(student, "", 10.0);
            assert_eq!(outcome.score, 7.0);
            assert_eq!(outcome.grading_method, GradingMethod::DefaultFallback);
        }

        let outcome = grader.grade("answer", "   ", 3.0);
        assert_eq!(outcome.score, (3.0f64 * 0.7).round());
    }

    #[test]
    fn test_model_answer_without_keywords_uses_default() {
        let grader = KeywordFallbackGrader::default();
        let outcome = grader.grade("yes", "is a", 5.0);
        assert_eq!(outcome.grading_method, GradingMethod::DefaultFallback);
        assert_eq!(outcome.score, 4.0);
    }

    #[test]
    fn test_invalid_points() {
        let grader = KeywordFallbackGrader::default();
        let outcome = grader.grade("answer", "model answer", 0.0);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.grading_method, GradingMethod::FallbackError);
    }
}
