use std::collections::HashMap;

/// Lexical overlap between two strings.
///
/// Both inputs are split on whitespace and the shared tokens are counted as a
/// multiset intersection, so repeated words only match as often as they occur
/// on both sides. The count is divided by the longer token list, giving a value
/// in `[0, 1]` that is symmetric in its arguments. Two empty inputs score 0.
///
/// No case folding or punctuation handling happens here; callers normalize first.
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn score(a: &str, b: &str) -> f64 {
        let tokens_a: Vec<&str> = a.split_whitespace().collect();
        let tokens_b: Vec<&str> = b.split_whitespace().collect();

        let longest = tokens_a.len().max(tokens_b.len());
        if longest == 0 {
            return 0.0;
        }

        let mut remaining: HashMap<&str, usize> = HashMap::new();
        for token in &tokens_b {
            *remaining.entry(*token).or_insert(0) += 1;
        }

        let mut shared = 0usize;
        for token in &tokens_a {
            if let Some(count) = remaining.get_mut(token) {
                if *count > 0 {
                    *count -= 1;
                    shared += 1;
                }
            }
        }

        shared as f64 / longest as f64
    }
}
