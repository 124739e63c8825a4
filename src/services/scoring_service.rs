use crate::models::answer::AnswerSheet;
use crate::models::test_definition::AnswerKey;

/// Score, derived percentage, and pass/fail outcome for one answer sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOutcome {
    pub score: f64,
    pub percentage: i32,
    pub passed: bool,
}

pub struct ScoringService;

impl ScoringService {
    /// Grades an answer sheet against the test's answer key.
    ///
    /// Each question earns its full weight when the submitted value equals
    /// the expected one. Unanswered questions earn 0; answers for unknown
    /// question ids are ignored. Deterministic: identical inputs always
    /// produce identical outcomes, so records can be re-scored for audits.
    pub fn score(
        answers: &AnswerSheet,
        key: &AnswerKey,
        max_score: f64,
        passing_threshold: f64,
    ) -> ScoreOutcome {
        if max_score <= 0.0 {
            return ScoreOutcome {
                score: 0.0,
                percentage: 0,
                passed: passing_threshold <= 0.0,
            };
        }

        let declared = key.weight_sum();
        if (declared - max_score).abs() > f64::EPSILON {
            tracing::warn!(
                declared,
                max_score,
                "answer key weights do not sum to the declared max score"
            );
        }

        let mut earned = 0.0;
        for (question_id, entry) in key.iter() {
            if let Some(given) = answers.get(question_id) {
                if *given == entry.expected {
                    earned += entry.weight;
                }
            }
        }

        // Clamp both score and percentage so a misconfigured key (weights
        // not summing to max_score, negative weights) cannot leak out-of-range
        // values into frozen records.
        let score = earned.clamp(0.0, max_score);
        let percentage = ((100.0 * score / max_score).round() as i32).clamp(0, 100);
        let passed = f64::from(percentage) >= passing_threshold;

        ScoreOutcome {
            score,
            percentage,
            passed,
        }
    }
}
