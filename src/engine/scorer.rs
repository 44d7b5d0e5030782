// src/engine/scorer.rs

/// Outcome of scoring a finalized attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// Percentage 0..=100, rounded half-up.
    pub score: i64,
    pub correct_count: i64,
    pub passed: bool,
}

/// Aggregates per-question correctness into a percentage and verdict.
///
/// `total_points` is the sum of point values across the attempt's question
/// snapshot, `earned_points` the sum over correctly answered ones. A quiz
/// whose snapshot carries zero total points scores 0.
pub fn score(
    earned_points: i64,
    total_points: i64,
    correct_count: i64,
    passing_score: i64,
) -> ScoreOutcome {
    let score = if total_points > 0 {
        ((earned_points as f64 / total_points as f64) * 100.0).round() as i64
    } else {
        0
    };

    ScoreOutcome {
        score,
        correct_count,
        passed: score >= passing_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_half_score() {
        // Points [1, 1, 2] with the two 1-pt questions correct: 2/4 -> 50.
        let outcome = score(2, 4, 2, 70);
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.correct_count, 2);
        assert!(!outcome.passed);
    }

    #[test]
    fn rounds_half_up() {
        // 1/8 = 12.5 -> 13, 3/8 = 37.5 -> 38.
        assert_eq!(score(1, 8, 1, 70).score, 13);
        assert_eq!(score(3, 8, 3, 70).score, 38);
        // 1/3 = 33.33 -> 33.
        assert_eq!(score(1, 3, 1, 70).score, 33);
    }

    #[test]
    fn zero_total_points_scores_zero() {
        let outcome = score(0, 0, 0, 70);
        assert_eq!(outcome.score, 0);
        assert!(!outcome.passed);
    }

    #[test]
    fn passing_is_inclusive_of_threshold() {
        assert!(score(7, 10, 7, 70).passed);
        assert!(!score(69, 100, 69, 70).passed);
        // A 0% threshold always passes.
        assert!(score(0, 4, 0, 0).passed);
    }

    #[test]
    fn perfect_score() {
        let outcome = score(4, 4, 3, 100);
        assert_eq!(outcome.score, 100);
        assert!(outcome.passed);
    }
}
