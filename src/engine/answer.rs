// src/engine/answer.rs

use serde::{Deserialize, Serialize};

use crate::models::question;

/// A submitted or canonical answer value.
///
/// Clients and quiz authors are allowed several encodings for the same
/// answer: an option index, the literal option string, a bare scalar or a
/// one-element collection. This tagged union absorbs all of them at the
/// system boundary so the grading logic below is the only place that has
/// to care which encoding was used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Number(i64),
    Text(String),
    Many(Vec<AnswerValue>),
}

impl AnswerValue {
    /// Unwraps a one-element collection to its first element, mirroring how
    /// clients may submit `[0]` where `0` is meant. Non-collections return
    /// themselves; an empty collection has no scalar.
    pub fn first_scalar(&self) -> Option<&AnswerValue> {
        match self {
            AnswerValue::Many(values) => values.first(),
            other => Some(other),
        }
    }

    /// Interprets the value as an option index. Numeric strings count,
    /// matching clients that submit `"2"` for index 2.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            AnswerValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as the string a short-answer comparison sees.
    pub fn to_text(&self) -> String {
        match self {
            AnswerValue::Text(s) => s.clone(),
            AnswerValue::Number(n) => n.to_string(),
            AnswerValue::Bool(b) => b.to_string(),
            AnswerValue::Many(_) => String::new(),
        }
    }

    /// Wraps the value into the ordered-collection shape answers are
    /// persisted in. A collection passes through unchanged.
    pub fn into_collection(self) -> Vec<AnswerValue> {
        match self {
            AnswerValue::Many(values) => values,
            other => vec![other],
        }
    }
}

/// Decides whether a submitted value matches a question's canonical
/// correct answer.
///
/// * multiple_choice: both sides unwrap to their first scalar. Two numeric
///   values compare as indexes. A numeric submission against a string
///   canonical resolves the index into the option list first. A string
///   submission is correct iff it is a member of the canonical collection
///   (exact, case-sensitive).
/// * true_false: first scalars under strict tagged equality, so `true`
///   and `"true"` never match each other.
/// * short_answer: case-insensitive, whitespace-trimmed string equality.
/// * anything else: incorrect.
pub fn is_correct_answer(
    question_type: &str,
    options: &[String],
    correct: &[AnswerValue],
    submitted: &AnswerValue,
) -> bool {
    match question_type {
        question::TYPE_MULTIPLE_CHOICE => {
            let Some(provided) = submitted.first_scalar() else {
                return false;
            };
            let canonical = correct.first();

            if let (Some(given), Some(expected)) = (
                provided.as_index(),
                canonical.and_then(|c| c.as_index()),
            ) {
                return given == expected;
            }

            if let (Some(given), Some(expected)) = (
                provided.as_index(),
                canonical.and_then(|c| c.as_text()),
            ) {
                return usize::try_from(given)
                    .ok()
                    .and_then(|idx| options.get(idx))
                    .is_some_and(|option| option == expected);
            }

            if provided.as_text().is_some() {
                return correct.iter().any(|c| c == provided);
            }

            false
        }
        question::TYPE_TRUE_FALSE => {
            match (submitted.first_scalar(), correct.first()) {
                (Some(provided), Some(expected)) => provided == expected,
                _ => false,
            }
        }
        question::TYPE_SHORT_ANSWER => {
            let provided = submitted
                .first_scalar()
                .map(AnswerValue::to_text)
                .unwrap_or_default();
            let expected = correct
                .first()
                .map(AnswerValue::to_text)
                .unwrap_or_default();
            provided.trim().to_lowercase() == expected.trim().to_lowercase()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> Vec<String> {
        vec!["Paris".into(), "London".into(), "Berlin".into()]
    }

    #[test]
    fn multiple_choice_index_vs_index() {
        let correct = vec![AnswerValue::Number(1)];
        assert!(is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Number(1)
        ));
        assert!(!is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Number(0)
        ));
    }

    #[test]
    fn multiple_choice_numeric_string_counts_as_index() {
        let correct = vec![AnswerValue::Number(2)];
        assert!(is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Text("2".into())
        ));
    }

    #[test]
    fn multiple_choice_index_resolves_against_string_canonical() {
        let correct = vec![AnswerValue::Text("Paris".into())];
        assert!(is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Number(0)
        ));
        assert!(!is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Number(1)
        ));
    }

    #[test]
    fn multiple_choice_string_membership_is_case_sensitive() {
        let correct = vec![AnswerValue::Text("Paris".into())];
        assert!(is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Text("Paris".into())
        ));
        assert!(!is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Text("paris".into())
        ));
    }

    #[test]
    fn multiple_choice_wrapped_submission_unwraps() {
        let correct = vec![AnswerValue::Number(1)];
        let wrapped = AnswerValue::Many(vec![AnswerValue::Number(1)]);
        assert!(is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &wrapped
        ));
    }

    #[test]
    fn multiple_choice_out_of_range_index_is_incorrect() {
        let correct = vec![AnswerValue::Text("Paris".into())];
        assert!(!is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Number(99)
        ));
        assert!(!is_correct_answer(
            "multiple_choice",
            &opts(),
            &correct,
            &AnswerValue::Number(-1)
        ));
    }

    #[test]
    fn true_false_wrapping_does_not_matter() {
        let correct = vec![AnswerValue::Bool(true)];
        assert!(is_correct_answer(
            "true_false",
            &[],
            &correct,
            &AnswerValue::Bool(true)
        ));
        assert!(is_correct_answer(
            "true_false",
            &[],
            &correct,
            &AnswerValue::Many(vec![AnswerValue::Bool(true)])
        ));
        assert!(!is_correct_answer(
            "true_false",
            &[],
            &correct,
            &AnswerValue::Bool(false)
        ));
    }

    #[test]
    fn true_false_requires_strict_equality() {
        let correct = vec![AnswerValue::Bool(true)];
        // No coercion across boolean/string representations.
        assert!(!is_correct_answer(
            "true_false",
            &[],
            &correct,
            &AnswerValue::Text("true".into())
        ));
    }

    #[test]
    fn short_answer_ignores_case_and_whitespace() {
        let correct = vec![AnswerValue::Text("Photosynthesis".into())];
        assert!(is_correct_answer(
            "short_answer",
            &[],
            &correct,
            &AnswerValue::Text("  photosynthesis  ".into())
        ));
        assert!(is_correct_answer(
            "short_answer",
            &[],
            &correct,
            &AnswerValue::Text("PHOTOSYNTHESIS".into())
        ));
        assert!(!is_correct_answer(
            "short_answer",
            &[],
            &correct,
            &AnswerValue::Text("photosynthesys".into())
        ));
    }

    #[test]
    fn unknown_type_is_incorrect() {
        let correct = vec![AnswerValue::Text("x".into())];
        assert!(!is_correct_answer(
            "essay",
            &[],
            &correct,
            &AnswerValue::Text("x".into())
        ));
    }

    #[test]
    fn untagged_deserialization_covers_all_encodings() {
        let v: AnswerValue = serde_json::from_str("0").unwrap();
        assert_eq!(v, AnswerValue::Number(0));
        let v: AnswerValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, AnswerValue::Bool(true));
        let v: AnswerValue = serde_json::from_str("\"Paris\"").unwrap();
        assert_eq!(v, AnswerValue::Text("Paris".into()));
        let v: AnswerValue = serde_json::from_str("[\"Paris\"]").unwrap();
        assert_eq!(v, AnswerValue::Many(vec![AnswerValue::Text("Paris".into())]));
    }
}
