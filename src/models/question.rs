// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::{engine::answer::AnswerValue, error::AppError};

pub const TYPE_MULTIPLE_CHOICE: &str = "multiple_choice";
pub const TYPE_TRUE_FALSE: &str = "true_false";
pub const TYPE_SHORT_ANSWER: &str = "short_answer";

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,

    /// The prompt text shown to the learner.
    pub question: String,

    /// Question type: 'multiple_choice', 'true_false' or 'short_answer'.
    pub question_type: String,

    /// List of options. Required for multiple_choice and true_false,
    /// absent for short_answer. Stored as a JSON array.
    pub options: Option<Json<Vec<String>>>,

    /// Canonical correct answer: a small ordered collection that may hold
    /// an option index, a literal option string, or free text.
    pub correct_answer: Json<Vec<AnswerValue>>,

    /// Explanation shown to instructors and in reviewed attempts.
    pub explanation: Option<String>,

    /// Point value, >= 1.
    pub points: i32,

    /// Display order within the quiz.
    pub position: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    /// The option list, or an empty slice when none is stored.
    pub fn option_list(&self) -> &[String] {
        self.options.as_ref().map(|o| o.0.as_slice()).unwrap_or(&[])
    }
}

/// DTO for sending a question to a learner. Has no correct-answer or
/// explanation fields at all, so redaction cannot be forgotten downstream.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: String,
    pub question: String,
    pub options: Vec<String>,
    pub points: i32,
    pub position: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question: q.question,
            options: q.options.map(|o| o.0).unwrap_or_default(),
            question_type: q.question_type,
            points: q.points,
            position: q.position,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
    #[validate(length(min = 1, max = 20))]
    pub question_type: String,
    pub options: Option<Vec<String>>,
    pub correct_answer: Vec<AnswerValue>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
    #[validate(range(min = 1))]
    pub points: Option<i32>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question: Option<String>,
    pub question_type: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<Vec<AnswerValue>>,
    pub explanation: Option<String>,
    pub points: Option<i32>,
}

/// Cross-field checks that `validator` derive cannot express: the type must
/// be a known one, choice types need options, and every index-encoded
/// canonical answer must point inside the option list.
pub fn validate_question_payload(
    question_type: &str,
    options: Option<&Vec<String>>,
    correct_answer: &[AnswerValue],
) -> Result<(), AppError> {
    match question_type {
        TYPE_MULTIPLE_CHOICE | TYPE_TRUE_FALSE | TYPE_SHORT_ANSWER => {}
        other => {
            return Err(AppError::Validation(format!(
                "Unknown question type '{}'",
                other
            )));
        }
    }

    if correct_answer.is_empty() {
        return Err(AppError::Validation(
            "correct_answer cannot be empty".to_string(),
        ));
    }

    if question_type == TYPE_MULTIPLE_CHOICE || question_type == TYPE_TRUE_FALSE {
        let options = options.filter(|o| !o.is_empty()).ok_or_else(|| {
            AppError::Validation(format!("Options are required for {}", question_type))
        })?;

        if question_type == TYPE_MULTIPLE_CHOICE {
            for value in correct_answer {
                if let Some(idx) = value.as_index() {
                    if idx < 0 || idx as usize >= options.len() {
                        return Err(AppError::Validation(format!(
                            "Correct-answer index {} is out of range for {} options",
                            idx,
                            options.len()
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}
