// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::engine::answer::AnswerValue;

/// Represents the 'quiz_attempts' table in the database.
///
/// Lifecycle: a row is created when the learner starts (completed_at NULL)
/// and finalized exactly once on submit. Completed attempts are immutable.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Final score 0..=100. NULL while in progress.
    pub score: Option<i32>,

    /// Question count snapshotted at start.
    pub total_questions: i32,

    pub correct_answers: i32,

    /// Elapsed seconds between start and submit.
    pub time_taken: i32,

    pub passed: bool,
}

impl Attempt {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// One row of the question-set snapshot captured at attempt start.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptQuestion {
    pub attempt_id: i64,
    pub question_id: i64,
    pub points: i32,
    pub position: i32,
}

/// Represents the 'quiz_answers' table: one graded answer per
/// (attempt, question) pair. Correctness is computed once at submit time
/// and never recomputed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,

    /// The submitted value, stored as an ordered collection so single and
    /// multi-value answers share one shape.
    pub answer: Json<Vec<AnswerValue>>,

    pub is_correct: bool,
}

/// One submitted (question, value) pair.
#[derive(Debug, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: AnswerValue,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: Vec<SubmittedAnswer>,
}

/// Result of a finalized attempt, returned to the caller.
#[derive(Debug, Serialize)]
pub struct SubmitAttemptResponse {
    pub score: i64,
    pub correct_count: i64,
    pub passed: bool,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}
