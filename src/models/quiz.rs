// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::CreateQuestionRequest;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,

    /// Advisory time limit in minutes. Enforced by clients, not the server.
    pub time_limit: Option<i32>,

    /// Maximum attempts per learner. 0 means unlimited.
    pub max_attempts: i32,

    /// Passing threshold as a percentage, 0..=100.
    pub passing_score: i32,

    /// Inactive quizzes reject new attempts.
    pub is_active: bool,

    /// Display order within the course.
    pub position: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Quiz listing entry enriched with the calling student's attempt state.
#[derive(Debug, Serialize)]
pub struct QuizWithAttemptInfo {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub attempts_count: i64,
    pub best_score: i64,
    pub can_take: bool,
}

/// DTO for creating a quiz together with its initial question bank.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0))]
    pub max_attempts: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    pub is_active: Option<bool>,
    #[validate(length(min = 1, message = "A quiz needs at least one question."))]
    pub questions: Vec<CreateQuestionRequest>,
}

/// DTO for updating a quiz. Fields are optional; questions are managed
/// through the dedicated question endpoints.
#[derive(Debug, Deserialize)]
pub struct UpdateQuizRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_limit: Option<i32>,
    pub max_attempts: Option<i32>,
    pub passing_score: Option<i32>,
    pub is_active: Option<bool>,
}
