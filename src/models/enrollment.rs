// src/models/enrollment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'enrollments' table in the database.
///
/// Invariant: `completed_at` is non-null if and only if `progress` is 100.
/// All writes to `progress` go through `engine::progress` to keep that true.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,

    /// Course completion percentage, 0..=100.
    pub progress: i32,

    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Optional post-completion rating and review.
    pub rating: Option<i32>,
    pub review: Option<String>,
}

/// DTO for a student pushing a direct progress update.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    #[validate(range(min = 0, max = 100))]
    pub progress: i64,
}
