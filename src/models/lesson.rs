// src/models/lesson.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'lessons' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,

    /// Sanitized HTML body.
    pub content: Option<String>,

    pub video_url: Option<String>,
    pub duration_minutes: i32,

    /// Display order within the course.
    pub position: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A lesson together with the calling student's completion state.
#[derive(Debug, Serialize, FromRow)]
pub struct LessonWithProgress {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: i32,
    pub position: i32,
    pub completed: bool,
}

/// DTO for creating a new lesson.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 50000))]
    pub content: Option<String>,
    #[validate(custom(function = validate_video_url))]
    pub video_url: Option<String>,
    #[validate(range(min = 1))]
    pub duration_minutes: i32,
}

/// DTO for updating a lesson. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub position: Option<i32>,
}

fn validate_video_url(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_video_url"));
    }
    Ok(())
}
