// src/engine/progress.rs

use sqlx::PgConnection;

use crate::{error::AppError, models::enrollment::Enrollment};

/// Clamps a requested progress value into 0..=100.
pub fn clamp(percentage: i64) -> i32 {
    percentage.clamp(0, 100) as i32
}

/// Course progress derived from lesson completion, rounded half-up.
/// A course with no lessons reports 0.
pub fn lesson_percentage(completed: i64, total: i64) -> i64 {
    if total > 0 {
        ((completed as f64 / total as f64) * 100.0).round() as i64
    } else {
        0
    }
}

/// Writes a new progress value to an enrollment, maintaining the invariant
/// that `completed_at` is set exactly when progress is 100.
///
/// Reaching 100 stamps the completion time once. Dropping back below 100
/// clears it again: progress is lesson-driven and regresses when lessons
/// are added to a course the learner had finished.
pub async fn set_progress(
    conn: &mut PgConnection,
    enrollment_id: i64,
    percentage: i64,
) -> Result<Enrollment, AppError> {
    let progress = clamp(percentage);

    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        UPDATE enrollments
        SET progress = $1,
            completed_at = CASE
                WHEN $1 >= 100 AND completed_at IS NULL THEN CURRENT_TIMESTAMP
                WHEN $1 < 100 THEN NULL
                ELSE completed_at
            END
        WHERE id = $2
        RETURNING id, user_id, course_id, enrolled_at, progress, completed_at,
                  rating, review
        "#,
    )
    .bind(progress)
    .bind(enrollment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

    Ok(enrollment)
}

/// Recomputes a learner's course progress from completed lessons and
/// propagates it into the enrollment. Invoked by lesson completion; quiz
/// results deliberately do not drive this.
pub async fn recompute_course_progress(
    conn: &mut PgConnection,
    user_id: i64,
    course_id: i64,
) -> Result<Option<Enrollment>, AppError> {
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM lessons WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_one(&mut *conn)
    .await?;

    let completed = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM lesson_progress lp
        JOIN lessons l ON l.id = lp.lesson_id
        WHERE lp.user_id = $1 AND l.course_id = $2 AND lp.completed = TRUE
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(&mut *conn)
    .await?;

    let enrollment_id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(&mut *conn)
    .await?;

    match enrollment_id {
        Some(id) => {
            let enrollment =
                set_progress(conn, id, lesson_percentage(completed, total)).await?;
            Ok(Some(enrollment))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(-5), 0);
        assert_eq!(clamp(0), 0);
        assert_eq!(clamp(42), 42);
        assert_eq!(clamp(100), 100);
        assert_eq!(clamp(150), 100);
    }

    #[test]
    fn lesson_percentage_rounds_half_up() {
        assert_eq!(lesson_percentage(1, 3), 33);
        assert_eq!(lesson_percentage(2, 3), 67);
        assert_eq!(lesson_percentage(1, 8), 13);
    }

    #[test]
    fn lesson_percentage_handles_empty_course() {
        assert_eq!(lesson_percentage(0, 0), 0);
    }

    #[test]
    fn lesson_percentage_full() {
        assert_eq!(lesson_percentage(7, 7), 100);
    }
}
