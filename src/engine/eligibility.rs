// src/engine/eligibility.rs

use sqlx::PgConnection;

use crate::{error::AppError, models::quiz::Quiz};

/// Number of attempts the user already holds for this quiz. Completed and
/// abandoned attempts both count; an abandoned attempt still consumes a slot.
pub async fn attempt_count(
    conn: &mut PgConnection,
    user_id: i64,
    quiz_id: i64,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Decides whether the user may start a new attempt. Fails closed on an
/// inactive quiz; max_attempts of 0 means unlimited.
///
/// Enrollment is deliberately NOT part of this check. A missing enrollment
/// is reported as its own Forbidden error at attempt creation so the two
/// denial reasons stay distinguishable to the caller.
pub async fn can_attempt(
    conn: &mut PgConnection,
    user_id: i64,
    quiz: &Quiz,
) -> Result<bool, AppError> {
    if !quiz.is_active {
        return Ok(false);
    }

    if quiz.max_attempts == 0 {
        return Ok(true);
    }

    let used = attempt_count(conn, user_id, quiz.id).await?;
    Ok(used < quiz.max_attempts as i64)
}

/// True when the user holds an enrollment in the given course.
pub async fn is_enrolled(
    conn: &mut PgConnection,
    user_id: i64,
    course_id: i64,
) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists > 0)
}
