// src/engine/question_bank.rs

use sqlx::PgConnection;

use crate::{error::AppError, models::question::Question};

/// Returns a quiz's questions in ascending display order, ties broken by
/// insertion order. Callers serving learners must map the rows through
/// `PublicQuestion` so answer keys never leave the instructor boundary.
pub async fn quiz_questions(
    conn: &mut PgConnection,
    quiz_id: i64,
) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question, question_type, options, correct_answer,
               explanation, points, position, created_at
        FROM quiz_questions
        WHERE quiz_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions for quiz {}: {:?}", quiz_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(questions)
}
