// src/engine/attempt.rs

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{PgPool, Postgres, types::Json};

use crate::{
    engine::{answer, eligibility, scorer},
    error::AppError,
    models::{
        attempt::{Attempt, AttemptQuestion, SubmitAttemptRequest, SubmitAttemptResponse},
        question::Question,
        quiz::Quiz,
    },
};

const ATTEMPT_COLUMNS: &str = "id, user_id, quiz_id, started_at, completed_at, score, \
                               total_questions, correct_answers, time_taken, passed";

/// Starts a new attempt for `user_id` on `quiz_id`.
///
/// Runs in one transaction that locks the quiz row, so two racing starts
/// serialize on the eligibility re-check and cannot jointly exceed the
/// attempt limit. The current question set is snapshotted alongside the
/// attempt; scoring later runs against that snapshot, never the live bank.
pub async fn start(pool: &PgPool, user_id: i64, quiz_id: i64) -> Result<Attempt, AppError> {
    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, course_id, title, description, time_limit, max_attempts,
               passing_score, is_active, position, created_at
        FROM quizzes
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(quiz_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    if !eligibility::can_attempt(&mut tx, user_id, &quiz).await? {
        let reason = if quiz.is_active {
            "No attempts remaining for this quiz"
        } else {
            "Quiz is not active"
        };
        return Err(AppError::Conflict(reason.to_string()));
    }

    // Enrollment is a distinct requirement with a distinct error, not part
    // of the eligibility verdict.
    if !eligibility::is_enrolled(&mut tx, user_id, quiz.course_id).await? {
        return Err(AppError::Forbidden(
            "Not enrolled in this course".to_string(),
        ));
    }

    let total_questions = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(&mut *tx)
    .await?;

    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "INSERT INTO quiz_attempts (user_id, quiz_id, total_questions) \
         VALUES ($1, $2, $3) RETURNING {ATTEMPT_COLUMNS}"
    ))
    .bind(user_id)
    .bind(quiz_id)
    .bind(total_questions as i32)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create attempt for quiz {}: {:?}", quiz_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    sqlx::query(
        r#"
        INSERT INTO quiz_attempt_questions (attempt_id, question_id, points, position)
        SELECT $1, id, points, position FROM quiz_questions WHERE quiz_id = $2
        "#,
    )
    .bind(attempt.id)
    .bind(quiz_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "User {} started attempt {} on quiz {}",
        user_id,
        attempt.id,
        quiz_id
    );

    Ok(attempt)
}

/// Finalizes an attempt from the submitted answers.
///
/// The whole operation is one atomic unit: answer rows, the score and the
/// completion timestamp land together or not at all, and a failed submit
/// leaves the attempt open for retry. The attempt row is locked up front;
/// of two concurrent submits, the loser observes the winner's completion
/// and gets a Conflict instead of overwriting the score.
pub async fn submit(
    pool: &PgPool,
    user_id: i64,
    attempt_id: i64,
    req: &SubmitAttemptRequest,
) -> Result<SubmitAttemptResponse, AppError> {
    if req.answers.is_empty() {
        return Err(AppError::Validation("No answers submitted".to_string()));
    }

    let mut tx = pool.begin().await?;

    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1 FOR UPDATE"
    ))
    .bind(attempt_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != user_id {
        return Err(AppError::Forbidden(
            "Attempt belongs to another user".to_string(),
        ));
    }

    if attempt.is_completed() {
        return Err(AppError::Conflict(
            "Attempt already submitted".to_string(),
        ));
    }

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, course_id, title, description, time_limit, max_attempts,
               passing_score, is_active, position, created_at
        FROM quizzes
        WHERE id = $1
        "#,
    )
    .bind(attempt.quiz_id)
    .fetch_one(&mut *tx)
    .await?;

    // The snapshot taken at start is the grading universe: the scoring
    // denominator, and the set of question ids a submission may reference.
    let snapshot = sqlx::query_as::<_, AttemptQuestion>(
        r#"
        SELECT attempt_id, question_id, points, position
        FROM quiz_attempt_questions
        WHERE attempt_id = $1
        ORDER BY position
        "#,
    )
    .bind(attempt_id)
    .fetch_all(&mut *tx)
    .await?;

    let snapshot_points: HashMap<i64, i64> = snapshot
        .iter()
        .map(|q| (q.question_id, q.points as i64))
        .collect();

    for submitted in &req.answers {
        if !snapshot_points.contains_key(&submitted.question_id) {
            return Err(AppError::Validation(format!(
                "Question {} is not part of this attempt",
                submitted.question_id
            )));
        }
    }

    // Grading keys come from the live rows; a question deleted mid-attempt
    // keeps its snapshot weight and simply grades as incorrect.
    let question_ids: Vec<i64> = req.answers.iter().map(|a| a.question_id).collect();

    let mut query_builder = sqlx::QueryBuilder::<Postgres>::new(
        "SELECT id, quiz_id, question, question_type, options, correct_answer, \
         explanation, points, position, created_at \
         FROM quiz_questions WHERE id IN (",
    );
    let mut separated = query_builder.separated(",");
    for id in &question_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let questions: Vec<Question> = query_builder
        .build_query_as()
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let question_map: HashMap<i64, Question> =
        questions.into_iter().map(|q| (q.id, q)).collect();

    let mut earned_points: i64 = 0;
    let mut correct_count: i64 = 0;

    for submitted in &req.answers {
        let is_correct = question_map
            .get(&submitted.question_id)
            .is_some_and(|question| {
                answer::is_correct_answer(
                    &question.question_type,
                    question.option_list(),
                    &question.correct_answer.0,
                    &submitted.answer,
                )
            });

        if is_correct {
            earned_points += snapshot_points[&submitted.question_id];
            correct_count += 1;
        }

        let stored = Json(submitted.answer.clone().into_collection());

        // The unique index on (attempt_id, question_id) turns a duplicate
        // question in the payload into an error that aborts the whole
        // transaction, keeping the one-answer-per-question invariant.
        sqlx::query(
            "INSERT INTO quiz_answers (attempt_id, question_id, answer, is_correct) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(attempt_id)
        .bind(submitted.question_id)
        .bind(stored)
        .bind(is_correct)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") {
                AppError::Validation(format!(
                    "Duplicate answer for question {}",
                    submitted.question_id
                ))
            } else {
                tracing::error!("Failed to store answer: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;
    }

    let total_points: i64 = snapshot_points.values().sum();
    let outcome = scorer::score(
        earned_points,
        total_points,
        correct_count,
        quiz.passing_score as i64,
    );

    let completed_at = Utc::now();
    let time_taken = (completed_at - attempt.started_at).num_seconds().max(0);

    // Conditional finalize guarded on the in-progress state. With the row
    // lock above this cannot miss, but the guard keeps a completed attempt
    // immutable even if the locking strategy ever changes.
    let finalized = sqlx::query(
        r#"
        UPDATE quiz_attempts
        SET completed_at = $1, score = $2, correct_answers = $3,
            time_taken = $4, passed = $5
        WHERE id = $6 AND completed_at IS NULL
        "#,
    )
    .bind(completed_at)
    .bind(outcome.score as i32)
    .bind(outcome.correct_count as i32)
    .bind(time_taken as i32)
    .bind(outcome.passed)
    .bind(attempt_id)
    .execute(&mut *tx)
    .await?;

    if finalized.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Attempt already submitted".to_string(),
        ));
    }

    tx.commit().await?;

    tracing::info!(
        "Attempt {} finalized: score {} ({}/{} correct), passed: {}",
        attempt_id,
        outcome.score,
        outcome.correct_count,
        snapshot.len(),
        outcome.passed
    );

    Ok(SubmitAttemptResponse {
        score: outcome.score,
        correct_count: outcome.correct_count,
        passed: outcome.passed,
        completed_at,
    })
}
