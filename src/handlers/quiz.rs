// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    engine::{attempt, eligibility, question_bank},
    error::AppError,
    handlers::course::{ensure_course_owner, fetch_course, has_course_access},
    models::{
        attempt::{Answer, Attempt, SubmitAttemptRequest},
        question::{
            CreateQuestionRequest, PublicQuestion, Question, UpdateQuestionRequest,
            validate_question_payload,
        },
        quiz::{CreateQuizRequest, Quiz, QuizWithAttemptInfo, UpdateQuizRequest},
    },
    utils::jwt::Claims,
};

const QUIZ_COLUMNS: &str = "id, course_id, title, description, time_limit, max_attempts, \
                            passing_score, is_active, position, created_at";

async fn fetch_quiz(conn: &mut PgConnection, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
    ))
    .bind(quiz_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

async fn best_score(
    conn: &mut PgConnection,
    user_id: i64,
    quiz_id: i64,
) -> Result<i64, AppError> {
    let best = sqlx::query_scalar::<_, Option<i32>>(
        "SELECT MAX(score) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(best.unwrap_or(0) as i64)
}

/// Lists a course's active quizzes. Students additionally see their own
/// attempt state per quiz.
pub async fn list_quizzes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let course = fetch_course(&mut conn, course_id).await?;

    if !has_course_access(&mut conn, &claims, &course).await? {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let quizzes = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes \
         WHERE course_id = $1 AND is_active = TRUE ORDER BY position, id"
    ))
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;

    if !claims.is_student() {
        return Ok(Json(serde_json::json!({ "quizzes": quizzes })));
    }

    let mut enriched = Vec::with_capacity(quizzes.len());
    for quiz in quizzes {
        let attempts_count =
            eligibility::attempt_count(&mut conn, claims.user_id(), quiz.id).await?;
        let best = best_score(&mut conn, claims.user_id(), quiz.id).await?;
        let can_take = eligibility::can_attempt(&mut conn, claims.user_id(), &quiz).await?;

        enriched.push(QuizWithAttemptInfo {
            quiz,
            attempts_count,
            best_score: best,
            can_take,
        });
    }

    Ok(Json(serde_json::json!({ "quizzes": enriched })))
}

/// Creates a quiz with its initial question bank. Owner or admin only.
/// Quiz and questions are written in one transaction.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let course = fetch_course(&mut tx, course_id).await?;
    ensure_course_owner(&claims, &course)?;

    payload.validate()?;
    for question in &payload.questions {
        question.validate()?;
        validate_question_payload(
            &question.question_type,
            question.options.as_ref(),
            &question.correct_answer,
        )?;
    }

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        INSERT INTO quizzes
            (course_id, title, description, time_limit, max_attempts, passing_score,
             is_active, position)
        VALUES ($1, $2, $3, $4, $5, $6, $7,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM quizzes WHERE course_id = $1))
        RETURNING {QUIZ_COLUMNS}
        "#
    ))
    .bind(course_id)
    .bind(&payload.title)
    .bind(payload.description.clone().unwrap_or_default())
    .bind(payload.time_limit)
    .bind(payload.max_attempts.unwrap_or(0))
    .bind(payload.passing_score.unwrap_or(70))
    .bind(payload.is_active.unwrap_or(true))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for (index, question) in payload.questions.iter().enumerate() {
        insert_question(&mut tx, quiz.id, question, index as i32 + 1).await?;
    }

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

async fn insert_question(
    conn: &mut PgConnection,
    quiz_id: i64,
    question: &CreateQuestionRequest,
    position: i32,
) -> Result<Question, AppError> {
    let options = question.options.clone().map(SqlJson);
    let correct_answer = SqlJson(question.correct_answer.clone());

    sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO quiz_questions
            (quiz_id, question, question_type, options, correct_answer,
             explanation, points, position)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, quiz_id, question, question_type, options, correct_answer,
                  explanation, points, position, created_at
        "#,
    )
    .bind(quiz_id)
    .bind(&question.question)
    .bind(&question.question_type)
    .bind(options)
    .bind(correct_answer)
    .bind(&question.explanation)
    .bind(question.points.unwrap_or(1))
    .bind(position)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })
}

/// Retrieves a quiz with its questions. Answer keys and explanations are
/// stripped unless the caller is an instructor or admin; students also get
/// their attempt state.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz(&mut conn, id).await?;
    let course = fetch_course(&mut conn, quiz.course_id).await?;

    if !has_course_access(&mut conn, &claims, &course).await? {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let questions = question_bank::quiz_questions(&mut conn, id).await?;

    if claims.can_view_answer_keys() {
        return Ok(Json(serde_json::json!({
            "quiz": quiz,
            "questions": questions,
        })));
    }

    let attempts_count = eligibility::attempt_count(&mut conn, claims.user_id(), id).await?;
    let best = best_score(&mut conn, claims.user_id(), id).await?;
    let can_take = eligibility::can_attempt(&mut conn, claims.user_id(), &quiz).await?;

    let public: Vec<PublicQuestion> = questions.into_iter().map(PublicQuestion::from).collect();

    Ok(Json(serde_json::json!({
        "quiz": quiz,
        "questions": public,
        "attempts_count": attempts_count,
        "best_score": best,
        "can_take": can_take,
    })))
}

/// Updates a quiz by ID. Owner or admin only.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz(&mut conn, id).await?;
    let course = fetch_course(&mut conn, quiz.course_id).await?;
    ensure_course_owner(&claims, &course)?;

    if let Some(passing_score) = payload.passing_score {
        if !(0..=100).contains(&passing_score) {
            return Err(AppError::Validation(
                "passing_score must be between 0 and 100".to_string(),
            ));
        }
    }
    if let Some(max_attempts) = payload.max_attempts {
        if max_attempts < 0 {
            return Err(AppError::Validation(
                "max_attempts cannot be negative".to_string(),
            ));
        }
    }

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.time_limit.is_none()
        && payload.max_attempts.is_none()
        && payload.passing_score.is_none()
        && payload.is_active.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(time_limit) = payload.time_limit {
        separated.push("time_limit = ");
        separated.push_bind_unseparated(time_limit);
    }

    if let Some(max_attempts) = payload.max_attempts {
        separated.push("max_attempts = ");
        separated.push_bind_unseparated(max_attempts);
    }

    if let Some(passing_score) = payload.passing_score {
        separated.push("passing_score = ");
        separated.push_bind_unseparated(passing_score);
    }

    if let Some(is_active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a quiz by ID. Owner or admin only. Questions, attempts and
/// answers cascade with it (the administrative purge path).
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz(&mut conn, id).await?;
    let course = fetch_course(&mut conn, quiz.course_id).await?;
    ensure_course_owner(&claims, &course)?;

    sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Appends a question to a quiz. Owner or admin only.
pub async fn add_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz(&mut conn, quiz_id).await?;
    let course = fetch_course(&mut conn, quiz.course_id).await?;
    ensure_course_owner(&claims, &course)?;

    payload.validate()?;
    validate_question_payload(
        &payload.question_type,
        payload.options.as_ref(),
        &payload.correct_answer,
    )?;

    let position = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM quiz_questions WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(&mut *conn)
    .await?;

    let question = insert_question(&mut conn, quiz_id, &payload, position as i32).await?;

    Ok((StatusCode::CREATED, Json(question)))
}

async fn fetch_question_for_owner(
    conn: &mut PgConnection,
    claims: &Claims,
    question_id: i64,
) -> Result<Question, AppError> {
    let question = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question, question_type, options, correct_answer,
               explanation, points, position, created_at
        FROM quiz_questions
        WHERE id = $1
        "#,
    )
    .bind(question_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let quiz = fetch_quiz(conn, question.quiz_id).await?;
    let course = fetch_course(conn, quiz.course_id).await?;
    ensure_course_owner(claims, &course)?;

    Ok(question)
}

/// Updates a question by ID. Owner or admin only. The merged result of the
/// update is re-validated so an index-encoded answer can never point
/// outside the option list.
pub async fn update_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let existing = fetch_question_for_owner(&mut conn, &claims, id).await?;

    let merged_type = payload
        .question_type
        .clone()
        .unwrap_or_else(|| existing.question_type.clone());
    let merged_options = payload
        .options
        .clone()
        .or_else(|| existing.options.clone().map(|o| o.0));
    let merged_correct = payload
        .correct_answer
        .clone()
        .unwrap_or_else(|| existing.correct_answer.0.clone());

    validate_question_payload(&merged_type, merged_options.as_ref(), &merged_correct)?;

    if let Some(points) = payload.points {
        if points < 1 {
            return Err(AppError::Validation("points must be >= 1".to_string()));
        }
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quiz_questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(question) = payload.question {
        separated.push("question = ");
        separated.push_bind_unseparated(question);
    }

    if let Some(question_type) = payload.question_type {
        separated.push("question_type = ");
        separated.push_bind_unseparated(question_type);
    }

    if let Some(options) = payload.options {
        separated.push("options = ");
        separated.push_bind_unseparated(SqlJson(options));
    }

    if let Some(correct_answer) = payload.correct_answer {
        separated.push("correct_answer = ");
        separated.push_bind_unseparated(SqlJson(correct_answer));
    }

    if let Some(explanation) = payload.explanation {
        separated.push("explanation = ");
        separated.push_bind_unseparated(explanation);
    }

    if let Some(points) = payload.points {
        separated.push("points = ");
        separated.push_bind_unseparated(points);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a question by ID. Owner or admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    fetch_question_for_owner(&mut conn, &claims, id).await?;

    sqlx::query("DELETE FROM quiz_questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Starts a new attempt on a quiz for the calling user.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let started = attempt::start(&pool, claims.user_id(), quiz_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Quiz attempt started",
            "attempt": started,
        })),
    ))
}

/// Submits answers for an attempt and returns the graded result.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = attempt::submit(&pool, claims.user_id(), attempt_id, &payload).await?;

    Ok(Json(result))
}

/// Retrieves an attempt with its graded answers. Visible to the attempt's
/// owner and to instructors/admins.
pub async fn get_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_row = sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, user_id, quiz_id, started_at, completed_at, score,
               total_questions, correct_answers, time_taken, passed
        FROM quiz_attempts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt_row.user_id != claims.user_id() && !claims.can_view_answer_keys() {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let answers = sqlx::query_as::<_, Answer>(
        r#"
        SELECT id, attempt_id, question_id, answer, is_correct
        FROM quiz_answers
        WHERE attempt_id = $1
        ORDER BY id
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "attempt": attempt_row,
        "answers": answers,
    })))
}
