// src/handlers/lesson.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    engine::progress,
    error::AppError,
    handlers::course::{ensure_course_owner, fetch_course, has_course_access},
    models::lesson::{CreateLessonRequest, Lesson, LessonWithProgress, UpdateLessonRequest},
    utils::{html::clean_html, jwt::Claims},
};

const LESSON_COLUMNS: &str =
    "id, course_id, title, content, video_url, duration_minutes, position, created_at";

async fn fetch_lesson(conn: &mut PgConnection, lesson_id: i64) -> Result<Lesson, AppError> {
    sqlx::query_as::<_, Lesson>(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"
    ))
    .bind(lesson_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))
}

/// Lists a course's lessons in display order. For students the rows carry
/// their own completion flag.
pub async fn list_lessons(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let course = fetch_course(&mut conn, course_id).await?;

    if !has_course_access(&mut conn, &claims, &course).await? {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let lessons = sqlx::query_as::<_, LessonWithProgress>(
        r#"
        SELECT l.id, l.course_id, l.title, l.content, l.video_url,
               l.duration_minutes, l.position,
               COALESCE(lp.completed, FALSE) AS completed
        FROM lessons l
        LEFT JOIN lesson_progress lp
               ON lp.lesson_id = l.id AND lp.user_id = $1
        WHERE l.course_id = $2
        ORDER BY l.position, l.id
        "#,
    )
    .bind(claims.user_id())
    .bind(course_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list lessons: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(lessons))
}

/// Creates a new lesson at the end of the course. Owner or admin only.
/// Lesson bodies are sanitized before storage.
pub async fn create_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let course = fetch_course(&mut conn, course_id).await?;
    ensure_course_owner(&claims, &course)?;

    payload.validate()?;

    let content = payload.content.as_deref().map(clean_html);

    let lesson = sqlx::query_as::<_, Lesson>(&format!(
        r#"
        INSERT INTO lessons (course_id, title, content, video_url, duration_minutes, position)
        VALUES ($1, $2, $3, $4, $5,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE course_id = $1))
        RETURNING {LESSON_COLUMNS}
        "#
    ))
    .bind(course_id)
    .bind(&payload.title)
    .bind(&content)
    .bind(&payload.video_url)
    .bind(payload.duration_minutes)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create lesson: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Updates a lesson by ID. Owner or admin only.
pub async fn update_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let lesson = fetch_lesson(&mut conn, id).await?;
    let course = fetch_course(&mut conn, lesson.course_id).await?;
    ensure_course_owner(&claims, &course)?;

    if payload.title.is_none()
        && payload.content.is_none()
        && payload.video_url.is_none()
        && payload.duration_minutes.is_none()
        && payload.position.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE lessons SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }

    if let Some(video_url) = payload.video_url {
        separated.push("video_url = ");
        separated.push_bind_unseparated(video_url);
    }

    if let Some(duration_minutes) = payload.duration_minutes {
        separated.push("duration_minutes = ");
        separated.push_bind_unseparated(duration_minutes);
    }

    if let Some(position) = payload.position {
        separated.push("position = ");
        separated.push_bind_unseparated(position);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update lesson: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a lesson by ID, then reconciles every enrolled learner's course
/// progress, since removing a lesson can push learners over the completion line.
pub async fn delete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let lesson = fetch_lesson(&mut tx, id).await?;
    let course = fetch_course(&mut tx, lesson.course_id).await?;
    ensure_course_owner(&claims, &course)?;

    sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let learner_ids = sqlx::query_scalar::<_, i64>(
        "SELECT user_id FROM enrollments WHERE course_id = $1",
    )
    .bind(course.id)
    .fetch_all(&mut *tx)
    .await?;

    for user_id in learner_ids {
        progress::recompute_course_progress(&mut tx, user_id, course.id).await?;
    }

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Marks a lesson complete for the calling student and propagates the new
/// course progress into their enrollment.
pub async fn complete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let lesson = fetch_lesson(&mut tx, id).await?;

    let enrolled = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(claims.user_id())
    .bind(lesson.course_id)
    .fetch_one(&mut *tx)
    .await?;

    if enrolled == 0 {
        return Err(AppError::Forbidden(
            "Not enrolled in this course".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO lesson_progress (user_id, lesson_id, completed, completed_at)
        VALUES ($1, $2, TRUE, CURRENT_TIMESTAMP)
        ON CONFLICT (user_id, lesson_id) DO UPDATE
            SET completed = TRUE,
                completed_at = COALESCE(lesson_progress.completed_at, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(claims.user_id())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let enrollment =
        progress::recompute_course_progress(&mut tx, claims.user_id(), lesson.course_id).await?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "message": "Lesson marked as complete",
        "enrollment": enrollment,
    })))
}
