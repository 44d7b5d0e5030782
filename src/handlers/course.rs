// src/handlers/course.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    engine::{eligibility, progress},
    error::AppError,
    models::{
        course::{Course, CreateCourseRequest, RateCourseRequest, UpdateCourseRequest},
        enrollment::{Enrollment, UpdateProgressRequest},
    },
    utils::jwt::Claims,
};

const COURSE_COLUMNS: &str = "id, title, description, instructor_id, is_published, created_at";

pub(crate) async fn fetch_course(
    conn: &mut PgConnection,
    course_id: i64,
) -> Result<Course, AppError> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
    ))
    .bind(course_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
}

/// Whether the caller may view this course's learning material.
/// Admins always; instructors for their own courses; students when enrolled.
pub(crate) async fn has_course_access(
    conn: &mut PgConnection,
    claims: &Claims,
    course: &Course,
) -> Result<bool, AppError> {
    if claims.is_admin() {
        return Ok(true);
    }

    if claims.is_instructor() && course.instructor_id == claims.user_id() {
        return Ok(true);
    }

    if claims.is_student() {
        return eligibility::is_enrolled(conn, claims.user_id(), course.id).await;
    }

    Ok(false)
}

/// Ensures the caller may manage (edit/delete) this course.
pub(crate) fn ensure_course_owner(claims: &Claims, course: &Course) -> Result<(), AppError> {
    if claims.is_admin() || course.instructor_id == claims.user_id() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not the instructor of this course".to_string(),
        ))
    }
}

/// Lists published courses. Public.
pub async fn list_courses(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE is_published = TRUE ORDER BY id DESC"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list courses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(courses))
}

/// Retrieves a single published course. Public.
pub async fn get_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1 AND is_published = TRUE"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(course))
}

/// Creates a course owned by the calling instructor (or admin).
pub async fn create_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if claims.is_student() {
        return Err(AppError::Forbidden(
            "Only instructors can create courses".to_string(),
        ));
    }

    payload.validate()?;

    let course = sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (title, description, instructor_id, is_published) \
         VALUES ($1, $2, $3, $4) RETURNING {COURSE_COLUMNS}"
    ))
    .bind(&payload.title)
    .bind(payload.description.unwrap_or_default())
    .bind(claims.user_id())
    .bind(payload.is_published.unwrap_or(false))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(course)))
}

/// Updates a course by ID. Owner or admin only.
pub async fn update_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let course = fetch_course(&mut conn, id).await?;
    ensure_course_owner(&claims, &course)?;

    if payload.title.is_none() && payload.description.is_none() && payload.is_published.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE courses SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(is_published) = payload.is_published {
        separated.push("is_published = ");
        separated.push_bind_unseparated(is_published);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a course by ID. Owner or admin only.
/// Lessons, quizzes and enrollments cascade with it.
pub async fn delete_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let course = fetch_course(&mut conn, id).await?;
    ensure_course_owner(&claims, &course)?;

    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete course: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Enrolls the calling student into a published course.
pub async fn enroll(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let course = fetch_course(&mut conn, id).await?;

    if !course.is_published {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        INSERT INTO enrollments (user_id, course_id)
        VALUES ($1, $2)
        RETURNING id, user_id, course_id, enrolled_at, progress, completed_at,
                  rating, review
        "#,
    )
    .bind(claims.user_id())
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") {
            AppError::Conflict("Already enrolled in this course".to_string())
        } else {
            tracing::error!("Failed to enroll: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Returns the calling student's progress in a course.
pub async fn get_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT id, user_id, course_id, enrolled_at, progress, completed_at,
               rating, review
        FROM enrollments
        WHERE user_id = $1 AND course_id = $2
        "#,
    )
    .bind(claims.user_id())
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Not enrolled in this course".to_string()))?;

    Ok(Json(enrollment))
}

/// Directly updates the calling student's progress in a course.
/// Runs through the progress propagator, which owns the completion stamp.
pub async fn update_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = pool.acquire().await?;

    let enrollment_id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(claims.user_id())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Not enrolled in this course".to_string()))?;

    let enrollment = progress::set_progress(&mut conn, enrollment_id, payload.progress).await?;

    Ok(Json(enrollment))
}

/// Rates a completed course.
pub async fn rate_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<RateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT id, user_id, course_id, enrolled_at, progress, completed_at,
               rating, review
        FROM enrollments
        WHERE user_id = $1 AND course_id = $2
        "#,
    )
    .bind(claims.user_id())
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Not enrolled in this course".to_string()))?;

    if enrollment.completed_at.is_none() {
        return Err(AppError::Conflict(
            "Course must be completed before rating".to_string(),
        ));
    }

    sqlx::query("UPDATE enrollments SET rating = $1, review = $2 WHERE id = $3")
        .bind(payload.rating)
        .bind(&payload.review)
        .bind(enrollment.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::OK)
}
