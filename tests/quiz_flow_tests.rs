// tests/quiz_flow_tests.rs

use lms_backend::{config::Config, routes, state::AppState, utils::hash::hash_password};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState { pool, config };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn test_pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test DB")
}

/// Inserts a user with the given role directly and logs them in via the API.
/// Returns (token, user_id).
async fn seed_and_login(
    pool: &PgPool,
    client: &reqwest::Client,
    address: &str,
    role: &str,
) -> (String, i64) {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";
    let hashed = hash_password(password).unwrap();

    let user_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&username)
    .bind(&hashed)
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap();

    let login_resp = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    let token = login_resp["token"].as_str().expect("Token not found");
    (token.to_string(), user_id)
}

/// Creates a published course owned by the instructor token.
async fn create_course(client: &reqwest::Client, address: &str, instructor_token: &str) -> i64 {
    let resp = client
        .post(&format!("{}/api/courses", address))
        .header("Authorization", format!("Bearer {}", instructor_token))
        .json(&serde_json::json!({
            "title": "Test Course",
            "description": "Course for quiz flow tests",
            "is_published": true
        }))
        .send()
        .await
        .expect("Create course failed");
    assert_eq!(resp.status().as_u16(), 201);

    resp.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap()
}

/// Creates a quiz with two 1-pt multiple-choice questions:
/// Q1 correct index 0, Q2 correct index 2.
async fn create_two_question_quiz(
    client: &reqwest::Client,
    address: &str,
    instructor_token: &str,
    course_id: i64,
    max_attempts: i64,
    passing_score: i64,
) -> i64 {
    let resp = client
        .post(&format!("{}/api/courses/{}/quizzes", address, course_id))
        .header("Authorization", format!("Bearer {}", instructor_token))
        .json(&serde_json::json!({
            "title": "Checkpoint Quiz",
            "max_attempts": max_attempts,
            "passing_score": passing_score,
            "questions": [
                {
                    "question": "Pick the first option",
                    "question_type": "multiple_choice",
                    "options": ["A", "B", "C"],
                    "correct_answer": [0],
                    "points": 1
                },
                {
                    "question": "Pick the third option",
                    "question_type": "multiple_choice",
                    "options": ["A", "B", "C"],
                    "correct_answer": [2],
                    "points": 1
                }
            ]
        }))
        .send()
        .await
        .expect("Create quiz failed");
    assert_eq!(resp.status().as_u16(), 201);

    resp.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap()
}

async fn enroll(client: &reqwest::Client, address: &str, student_token: &str, course_id: i64) {
    let resp = client
        .post(&format!("{}/api/courses/{}/enroll", address, course_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .expect("Enroll failed");
    assert_eq!(resp.status().as_u16(), 201);
}

/// Fetches the quiz as the given user and returns the question ids in order.
async fn question_ids(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    quiz_id: i64,
) -> Vec<i64> {
    let quiz: serde_json::Value = client
        .get(&format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    quiz["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn end_to_end_attempt_flow_scores_half() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (instructor_token, _) = seed_and_login(&pool, &client, &address, "instructor").await;
    let (student_token, _) = seed_and_login(&pool, &client, &address, "student").await;

    let course_id = create_course(&client, &address, &instructor_token).await;
    let quiz_id =
        create_two_question_quiz(&client, &address, &instructor_token, course_id, 0, 50).await;
    enroll(&client, &address, &student_token, course_id).await;

    let ids = question_ids(&client, &address, &student_token, quiz_id).await;
    assert_eq!(ids.len(), 2);

    // Act: start an attempt
    let start_resp = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .expect("Start attempt failed");
    assert_eq!(start_resp.status().as_u16(), 201);

    let start_body: serde_json::Value = start_resp.json().await.unwrap();
    let attempt_id = start_body["attempt"]["id"].as_i64().unwrap();
    assert_eq!(start_body["attempt"]["total_questions"], 2);
    assert!(start_body["attempt"]["completed_at"].is_null());

    // Act: Q1 answered correctly (index 0), Q2 wrong (index 1)
    let submit_resp = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({
            "answers": [
                { "question_id": ids[0], "answer": 0 },
                { "question_id": ids[1], "answer": 1 }
            ]
        }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(submit_resp.status().as_u16(), 200);

    let result: serde_json::Value = submit_resp.json().await.unwrap();
    assert_eq!(result["correct_count"], 1);
    assert_eq!(result["score"], 50);
    assert_eq!(result["passed"], true); // 50 >= passing_score 50

    // Assert: second submit is a conflict and the score is unchanged
    let resubmit = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({
            "answers": [
                { "question_id": ids[0], "answer": 0 },
                { "question_id": ids[1], "answer": 2 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resubmit.status().as_u16(), 409);

    let attempt: serde_json::Value = client
        .get(&format!("{}/api/attempts/{}", address, attempt_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["attempt"]["score"], 50);
    assert_eq!(attempt["attempt"]["correct_answers"], 1);
    assert_eq!(attempt["attempt"]["passed"], true);
    assert_eq!(attempt["answers"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn option_string_submission_matches_index_canonical() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (instructor_token, _) = seed_and_login(&pool, &client, &address, "instructor").await;
    let (student_token, _) = seed_and_login(&pool, &client, &address, "student").await;

    let course_id = create_course(&client, &address, &instructor_token).await;
    enroll(&client, &address, &student_token, course_id).await;

    // Canonical answer stored as the literal option string.
    let resp = client
        .post(&format!("{}/api/courses/{}/quizzes", address, course_id))
        .header("Authorization", format!("Bearer {}", instructor_token))
        .json(&serde_json::json!({
            "title": "Encoding Quiz",
            "passing_score": 100,
            "questions": [
                {
                    "question": "Capital of France?",
                    "question_type": "multiple_choice",
                    "options": ["Paris", "London", "Berlin"],
                    "correct_answer": ["Paris"],
                    "points": 1
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let quiz_id = resp.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let ids = question_ids(&client, &address, &student_token, quiz_id).await;

    // Submit the matching index; the normalizer resolves it into the
    // option list before comparing.
    let start: serde_json::Value = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = start["attempt"]["id"].as_i64().unwrap();

    let result: serde_json::Value = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({
            "answers": [ { "question_id": ids[0], "answer": 0 } ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(result["score"], 100);
    assert_eq!(result["passed"], true);
}

#[tokio::test]
async fn max_attempts_limit_denies_third_start() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (instructor_token, _) = seed_and_login(&pool, &client, &address, "instructor").await;
    let (student_token, _) = seed_and_login(&pool, &client, &address, "student").await;

    let course_id = create_course(&client, &address, &instructor_token).await;
    let quiz_id =
        create_two_question_quiz(&client, &address, &instructor_token, course_id, 2, 70).await;
    enroll(&client, &address, &student_token, course_id).await;

    for _ in 0..2 {
        let resp = client
            .post(&format!("{}/api/quizzes/{}/attempts", address, quiz_id))
            .header("Authorization", format!("Bearer {}", student_token))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);
    }

    // Abandoned attempts still count toward the limit.
    let third = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap();
    assert_eq!(third.status().as_u16(), 409);
}

#[tokio::test]
async fn start_requires_enrollment() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (instructor_token, _) = seed_and_login(&pool, &client, &address, "instructor").await;
    let (student_token, _) = seed_and_login(&pool, &client, &address, "student").await;

    let course_id = create_course(&client, &address, &instructor_token).await;
    let quiz_id =
        create_two_question_quiz(&client, &address, &instructor_token, course_id, 0, 70).await;

    // Eligible (active quiz, no attempts used) but not enrolled: the denial
    // must be the distinct Forbidden, not the eligibility Conflict.
    let resp = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn answer_keys_redacted_for_students() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (instructor_token, _) = seed_and_login(&pool, &client, &address, "instructor").await;
    let (student_token, _) = seed_and_login(&pool, &client, &address, "student").await;

    let course_id = create_course(&client, &address, &instructor_token).await;
    let quiz_id =
        create_two_question_quiz(&client, &address, &instructor_token, course_id, 0, 70).await;
    enroll(&client, &address, &student_token, course_id).await;

    let student_view: serde_json::Value = client
        .get(&format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    for question in student_view["questions"].as_array().unwrap() {
        assert!(question.get("correct_answer").is_none());
        assert!(question.get("explanation").is_none());
    }

    let instructor_view: serde_json::Value = client
        .get(&format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", instructor_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    for question in instructor_view["questions"].as_array().unwrap() {
        assert!(question.get("correct_answer").is_some());
    }
}

#[tokio::test]
async fn submitting_unknown_question_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (instructor_token, _) = seed_and_login(&pool, &client, &address, "instructor").await;
    let (student_token, _) = seed_and_login(&pool, &client, &address, "student").await;

    let course_id = create_course(&client, &address, &instructor_token).await;
    let quiz_id =
        create_two_question_quiz(&client, &address, &instructor_token, course_id, 0, 70).await;
    enroll(&client, &address, &student_token, course_id).await;

    let start: serde_json::Value = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = start["attempt"]["id"].as_i64().unwrap();

    let resp = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({
            "answers": [ { "question_id": 999999999, "answer": 0 } ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    // The failed submit left the attempt open; a corrected one succeeds.
    let ids = question_ids(&client, &address, &student_token, quiz_id).await;
    let retry = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({
            "answers": [ { "question_id": ids[0], "answer": 0 } ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status().as_u16(), 200);
}

#[tokio::test]
async fn submit_by_non_owner_is_forbidden() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (instructor_token, _) = seed_and_login(&pool, &client, &address, "instructor").await;
    let (student_token, _) = seed_and_login(&pool, &client, &address, "student").await;
    let (other_token, _) = seed_and_login(&pool, &client, &address, "student").await;

    let course_id = create_course(&client, &address, &instructor_token).await;
    let quiz_id =
        create_two_question_quiz(&client, &address, &instructor_token, course_id, 0, 70).await;
    enroll(&client, &address, &student_token, course_id).await;

    let start: serde_json::Value = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = start["attempt"]["id"].as_i64().unwrap();

    let ids = question_ids(&client, &address, &student_token, quiz_id).await;
    let resp = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", format!("Bearer {}", other_token))
        .json(&serde_json::json!({
            "answers": [ { "question_id": ids[0], "answer": 0 } ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}
