// tests/api_tests.rs

//! End-to-end tests against a real Postgres. They are skipped when
//! DATABASE_URL is not set.

use exam_portal::{
    config::Config,
    routes,
    state::AppState,
    utils::jwt::{ROLE_ADMIN, ROLE_STUDENT, sign_jwt},
};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    pool: PgPool,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Spawns the app on a random port. Returns `None` without a database.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config::for_tests(&database_url, SECRET);
    let state = AppState::new(pool.clone(), config).expect("state");
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
    })
}

async fn seed_user(pool: &PgPool, role: &str) -> (i64, String) {
    let email = format!("{}@example.test", uuid::Uuid::new_v4());
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (name, email, register_number, department, year, role)
         VALUES ('Test User', $1, 'REG001', 'CSE', 2, $2)
         RETURNING id",
    )
    .bind(&email)
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap();

    let token = sign_jwt(id, role, SECRET, 600).unwrap();
    (id, format!("Bearer {}", token))
}

async fn seed_course(pool: &PgPool) -> i64 {
    sqlx::query_scalar(
        r#"INSERT INTO courses (name, level, years, departments)
           VALUES ($1, '1', '[2]'::jsonb, '["CSE"]'::jsonb)
           RETURNING id"#,
    )
    .bind(format!("Course {}", uuid::Uuid::new_v4()))
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_mcqs(pool: &PgPool, course_id: i64, count: i64) {
    for i in 0..count {
        sqlx::query(
            "INSERT INTO mcqs (course_id, question, option1, option2, option3, option4, correct_option)
             VALUES ($1, $2, 'a', 'b', 'c', 'd', '1')",
        )
        .bind(course_id)
        .bind(format!("Question {}", i))
        .execute(pool)
        .await
        .unwrap();
    }
}

async fn seed_booking(pool: &PgPool, user_id: i64, course_id: i64, minutes_from_now: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO booked_courses (user_id, course_id, venue, slot_time)
         VALUES ($1, $2, 'Lab 1', NOW() + make_interval(mins => $3::INT))
         RETURNING id",
    )
    .bind(user_id)
    .bind(course_id)
    .bind(minutes_from_now as i32)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn csv_form(course_id: i64, csv: &str) -> Form {
    Form::new().text("course_id", course_id.to_string()).part(
        "file",
        Part::bytes(csv.as_bytes().to_vec()).file_name("bank.csv"),
    )
}

#[tokio::test]
async fn bulk_upload_inserts_then_reports_duplicates() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = seed_user(&app.pool, ROLE_ADMIN).await;
    let course_id = seed_course(&app.pool).await;

    let csv = "question,option1,option2,option3,option4,correct_option\n\
               Q1,a,b,c,d,1\n\
               Q2,a,b,,d,2\n\
               Q3,a,b,c,d,3\n\
               Q3,a,b,c,d,3\n";

    let first: Value = app
        .client
        .post(app.url("/api/admin/mcqs/bulk-upload"))
        .header("Authorization", &admin)
        .multipart(csv_form(course_id, csv))
        .send()
        .await
        .expect("upload failed")
        .json()
        .await
        .unwrap();

    assert_eq!(first["message"], "Bulk upload successful");
    assert_eq!(first["inserted"], 2);
    assert_eq!(first["skipped"], 1);
    assert_eq!(first["invalid"], 1);
    assert_eq!(first["errors"][0]["row"], 3);

    let second = app
        .client
        .post(app.url("/api/admin/mcqs/bulk-upload"))
        .header("Authorization", &admin)
        .multipart(csv_form(course_id, csv))
        .send()
        .await
        .expect("upload failed");
    assert_eq!(second.status().as_u16(), 200);
    let second: Value = second.json().await.unwrap();
    assert_eq!(second["message"], "No new unique MCQs to insert");
    assert_eq!(second["duplicates"], 2);

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mcqs WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn all_invalid_upload_is_400_with_row_errors() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = seed_user(&app.pool, ROLE_ADMIN).await;
    let course_id = seed_course(&app.pool).await;

    let response = app
        .client
        .post(app.url("/api/admin/mcqs/bulk-upload"))
        .header("Authorization", &admin)
        .multipart(csv_form(
            course_id,
            "question,option1,option2,option3,option4,correct_option\nQ1,a,b,c,d,\n",
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No valid entries to insert");
    assert_eq!(body["errors"][0]["row"], 2);
}

#[tokio::test]
async fn registration_then_slot_booking() {
    let Some(app) = spawn_app().await else { return };
    let (_, student) = seed_user(&app.pool, ROLE_STUDENT).await;
    let course_id = seed_course(&app.pool).await;

    let offered: Vec<Value> = app
        .client
        .get(app.url("/api/courses"))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(offered.iter().any(|c| c["id"] == course_id));

    let register_url = app.url(&format!("/api/courses/{}/register", course_id));
    let first = app.client.post(&register_url).header("Authorization", &student).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 201);
    let again = app.client.post(&register_url).header("Authorization", &student).send().await.unwrap();
    assert_eq!(again.status().as_u16(), 409);

    let slot_time = chrono::Utc::now() + chrono::Duration::days(2);
    let booked = app
        .client
        .post(app.url("/api/bookings/slot"))
        .header("Authorization", &student)
        .json(&json!({ "course_id": course_id, "venue": "Lab 2", "slot_time": slot_time }))
        .send()
        .await
        .unwrap();
    assert_eq!(booked.status().as_u16(), 201);

    let registered: Vec<Value> = app
        .client
        .get(app.url("/api/bookings/registered"))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(registered.iter().all(|r| r["course_id"] != course_id));
}

#[tokio::test]
async fn test_session_flow_records_one_score() {
    let Some(app) = spawn_app().await else { return };
    let (user_id, student) = seed_user(&app.pool, ROLE_STUDENT).await;
    let course_id = seed_course(&app.pool).await;
    seed_mcqs(&app.pool, course_id, 25).await;
    seed_booking(&app.pool, user_id, course_id, -5).await;

    let test_url = app.url(&format!("/api/tests/{}", course_id));

    let view: Value = app
        .client
        .get(&test_url)
        .header("Authorization", &student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["state"], "instructions");

    let view: Value = app
        .client
        .post(format!("{}/start", test_url))
        .header("Authorization", &student)
        .json(&json!({ "acknowledgements": [true, true, true, true, true, true] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["state"], "active");
    let questions = view["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 20);
    assert!(questions[0].get("correct_option").is_none());

    for q in questions.iter().take(5) {
        let response = app
            .client
            .put(format!("{}/answers", test_url))
            .header("Authorization", &student)
            .json(&json!({ "question_id": q["id"], "option": "1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let finish_url = format!("{}/finish", test_url);
    let result: Value = app
        .client
        .post(&finish_url)
        .header("Authorization", &student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["state"], "finalized");
    assert_eq!(result["result"]["score"], 5);

    // A second finish returns the same result and writes nothing.
    app.client
        .post(&finish_url)
        .header("Authorization", &student)
        .send()
        .await
        .unwrap();

    let scores: Vec<i64> =
        sqlx::query_scalar("SELECT score FROM test_scores WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .fetch_all(&app.pool)
            .await
            .unwrap();
    assert_eq!(scores, vec![5]);

    let reviews = app
        .client
        .post(format!("{}/reviews", test_url))
        .header("Authorization", &student)
        .json(&json!({ "requests": [{ "question_id": questions[0]["id"], "comment": "Option 2 is also right" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(reviews.status().as_u16(), 201);

    let mine: Vec<Value> = app
        .client
        .get(app.url("/api/profile/reviews"))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["status"], "Pending");
}

#[tokio::test]
async fn profile_sweeps_expired_slots() {
    let Some(app) = spawn_app().await else { return };
    let (user_id, student) = seed_user(&app.pool, ROLE_STUDENT).await;
    let expired_course = seed_course(&app.pool).await;
    let upcoming_course = seed_course(&app.pool).await;
    seed_booking(&app.pool, user_id, expired_course, -180).await;
    seed_booking(&app.pool, user_id, upcoming_course, 60 * 24).await;

    let body: Value = app
        .client
        .get(app.url("/api/profile/bookings"))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["swept"], 1);
    let bookings = body["bookings"].as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["course_id"], upcoming_course);

    let zero: i64 =
        sqlx::query_scalar("SELECT score FROM test_scores WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(expired_course)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(zero, 0);
}
