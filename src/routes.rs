// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{bookings, courses, mcqs, profile, reviews, scores, test_sessions},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Student routes require a valid bearer token.
/// * Admin routes additionally require the 'admin' role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match HeaderValue::from_str(&state.config.frontend_origin) {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => tracing::warn!(
            "Ignoring invalid FRONTEND_ORIGIN {:?}: {}",
            state.config.frontend_origin,
            e
        ),
    }

    let course_routes = Router::new()
        .route("/", get(courses::list_offered))
        .route("/{id}/register", post(courses::register))
        .route("/{id}/completion", get(courses::completion));

    let booking_routes = Router::new()
        .route("/registered", get(bookings::list_registered))
        .route("/slot", post(bookings::book_slot))
        .route("/{id}", delete(bookings::delete_booking));

    let profile_routes = Router::new()
        .route("/bookings", get(profile::list_bookings))
        .route("/reviews", get(profile::list_reviews));

    let test_routes = Router::new()
        .route("/{course_id}", get(test_sessions::open))
        .route("/{course_id}/start", post(test_sessions::start))
        .route("/{course_id}/answers", put(test_sessions::answer))
        .route("/{course_id}/finish", post(test_sessions::finish))
        .route("/{course_id}/reviews", post(test_sessions::submit_reviews));

    let student_routes = Router::new()
        .nest("/api/courses", course_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/tests", test_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/courses",
            get(courses::list_with_mcqs).post(courses::create_course),
        )
        .route(
            "/courses/{id}",
            put(courses::update_course).delete(courses::delete_course),
        )
        .route(
            "/mcqs/{id}",
            put(mcqs::update_mcq).delete(mcqs::delete_mcq),
        )
        .route("/mcqs/{id}/correct-option", put(mcqs::set_correct_option))
        .route(
            "/mcqs/bulk-upload",
            post(mcqs::bulk_upload).layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .route("/mcqs/generate", post(mcqs::generate_mcqs))
        .route("/scores", post(scores::store_score))
        .route("/scores/{id}/increment", post(scores::increment_score))
        .route("/reviews", get(reviews::list_pending))
        .route("/reviews/{id}", put(reviews::update_review))
        // Double middleware protection: Auth first, then Admin check
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(student_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
