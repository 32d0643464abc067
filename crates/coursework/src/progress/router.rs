use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::domain::{
    AttemptPhase, AttemptSubmission, AttemptView, CourseId, CourseRegistration, UserId,
    UserRegistration,
};
use super::repository::{ProgressRepository, RepositoryError};
use super::service::{ProgressCoordinator, ProgressServiceError};

/// Router builder exposing result submission, profile, and ranking endpoints.
pub fn progress_router<R>(service: Arc<ProgressCoordinator<R>>) -> Router
where
    R: ProgressRepository + 'static,
{
    Router::new()
        .route("/api/v1/results", post(submit_handler::<R>))
        .route("/api/v1/users", post(register_user_handler::<R>))
        .route("/api/v1/users/:user_id", get(user_handler::<R>))
        .route(
            "/api/v1/users/:user_id/results/:phase",
            get(results_handler::<R>),
        )
        .route("/api/v1/users/:user_id/ranking", get(course_ranking_handler::<R>))
        .route("/api/v1/courses", post(register_course_handler::<R>))
        .route(
            "/api/v1/courses/:course_id/ranking",
            get(course_leaderboard_handler::<R>),
        )
        .route("/api/v1/ranking", get(leaderboard_handler::<R>))
        .with_state(service)
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<ProgressCoordinator<R>>>,
    Json(submission): Json<AttemptSubmission>,
) -> Response
where
    R: ProgressRepository + 'static,
{
    match service.submit_payload(submission) {
        Ok(result) if result.phase() == AttemptPhase::Started => (
            StatusCode::CREATED,
            Json(json!({ "message": "course result created" })),
        )
            .into_response(),
        Ok(result) => (StatusCode::CREATED, Json(result.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn register_user_handler<R>(
    State(service): State<Arc<ProgressCoordinator<R>>>,
    Json(registration): Json<UserRegistration>,
) -> Response
where
    R: ProgressRepository + 'static,
{
    match service.register_user(registration) {
        Ok(user) => (StatusCode::CREATED, Json(user.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn register_course_handler<R>(
    State(service): State<Arc<ProgressCoordinator<R>>>,
    Json(registration): Json<CourseRegistration>,
) -> Response
where
    R: ProgressRepository + 'static,
{
    match service.register_course(registration) {
        Ok(course) => (StatusCode::CREATED, Json(course.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn user_handler<R>(
    State(service): State<Arc<ProgressCoordinator<R>>>,
    Path(user_id): Path<u64>,
) -> Response
where
    R: ProgressRepository + 'static,
{
    match service.user(UserId(user_id)) {
        Ok(user) => (StatusCode::OK, Json(user.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn results_handler<R>(
    State(service): State<Arc<ProgressCoordinator<R>>>,
    Path((user_id, phase)): Path<(u64, String)>,
) -> Response
where
    R: ProgressRepository + 'static,
{
    let phase = match phase.parse::<AttemptPhase>() {
        Ok(phase) => phase,
        Err(err) => return error_response(err.into()),
    };
    let user_id = UserId(user_id);
    let attempts = match phase {
        AttemptPhase::Started => service.started_courses(user_id),
        AttemptPhase::Finished => service.finished_courses(user_id),
    };

    match attempts {
        Ok(attempts) => {
            let views: Vec<AttemptView> = attempts.iter().map(|attempt| attempt.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn course_ranking_handler<R>(
    State(service): State<Arc<ProgressCoordinator<R>>>,
    Path(user_id): Path<u64>,
) -> Response
where
    R: ProgressRepository + 'static,
{
    match service.course_ranking(UserId(user_id)) {
        Ok(standings) => (StatusCode::OK, Json(standings)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn course_leaderboard_handler<R>(
    State(service): State<Arc<ProgressCoordinator<R>>>,
    Path(course_id): Path<u64>,
) -> Response
where
    R: ProgressRepository + 'static,
{
    match service.course_leaderboard(CourseId(course_id)) {
        Ok(results) => {
            let views: Vec<AttemptView> = results.iter().map(|attempt| attempt.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn leaderboard_handler<R>(
    State(service): State<Arc<ProgressCoordinator<R>>>,
) -> Response
where
    R: ProgressRepository + 'static,
{
    match service.leaderboard() {
        Ok(standings) => (StatusCode::OK, Json(standings)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn status_for(error: &ProgressServiceError) -> StatusCode {
    match error {
        ProgressServiceError::Invalid(_) | ProgressServiceError::Scoring(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ProgressServiceError::CourseNotFound(_)
        | ProgressServiceError::UserNotFound(_)
        | ProgressServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ProgressServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ProgressServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: ProgressServiceError) -> Response {
    let status = status_for(&error);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %error, "progress request failed");
    }
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}
