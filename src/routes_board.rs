use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::clock::TimeSnapshot;
use crate::notify::Reminder;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemindersResponse {
    pub now: TimeSnapshot,
    pub reminders: Vec<Reminder>,
}

// -----------------------------
// GET /api/board
// One refresh of the widget: sweep, re-arm, every list
// -----------------------------
pub async fn get_board(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.lock().board())
}

// -----------------------------
// GET /api/clock
// Header date and time in every display format
// -----------------------------
pub async fn get_clock(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.lock().time().now())
}

// -----------------------------
// GET /api/reminders
// Fired reminders still waiting on the user
// -----------------------------
pub async fn get_reminders(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.lock();
    Json(RemindersResponse {
        now: engine.time().now(),
        reminders: engine.reminders().to_vec(),
    })
}

// -----------------------------
// POST /api/reminders/:id/complete
// "Mark as complete" on the reminder
// -----------------------------
pub async fn complete_reminder(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return (StatusCode::BAD_REQUEST, "invalid id").into_response();
    };

    match state.engine.lock().complete_reminder(id) {
        Some(task) => Json(task).into_response(),
        None => (StatusCode::NOT_FOUND, "no reminder for this task").into_response(),
    }
}

// -----------------------------
// POST /api/reminders/:id/dismiss
// Closing the reminder expires the task
// -----------------------------
pub async fn dismiss_reminder(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return (StatusCode::BAD_REQUEST, "invalid id").into_response();
    };

    match state.engine.lock().dismiss_reminder(id) {
        Some(task) => Json(task).into_response(),
        None => (StatusCode::NOT_FOUND, "no reminder for this task").into_response(),
    }
}
