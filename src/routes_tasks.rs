// --------------------------------------------------
// Handles API endpoints for the task collection.
//
// Responsibilities:
// - List tasks (by status, sorted, upcoming)
// - Create / edit / delete tasks
// - Change a task's status
// - Run the expiry sweep on demand
// -------------------------------------------------

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::models::{StatusFilter, TaskInput, TaskStatus};

#[derive(Debug, Deserialize)]
pub struct TasksQuery {
    pub status: Option<String>, // "all" | "active" | "completed" | "expired" | 0..=2
}

#[derive(Debug, Deserialize)]
pub struct SortedQuery {
    pub status: Option<String>,
    pub asc: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatusInput {
    pub status: TaskStatus,
}

fn parse_filter(raw: Option<&str>) -> Result<StatusFilter, (StatusCode, String)> {
    raw.unwrap_or("all")
        .parse()
        .map_err(|e: crate::error::UnknownStatus| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn parse_id(raw: &str) -> Result<Uuid, (StatusCode, &'static str)> {
    Uuid::parse_str(raw).map_err(|_| (StatusCode::BAD_REQUEST, "invalid id"))
}

// -----------------------------
// GET /api/tasks?status=
// Tasks in insertion order, reloaded from disk
// -----------------------------
pub async fn get_tasks(State(state): State<AppState>, Query(q): Query<TasksQuery>) -> impl IntoResponse {
    let filter = match parse_filter(q.status.as_deref()) {
        Ok(f) => f,
        Err(e) => return e.into_response(),
    };

    let tasks = state.engine.lock().store.get_tasks_by_status(filter);
    Json(tasks).into_response()
}

// -----------------------------
// GET /api/tasks/sorted?status=&asc=
// Dated tasks by due instant, then undated tasks by priority
// -----------------------------
pub async fn get_sorted_tasks(State(state): State<AppState>, Query(q): Query<SortedQuery>) -> impl IntoResponse {
    let filter = match parse_filter(q.status.as_deref()) {
        Ok(f) => f,
        Err(e) => return e.into_response(),
    };

    let sorted = state
        .engine
        .lock()
        .store
        .get_sorted_tasks(filter, q.asc.unwrap_or(true));
    Json(sorted).into_response()
}

// -----------------------------
// GET /api/tasks/upcoming?count=
// null when no active task has a deadline
// -----------------------------
pub async fn get_upcoming_tasks(State(state): State<AppState>, Query(q): Query<UpcomingQuery>) -> impl IntoResponse {
    let mut engine = state.engine.lock();
    let count = q.count.unwrap_or(engine.upcoming_count());
    Json(engine.store.get_upcoming_tasks(count))
}

// -----------------------------
// POST /api/tasks
// Validates the form and saves the new task
// -----------------------------
pub async fn create_task(State(state): State<AppState>, Json(input): Json<TaskInput>) -> impl IntoResponse {
    match state.engine.lock().create_task(&input) {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

// -----------------------------
// DELETE /api/tasks/:id
// Always ok, even when nothing matched
// -----------------------------
pub async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };

    state.engine.lock().delete_task(id);
    Json(serde_json::json!({ "ok": true })).into_response()
}

// -----------------------------
// POST /api/tasks/:id/edit
// Returns the filled-in form and removes the task
// -----------------------------
pub async fn edit_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };

    match state.engine.lock().edit_task(id) {
        Some(form) => Json(form).into_response(),
        None => (StatusCode::NOT_FOUND, "task not found").into_response(),
    }
}

// -----------------------------
// PUT /api/tasks/:id/status
// Moves a task to another status
// -----------------------------
pub async fn change_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<StatusInput>,
) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };

    match state.engine.lock().change_task_status(id, input.status) {
        Some(task) => Json(task).into_response(),
        None => (StatusCode::NOT_FOUND, "task not found").into_response(),
    }
}

// -----------------------------
// POST /api/tasks/expire
// Runs the expiry sweep, returns the tasks it expired
// -----------------------------
pub async fn expire_tasks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.lock().sweep())
}
