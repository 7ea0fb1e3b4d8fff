use std::time::Duration;

// Import axum routing utilities and Router
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir; // Serves the widget page (HTML/CSS/JS)
use tracing::info;
use tracing_subscriber::EnvFilter;

use task_widget::app::{self, AppState};
use task_widget::clock::TimeService;
use task_widget::config::{config_path, load_config};
use task_widget::{routes_board, routes_tasks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = config_path();
    let config = load_config(&path)?;
    info!(path = %path.display(), "config loaded");

    let (state, fired_rx) = AppState::from_config(&config, TimeService::system());

    // First render: expire anything overdue and arm the first reminder
    let board = state.engine.lock().board();
    info!(
        active = board.active.len(),
        expired = board.newly_expired.len(),
        "initial board built"
    );

    tokio::spawn(app::run_reminder_loop(state.clone(), fired_rx));
    let every = Duration::from_secs(config.sweep_interval_secs.max(1));
    tokio::spawn(app::run_sweep_loop(state.clone(), every));

    let api = Router::new()
        // board
        .route("/board", get(routes_board::get_board))
        .route("/clock", get(routes_board::get_clock))
        // tasks
        .route("/tasks", get(routes_tasks::get_tasks).post(routes_tasks::create_task))
        .route("/tasks/sorted", get(routes_tasks::get_sorted_tasks))
        .route("/tasks/upcoming", get(routes_tasks::get_upcoming_tasks))
        .route("/tasks/expire", post(routes_tasks::expire_tasks))
        .route("/tasks/:id", delete(routes_tasks::delete_task))
        .route("/tasks/:id/edit", post(routes_tasks::edit_task))
        .route("/tasks/:id/status", put(routes_tasks::change_task_status))
        // reminders
        .route("/reminders", get(routes_board::get_reminders))
        .route("/reminders/:id/complete", post(routes_board::complete_reminder))
        .route("/reminders/:id/dismiss", post(routes_board::dismiss_reminder))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api)
        .nest_service("/", ServeDir::new(&config.static_dir));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let addr = listener.local_addr()?;
    info!("widget running at http://{addr}");
    info!("api base: http://{addr}/api");

    axum::serve(listener, app).await?;
    Ok(())
}
