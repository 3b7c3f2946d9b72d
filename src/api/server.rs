//! HTTP server for the rowlab API.
//!
//! # API Endpoints
//!
//! | Method | Path                 | Description                           |
//! |--------|----------------------|---------------------------------------|
//! | GET    | `/health`            | Health check                          |
//! | POST   | `/api/upload`        | Upload a CSV/Excel file               |
//! | GET    | `/api/dataset`       | Current dataset                       |
//! | POST   | `/api/commands`      | Submit an instruction                 |
//! | GET    | `/api/commands`      | List all commands                     |
//! | DELETE | `/api/commands/{id}` | Remove a pending or errored command   |
//! | POST   | `/api/run`           | Run all runnable commands             |
//! | POST   | `/api/undo`          | Undo the most recent applied step     |
//! | GET    | `/api/export`        | Download the dataset as `.xlsx`       |
//! | POST   | `/api/reset`         | Drop the dataset and all commands     |
//! | GET    | `/api/logs`          | SSE stream for real-time logs         |

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{delete, get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{
    error_response, CommandView, DatasetView, RunResponse, SubmitCommandRequest, UndoResponse,
    UploadResponse,
};
use crate::error::SessionError;
use crate::export;
use crate::interpreter::AiInterpreter;
use crate::parser;
use crate::session::{RunState, Session};

type ApiError = (StatusCode, Json<Value>);

/// Shared server state: one session behind a lock, plus the interpreter.
///
/// The lock is held across a whole run, which serializes runs by
/// construction; a second `/api/run` waits rather than interleaving.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<Session>>,
    interpreter: AiInterpreter,
}

/// Start the HTTP server.
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let interpreter = AiInterpreter::from_env();
    if !interpreter.has_credentials() {
        log_error("ANTHROPIC_API_KEY is not set; commands will fail until it is");
    }

    let state = AppState {
        session: Arc::new(Mutex::new(Session::new())),
        interpreter,
    };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/dataset", get(get_dataset))
        .route("/api/commands", post(submit_command).get(list_commands))
        .route("/api/commands/{id}", delete(remove_command))
        .route("/api/run", post(run_commands))
        .route("/api/undo", post(undo))
        .route("/api/export", get(export_dataset))
        .route("/api/reset", post(reset))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("rowlab server running on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "rowlab",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// SSE endpoint for real-time log streaming.
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload a CSV or Excel file, replacing the current session.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("Read error: {}", e)))?
                    .to_vec(),
            );
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("No file provided"))?;
    let name = file_name.unwrap_or_else(|| "upload.csv".to_string());

    log_info(format!("Upload: {} ({} bytes)", name, bytes.len()));

    let dataset = parser::parse_upload(&name, &bytes).map_err(|e| {
        log_error(format!("Upload failed: {}", e));
        bad_request(&e.to_string())
    })?;

    let encoding = if name.to_lowercase().ends_with(".csv") {
        Some(parser::detect_encoding(&bytes))
    } else {
        None
    };

    log_success(format!(
        "Loaded {} rows, {} columns",
        dataset.row_count(),
        dataset.headers.len()
    ));

    let mut session = state.session.lock().await;
    session.load_dataset(dataset);
    let view = current_view(&session)?;

    Ok(Json(UploadResponse {
        dataset: view,
        encoding,
    }))
}

/// Current dataset.
async fn get_dataset(State(state): State<AppState>) -> Result<Json<DatasetView>, ApiError> {
    let session = state.session.lock().await;
    Ok(Json(current_view(&session)?))
}

/// Submit a new instruction.
async fn submit_command(
    State(state): State<AppState>,
    Json(request): Json<SubmitCommandRequest>,
) -> Result<(StatusCode, Json<CommandView>), ApiError> {
    let mut session = state.session.lock().await;
    let command = session
        .enqueue(&request.instruction)
        .map_err(session_error)?;
    Ok((StatusCode::CREATED, Json(CommandView::from(&command))))
}

/// All commands in submission order.
async fn list_commands(State(state): State<AppState>) -> Json<Vec<CommandView>> {
    let session = state.session.lock().await;
    Json(session.commands().iter().map(CommandView::from).collect())
}

/// Remove a pending or errored command.
async fn remove_command(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommandView>, ApiError> {
    let mut session = state.session.lock().await;
    let removed = session.remove_command(id).map_err(session_error)?;
    Ok(Json(CommandView::from(&removed)))
}

/// Run every runnable command.
async fn run_commands(State(state): State<AppState>) -> Result<Json<RunResponse>, ApiError> {
    let mut session = state.session.lock().await;

    log_info("Run started");
    let report = session
        .run(&state.interpreter)
        .await
        .map_err(session_error)?;

    match &report.state {
        RunState::Completed => log_success(format!("Run completed: {} applied", report.applied)),
        RunState::Interrupted { message } => log_error(format!(
            "Run interrupted after {} of {}: {}",
            report.applied, report.attempted, message
        )),
    }

    let dataset = current_view(&session)?;
    let commands = session.commands().iter().map(CommandView::from).collect();
    Ok(Json(RunResponse::new(report, dataset, commands)))
}

/// Undo the most recent applied step.
async fn undo(State(state): State<AppState>) -> Result<Json<UndoResponse>, ApiError> {
    let mut session = state.session.lock().await;
    if !session.has_dataset() {
        return Err(session_error(SessionError::NoDataset));
    }

    let undone = session.undo().map_err(session_error)?;
    if let Some(id) = undone {
        log_info(format!("Undid step produced by command {}", id));
    }

    let dataset = current_view(&session)?;
    let commands = session.commands().iter().map(CommandView::from).collect();
    Ok(Json(UndoResponse {
        undone: undone.is_some(),
        command_id: undone,
        dataset,
        commands,
    }))
}

/// Download the current dataset as an Excel workbook.
async fn export_dataset(State(state): State<AppState>) -> Result<(HeaderMap, Vec<u8>), ApiError> {
    let session = state.session.lock().await;
    let dataset = session.dataset().map_err(|_| not_found("No dataset loaded"))?;

    let bytes = export::export_to_buffer(dataset).map_err(|e| internal(&e.to_string()))?;
    let filename = export::timestamped_filename(&dataset.name);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            .parse()
            .map_err(|_| internal("header"))?,
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", filename)
            .parse()
            .map_err(|_| internal("header"))?,
    );

    log_success(format!("Exported {}", filename));
    Ok((headers, bytes))
}

/// Drop the dataset and all commands.
async fn reset(State(state): State<AppState>) -> StatusCode {
    let mut session = state.session.lock().await;
    session.reset();
    log_info("Session reset");
    StatusCode::NO_CONTENT
}

fn current_view(session: &Session) -> Result<DatasetView, ApiError> {
    let dataset = session.dataset().map_err(|_| not_found("No dataset loaded"))?;
    Ok(DatasetView::from_dataset(dataset, session.undoable_steps()))
}

fn session_error(e: SessionError) -> ApiError {
    let status = match e {
        SessionError::NoDataset | SessionError::CommandNotFound(_) => StatusCode::NOT_FOUND,
        SessionError::EmptyInstruction => StatusCode::BAD_REQUEST,
        SessionError::IllegalRemoval { .. } | SessionError::IllegalTransition { .. } => {
            StatusCode::CONFLICT
        }
    };
    (status, Json(error_response(&e.to_string())))
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error_response(message)))
}

fn not_found(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(error_response(message)))
}

fn internal(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(error_response(message)),
    )
}
