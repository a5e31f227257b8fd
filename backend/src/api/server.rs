//! HTTP server for the SheetMill engine.
//!
//! # API Endpoints
//!
//! | Method | Path                   | Description                                  |
//! |--------|------------------------|----------------------------------------------|
//! | GET    | `/health`              | Health check                                 |
//! | GET    | `/api/logs`            | SSE stream for real-time logs                |
//! | POST   | `/api/batches/run`     | Run a batch on uploaded files                |
//! | POST   | `/api/templates/check` | Header pre-validation of one file            |
//! | GET    | `/exports/{job}/{file}`| Download a produced workbook                 |
//!
//! Both POST endpoints take `multipart/form-data` with a `config` part
//! holding the workspace JSON. `/api/batches/run` also takes `batchId` and
//! one file part per attached file, named `task:<taskId>`.
//! `/api/templates/check` takes `templateId` and a `file` part.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use uuid::Uuid;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, HeaderCheckResponse, RunBatchResponse};
use crate::config::{Settings, Workspace};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::export::XlsxWriter;
use crate::models::SourceFile;
use crate::parser::WorkbookAdapter;
use crate::transform::{process_batch, Definitions};
use crate::validation::check_headers;

/// Prefix of multipart file parts attached to a task.
pub const TASK_PART_PREFIX: &str = "task:";

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
}

/// Routes, without binding a socket.
pub fn router(settings: Settings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let exports = ServeDir::new(&settings.output_dir);
    let state = AppState {
        settings: Arc::new(settings),
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/logs", get(sse_logs))
        .route("/api/batches/run", post(run_batch))
        .route("/api/templates/check", post(check_template))
        .nest_service("/exports", exports)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let port = settings.port;
    let output_dir = settings.output_dir.clone();
    let app = router(settings);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 SheetMill server running on http://localhost:{}", port);
    println!("   POST /api/batches/run     - Run a batch");
    println!("   POST /api/templates/check - Check a file's headers");
    println!("   GET  /api/logs            - SSE log stream");
    println!("   GET  /exports/...         - Workbooks in {}", output_dir.display());
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) | ServerError::Pipeline(PipelineError::Config(_)) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Pipeline(PipelineError::Source(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Pipeline(PipelineError::Export(_)) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = self.to_string();
        log_error(&message);
        (status, Json(error_response(&message))).into_response()
    }
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sheetmill",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "run": "POST /api/batches/run",
            "check": "POST /api/templates/check",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // lagged receivers just skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Decoded multipart body: text parts by name, file parts in order.
#[derive(Default)]
struct Upload {
    texts: HashMap<String, String>,
    files: Vec<(String, SourceFile)>,
}

impl Upload {
    fn text(&self, name: &str) -> ServerResult<&str> {
        self.texts
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ServerError::BadRequest(format!("Missing '{}' part", name)))
    }

    fn workspace(&self) -> ServerResult<Workspace> {
        Ok(Workspace::from_json(self.text("config")?)?)
    }
}

fn is_file_part(name: &str) -> bool {
    name == "file" || name.starts_with(TASK_PART_PREFIX)
}

async fn read_upload(mut multipart: Multipart) -> ServerResult<Upload> {
    let mut upload = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if is_file_part(&name) {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            upload.files.push((name, SourceFile::new(file_name, bytes.to_vec())));
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            upload.texts.insert(name, text);
        }
    }

    Ok(upload)
}

/// Run a batch on the uploaded files and store the workbooks under a new job id.
async fn run_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ServerResult<Json<RunBatchResponse>> {
    let upload = read_upload(multipart).await?;
    let workspace = upload.workspace()?;
    let batch_id = upload.text("batchId")?.to_string();
    let settings = Arc::clone(&state.settings);

    log_info(format!(
        "📄 Batch request '{}' with {} file(s)",
        batch_id,
        upload.files.len()
    ));

    let response = tokio::task::spawn_blocking(move || -> ServerResult<RunBatchResponse> {
        let mut batch = workspace.batch_by_id(&batch_id)?.clone();

        for (part, file) in upload.files {
            let task_id = part.trim_start_matches(TASK_PART_PREFIX);
            let task = batch
                .task_mut(task_id)
                .ok_or_else(|| ServerError::BadRequest(format!("Unknown task: {}", task_id)))?;
            match workspace.template(&task.template_id) {
                Some(template) => {
                    task.attach_files(vec![file], template, &WorkbookAdapter);
                }
                // fails at run time with a FILE_SYSTEM entry
                None => task.files.push(file),
            }
        }

        let result = process_batch(
            &mut batch,
            &workspace,
            &WorkbookAdapter,
            &XlsxWriter,
            &settings.run_options(),
        )?;

        let job_id = Uuid::new_v4().to_string();
        let job_dir = settings.output_dir.join(&job_id);
        for artifact in &result.artifacts {
            artifact.write_to(&job_dir).map_err(PipelineError::from)?;
        }

        Ok(RunBatchResponse::new(job_id, result.report))
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(response))
}

/// Check one file's header row against a template.
async fn check_template(multipart: Multipart) -> ServerResult<Json<HeaderCheckResponse>> {
    let upload = read_upload(multipart).await?;
    let workspace = upload.workspace()?;
    let template_id = upload.text("templateId")?.to_string();
    let file = upload
        .files
        .into_iter()
        .find(|(part, _)| part == "file")
        .map(|(_, file)| file)
        .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    let response = tokio::task::spawn_blocking(move || -> ServerResult<HeaderCheckResponse> {
        let template = workspace.template_by_id(&template_id)?;
        let findings = check_headers(&WorkbookAdapter, &file, template);
        Ok(HeaderCheckResponse::new(
            template_id.clone(),
            file.name().to_string(),
            findings,
        ))
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, SourceError};

    #[test]
    fn test_error_status_codes() {
        let bad = ServerError::BadRequest("Missing 'config' part".into());
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);

        let config: ServerError = ConfigError::Schema(vec!["bad".into()]).into();
        assert_eq!(config.into_response().status(), StatusCode::BAD_REQUEST);

        let source = ServerError::Pipeline(SourceError::SheetNotFound("a.xlsx".into()).into());
        assert_eq!(source.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let internal = ServerError::Internal("join error".into());
        assert_eq!(internal.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_file_parts() {
        assert!(is_file_part("file"));
        assert!(is_file_part("task:task-1"));
        assert!(!is_file_part("config"));
        assert!(!is_file_part("batchId"));
    }

    #[test]
    fn test_missing_text_part() {
        let upload = Upload::default();
        assert!(matches!(upload.text("batchId"), Err(ServerError::BadRequest(_))));
    }
}
