use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use codelens_exec::{
    detect::{self, AUTO},
    CodeExecutionService, ExecConfig, ExecutionRequest, ExecutionResult, ExecutionStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Longest snippet accepted by `/execute`, in characters
pub const MAX_CODE_CHARS: usize = 50_000;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Execution error: {0}")]
    ExecutionError(#[from] codelens_exec::Error),
    #[error("Server error: {0}")]
    ServerError(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::ExecutionError(_) | ServerError::ServerError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn auto() -> String {
    AUTO.to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExecuteRequest {
    pub code: String,
    #[serde(default = "auto")]
    pub language: String,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub output: String,
    pub error: String,
    pub success: bool,
    /// Wall-clock seconds
    pub execution_time: f64,
    pub status: String,
    pub timed_out: bool,
    pub truncated: bool,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            error: result.error_message().to_string(),
            success: result.success(),
            execution_time: result.execution_time.as_secs_f64(),
            status: result.status.to_string(),
            timed_out: result.timed_out(),
            truncated: result.truncated,
            output: result.stdout,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<CodeExecutionService>,
}

pub fn create_app(config: ExecConfig) -> Result<Router, ServerError> {
    let service = CodeExecutionService::new(config)?;

    let state = AppState {
        service: Arc::new(service),
    };

    let cors = CorsLayer::permissive();

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/languages", get(languages))
        .route("/execute", post(execute))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(app)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), ServerError> {
    info!("Starting code execution server on {}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::ServerError(e.to_string()))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::ServerError(e.to_string()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "available_slots": state.service.get_available_slots(),
    }))
}

async fn languages(State(state): State<AppState>) -> Json<Value> {
    let supported: Vec<&str> = state
        .service
        .supported_languages()
        .into_iter()
        .map(|language| language.as_str())
        .collect();

    Json(json!({
        "supported_languages": supported,
        "auto_detect": true,
    }))
}

fn validate(payload: &ExecuteRequest) -> Result<(), ServerError> {
    if payload.code.trim().is_empty() {
        return Err(ServerError::InvalidRequest("code must not be empty".to_string()));
    }
    if payload.code.chars().count() > MAX_CODE_CHARS {
        return Err(ServerError::InvalidRequest(format!(
            "code exceeds {} characters",
            MAX_CODE_CHARS
        )));
    }
    Ok(())
}

async fn execute(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ServerError> {
    validate(&payload)?;

    let Some(language) = detect::resolve_language_id(&payload.language, &payload.code) else {
        debug!("Could not detect language for snippet");
        let id = if payload.language.trim().is_empty() {
            AUTO
        } else {
            payload.language.trim()
        };
        let result = ExecutionResult::failed(
            ExecutionStatus::UnsupportedLanguage,
            format!("unsupported language: {}", id),
        );
        return Ok(Json(result.into()));
    };

    let mut request = ExecutionRequest::new(language, payload.code);
    request.input = payload.input;

    let result = state.service.execute(request).await;
    Ok(Json(result.into()))
}
