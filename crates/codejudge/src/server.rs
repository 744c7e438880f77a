//! HTTP front end
//!
//! `POST /execute` runs one invocation and `POST /judge` runs a whole
//! submission. Judged failures are still `200`; only malformed requests
//! (`400`) and host failures (`500`) use error statuses.

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::judge::{Judge, JudgeError};
use crate::types::{ExecutionRequest, ExecutionResult, Submission, SubmissionVerdict, Verdict};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Body of `POST /execute`; every field is checked by hand so a missing one
/// is a `400` with a readable message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteBody {
    language: Option<String>,
    code: Option<String>,
    test_input: Option<Vec<Value>>,
    function_name: Option<String>,
    time_limit_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    success: bool,
    status: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    logs: Vec<String>,
    runtime: u64,
    memory: u64,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            success: result.success,
            status: result.status,
            output: result.stdout,
            logs: result.stderr_lines,
            runtime: result.runtime_ms,
            memory: result.memory_mb,
        }
    }
}

#[derive(Debug, Serialize)]
struct LanguageInfo {
    id: String,
    name: String,
    image: String,
    compiled: bool,
}

/// Build the router over `judge`
pub fn router(judge: Judge) -> Router {
    let body_limit = judge.config().server.max_body_kb.saturating_mul(1024);

    Router::new()
        .route("/execute", post(execute_handler))
        .route("/judge", post(judge_handler))
        .route("/languages", get(languages_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(judge)
}

/// Serve until ctrl-c or SIGTERM
pub async fn serve(judge: Judge, bind: &str) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: bind.to_owned(),
            source,
        })?;
    info!(addr = %listener.local_addr()?, "codejudge server listening");

    axum::serve(listener, router(judge))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("codejudge server shut down");
    Ok(())
}

async fn execute_handler(
    State(judge): State<Judge>,
    body: Result<Json<ExecuteBody>, JsonRejection>,
) -> ApiResult<ExecuteResponse> {
    let Json(body) = body.map_err(rejection)?;

    let language = required(body.language, "language")?;
    let code = required(body.code, "code")?;
    let args = body
        .test_input
        .ok_or_else(|| bad_request("missing required field 'testInput'"))?;

    let mut request = ExecutionRequest::new(language, code).with_args(args);
    if let Some(name) = body.function_name.filter(|name| !name.is_empty()) {
        request = request.with_function_name(name);
    }
    request.time_limit_ms = body.time_limit_ms;

    let result = judge.execute(&request).await.map_err(judge_error)?;
    Ok(Json(result.into()))
}

async fn judge_handler(
    State(judge): State<Judge>,
    body: Result<Json<Submission>, JsonRejection>,
) -> ApiResult<SubmissionVerdict> {
    let Json(submission) = body.map_err(rejection)?;
    let verdict = judge.judge(&submission).await.map_err(judge_error)?;
    Ok(Json(verdict))
}

async fn languages_handler(State(judge): State<Judge>) -> Json<Vec<LanguageInfo>> {
    let config = judge.config();
    let languages = config
        .language_ids()
        .into_iter()
        .filter_map(|id| {
            config.languages.get(id).map(|language| LanguageInfo {
                id: id.to_owned(),
                name: language.name.clone(),
                image: language.image.clone(),
                compiled: language.is_compiled(),
            })
        })
        .collect();
    Json(languages)
}

async fn health_handler(State(judge): State<Judge>) -> (StatusCode, Json<Value>) {
    match judge.health().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(err) => {
            warn!(%err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": err.to_string() })),
            )
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| bad_request(&format!("missing required field '{field}'")))
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn rejection(rejection: JsonRejection) -> ApiError {
    let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(json!({ "error": rejection.body_text() })))
}

fn judge_error(err: JudgeError) -> ApiError {
    match err {
        JudgeError::Request(message) => bad_request(&message),
        JudgeError::Host(err) => {
            error!(%err, "host failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
