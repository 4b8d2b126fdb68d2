//! HTTP binding.
//!
//! | Route | Body | Reply |
//! |---|---|---|
//! | `POST /describe` | `{filepath}` | table description |
//! | `POST /execute` | `{filepath, queries}` | array of payloads |
//! | `POST /execute_one` | `{filepath, query}` | one payload |
//! | `POST /rpc` | one JSON-RPC message | JSON-RPC reply, or `202` for notifications |
//! | `GET /healthz` | | `{"status":"ok"}` |
//!
//! Failures reply with `{"error_code", "error_message"}`.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use csvq_query::{NormalizedPayload, TableDescription};
use csvq_result::ErrorKind;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::gateway::Gateway;
use crate::rpc::Dispatcher;
use crate::tools::{DescribeArgs, ExecuteQueriesArgs, ExecuteQueryArgs};

/// Error body returned by every route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status_code: StatusCode,
    pub error_code: String,
    pub error_message: String,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    if kind.is_query_error() {
        return StatusCode::BAD_REQUEST;
    }
    match kind {
        ErrorKind::PolicyViolation => StatusCode::FORBIDDEN,
        ErrorKind::SourceUnreadable => StatusCode::NOT_FOUND,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl From<csvq_result::Error> for ErrorResponse {
    fn from(err: csvq_result::Error) -> Self {
        let kind = err.kind();
        ErrorResponse {
            status_code: status_for(kind),
            error_code: kind.code().to_string(),
            error_message: err.message().to_string(),
        }
    }
}

impl From<JsonRejection> for ErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        ErrorResponse {
            status_code: rejection.status(),
            error_code: "INVALID_REQUEST_BODY".to_string(),
            error_message: rejection.body_text(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error_message.fmt(f)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route("/describe", post(handle_describe))
        .route("/execute", post(handle_execute))
        .route("/execute_one", post(handle_execute_one))
        .route("/rpc", post(handle_rpc))
        .route("/healthz", get(handle_health))
        .with_state(Dispatcher::new(gateway))
}

/// Bind `addr` and return the bound address with the server future. The future resolves after
/// SIGINT or SIGTERM once in-flight requests finish.
pub async fn run_server(
    gateway: Gateway,
    addr: SocketAddr,
) -> std::io::Result<(SocketAddr, impl Future<Output = std::io::Result<()>>)> {
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    let app = router(gateway);

    let fut = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };
    Ok((addr, fut))
}

#[tracing::instrument(skip_all)]
async fn handle_describe(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<DescribeArgs>, JsonRejection>,
) -> Result<Json<TableDescription>, ErrorResponse> {
    let Json(args) = body?;
    let description = dispatcher.gateway().describe(&args.filepath).await?;
    Ok(Json(description))
}

#[tracing::instrument(skip_all)]
async fn handle_execute(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<ExecuteQueriesArgs>, JsonRejection>,
) -> Result<Json<Vec<NormalizedPayload>>, ErrorResponse> {
    let Json(args) = body?;
    let payloads = dispatcher
        .gateway()
        .execute_many(&args.filepath, args.queries.as_slice())
        .await?;
    Ok(Json(payloads))
}

#[tracing::instrument(skip_all)]
async fn handle_execute_one(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<ExecuteQueryArgs>, JsonRejection>,
) -> Result<Json<NormalizedPayload>, ErrorResponse> {
    let Json(args) = body?;
    let payload = dispatcher
        .gateway()
        .execute_one(&args.filepath, &args.query)
        .await?;
    Ok(Json(payload))
}

#[tracing::instrument(skip_all)]
async fn handle_rpc(State(dispatcher): State<Dispatcher>, body: String) -> Response {
    match dispatcher.handle_line(&body).await {
        Some(reply) => ([(header::CONTENT_TYPE, "application/json")], reply).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                (Err(err), _) | (_, Err(err)) => {
                    tracing::error!(error = %err, "failed to install signal handlers");
                    return std::future::pending().await;
                }
            };
        tokio::select! {
            _ = sigint.recv() => tracing::info!(signal = "SIGINT", "shutdown signal"),
            _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "shutdown signal"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown signal"),
            Err(err) => {
                tracing::error!(error = %err, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (csvq_result::Error::PolicyViolation("p".into()), StatusCode::FORBIDDEN),
            (csvq_result::Error::SourceUnreadable("u".into()), StatusCode::NOT_FOUND),
            (
                csvq_result::Error::SourceMalformed("m".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (csvq_result::Error::QuerySyntaxError("s".into()), StatusCode::BAD_REQUEST),
            (csvq_result::Error::QuerySemanticError("q".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            let response = ErrorResponse::from(err);
            assert_eq!(response.status_code, status);
        }
    }

    #[test]
    fn error_body_has_code_and_message() {
        let response = ErrorResponse::from(csvq_result::Error::SourceMalformed("ragged".into()));
        assert_eq!(
            serde_json::to_value(&response).expect("json"),
            json!({"error_code": "SOURCE_MALFORMED", "error_message": "ragged"})
        );
    }
}
