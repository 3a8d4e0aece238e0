//! Inbound HTTP surface exposed to the admin center.
//!
//! Bodies are read raw and decoded with `serde_json` so malformed JSON
//! produces the protocol's own envelope instead of a framework rejection.
//! Status codes and bodies mirror what the admin center expects from an
//! executor: `/run` acceptance only confirms admission, never completion.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
};
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::executor::dispatch::Dispatcher;
use crate::logquery::{LogQueryFn, malformed_log_response};
use crate::protocol::{
    ACCESS_TOKEN_HEADER, FAILURE_CODE, HandleCallbackParam, IdleBeatParams, KillParams, LogParams,
    ReturnEnvelope, TriggerParams,
};

/// State shared across the executor's inbound handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub log_query: LogQueryFn,
    /// When set, every inbound call must carry the matching token header.
    pub access_token: Option<String>,
}

/// Build the executor's inbound router.
pub fn executor_routes(state: AppState) -> Router {
    Router::new()
        .route("/run", post(run_task))
        .route("/kill", post(kill_task))
        .route("/log", post(task_log))
        .route("/beat", post(beat))
        .route("/idleBeat", post(idle_beat))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token,
        ))
        .with_state(state)
}

/// Reject requests whose access token does not match the configured one.
async fn require_access_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(expected) = &state.access_token {
        let provided = req
            .headers()
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!(path = %req.uri().path(), "Access token mismatch");
            return (
                StatusCode::OK,
                Json(ReturnEnvelope::<String>::failure("access token mismatch")),
            )
                .into_response();
        }
    }
    next.run(req).await
}

// ── /run ────────────────────────────────────────────────────────────────

async fn run_task(State(state): State<AppState>, body: String) -> Response {
    let params: TriggerParams = match serde_json::from_str(&body) {
        Ok(params) => params,
        Err(e) => {
            warn!(error = %e, "Malformed trigger request");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(vec![HandleCallbackParam::new(
                    &TriggerParams::default(),
                    FAILURE_CODE,
                    "params err",
                )]),
            )
                .into_response();
        }
    };

    info!(
        job_id = params.job_id,
        handler = %params.executor_handler,
        strategy = %params.executor_block_strategy,
        log_id = params.log_id,
        "Trigger received"
    );

    match state.dispatcher.dispatch(params.clone()).await {
        Ok(()) => (StatusCode::OK, Json(ReturnEnvelope::<String>::success())).into_response(),
        Err(DispatchError::HandlerNotRegistered { .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(vec![HandleCallbackParam::new(
                &params,
                FAILURE_CODE,
                "task not registered",
            )]),
        )
            .into_response(),
        Err(DispatchError::AlreadyRunning { .. }) => (
            StatusCode::OK,
            Json(vec![HandleCallbackParam::new(
                &params,
                FAILURE_CODE,
                "task already running",
            )]),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ReturnEnvelope::<String>::failure(e.to_string())),
        )
            .into_response(),
    }
}

// ── /kill ───────────────────────────────────────────────────────────────

async fn kill_task(State(state): State<AppState>, body: String) -> Response {
    let params: KillParams = match serde_json::from_str(&body) {
        Ok(params) => params,
        Err(e) => {
            warn!(error = %e, "Malformed kill request");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReturnEnvelope::<String>::failure("params err")),
            )
                .into_response();
        }
    };

    match state.dispatcher.kill(params.job_id).await {
        Ok(()) => (StatusCode::OK, Json(ReturnEnvelope::<String>::success())).into_response(),
        Err(e) => {
            warn!(job_id = params.job_id, "Kill requested for job that is not running");
            (StatusCode::OK, Json(ReturnEnvelope::<String>::failure(e.to_string())))
                .into_response()
        }
    }
}

// ── /log ────────────────────────────────────────────────────────────────

async fn task_log(State(state): State<AppState>, body: String) -> Response {
    let params: LogParams = match serde_json::from_str(&body) {
        Ok(params) => params,
        Err(e) => {
            warn!(error = %e, "Malformed log request");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(malformed_log_response(e)))
                .into_response();
        }
    };

    debug!(log_id = params.log_id, from_line = params.from_line_num, "Log page requested");
    (StatusCode::OK, Json((state.log_query)(params))).into_response()
}

// ── /beat, /idleBeat ────────────────────────────────────────────────────

async fn beat() -> Response {
    debug!("Heartbeat probe");
    (StatusCode::OK, Json(ReturnEnvelope::<String>::success())).into_response()
}

async fn idle_beat(State(state): State<AppState>, body: String) -> Response {
    let params: IdleBeatParams = match serde_json::from_str(&body) {
        Ok(params) => params,
        Err(e) => {
            warn!(error = %e, "Malformed idleBeat request");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReturnEnvelope::<String>::failure("params err")),
            )
                .into_response();
        }
    };

    if state.dispatcher.is_idle(params.job_id).await {
        (StatusCode::OK, Json(ReturnEnvelope::<String>::success())).into_response()
    } else {
        debug!(job_id = params.job_id, "idleBeat: job busy");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ReturnEnvelope::<String>::failure("job is busy")),
        )
            .into_response()
    }
}
