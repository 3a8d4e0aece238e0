//! Pluggable log query hook for the `/log` endpoint.
//!
//! The admin UI pages through execution logs via `POST /log`; where those
//! logs live is entirely the embedding application's business, so the
//! engine only carries an opaque callback.

use std::sync::Arc;

use crate::protocol::{LogParams, LogResult, ReturnEnvelope};

/// Callback answering a log page request.
pub type LogQueryFn = Arc<dyn Fn(LogParams) -> ReturnEnvelope<LogResult> + Send + Sync>;

/// Default log query used when none is configured.
pub fn default_log_query() -> LogQueryFn {
    Arc::new(|params| {
        ReturnEnvelope::success_with(LogResult {
            from_line_num: params.from_line_num,
            to_line_num: 2,
            log_content: "log query handler not configured".to_string(),
            is_end: true,
        })
    })
}

/// Response for a malformed `/log` request: the error doubles as the log
/// content so it shows up in the admin UI.
pub fn malformed_log_response(error: impl std::fmt::Display) -> ReturnEnvelope<LogResult> {
    let msg = error.to_string();
    ReturnEnvelope {
        code: crate::protocol::FAILURE_CODE,
        msg: Some(msg.clone()),
        content: Some(LogResult {
            from_line_num: 0,
            to_line_num: 0,
            log_content: msg,
            is_end: true,
        }),
    }
}
