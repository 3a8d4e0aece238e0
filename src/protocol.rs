//! Wire types for the XXL-JOB executor protocol.
//!
//! JSON field names are protocol-fixed and must match what the admin center
//! sends and expects, including the irregular `logDateTim` on log/callback
//! payloads. Inbound fields all default so a sparse trigger body decodes
//! cleanly, with missing fields treated as zero values.

use serde::{Deserialize, Serialize};

/// Envelope code for success.
pub const SUCCESS_CODE: i32 = 200;
/// Envelope code for failure.
pub const FAILURE_CODE: i32 = 500;

/// Shared auth header for both inbound and outbound calls.
pub const ACCESS_TOKEN_HEADER: &str = "XXL-JOB-ACCESS-TOKEN";

/// Generic `{code, msg, content}` envelope used by both sides of the protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnEnvelope<T> {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub content: Option<T>,
}

impl<T> ReturnEnvelope<T> {
    /// `{code: 200}`.
    pub fn success() -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: None,
            content: None,
        }
    }

    /// `{code: 200, content}`.
    pub fn success_with(content: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: None,
            content: Some(content),
        }
    }

    /// `{code: 500, msg}`.
    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            code: FAILURE_CODE,
            msg: Some(msg.into()),
            content: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Blocking strategy applied when a trigger arrives for a job that is
/// already running.
///
/// Unknown strategy strings are preserved in `Other` and behave like the
/// blocking strategies: anything that is not `COVER_EARLY` rejects the new
/// dispatch. `SERIAL_EXECUTION` also rejects — no queueing happens despite
/// the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockStrategy {
    SerialExecution,
    DiscardLater,
    CoverEarly,
    Other(String),
}

impl BlockStrategy {
    pub fn is_cover_early(&self) -> bool {
        matches!(self, Self::CoverEarly)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SerialExecution => "SERIAL_EXECUTION",
            Self::DiscardLater => "DISCARD_LATER",
            Self::CoverEarly => "COVER_EARLY",
            Self::Other(s) => s,
        }
    }
}

impl Default for BlockStrategy {
    fn default() -> Self {
        Self::SerialExecution
    }
}

impl From<String> for BlockStrategy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SERIAL_EXECUTION" => Self::SerialExecution,
            "DISCARD_LATER" => Self::DiscardLater,
            "COVER_EARLY" => Self::CoverEarly,
            _ => Self::Other(s),
        }
    }
}

impl From<BlockStrategy> for String {
    fn from(s: BlockStrategy) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for BlockStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trigger request from the admin center (`POST /run`).
///
/// The glue and broadcast fields are opaque pass-through: the engine never
/// interprets them, it only hands them to the handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerParams {
    pub job_id: i64,
    pub executor_handler: String,
    pub executor_params: String,
    pub executor_block_strategy: BlockStrategy,
    /// Task timeout in seconds; 0 means no deadline.
    pub executor_timeout: i64,
    pub log_id: i64,
    pub log_date_time: i64,
    pub glue_type: String,
    pub glue_source: String,
    pub glue_updatetime: i64,
    pub broadcast_index: i64,
    pub broadcast_total: i64,
}

/// Kill request (`POST /kill`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KillParams {
    pub job_id: i64,
}

/// Busy-check request (`POST /idleBeat`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdleBeatParams {
    pub job_id: i64,
}

/// Log page request (`POST /log`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogParams {
    #[serde(rename = "logDateTim")]
    pub log_date_tim: i64,
    #[serde(rename = "logId")]
    pub log_id: i64,
    #[serde(rename = "fromLineNum")]
    pub from_line_num: i32,
}

/// Log page response content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogResult {
    pub from_line_num: i32,
    pub to_line_num: i32,
    pub log_content: String,
    pub is_end: bool,
}

/// Executor registration payload (`POST {admin}/api/registry[Remove]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryParams {
    pub registry_group: String,
    pub registry_key: String,
    pub registry_value: String,
}

/// Legacy nested result, still sent for pre-3.1.1 admin compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub code: i32,
    pub msg: String,
}

/// One completed task's result, POSTed to `{admin}/api/callback` as an
/// element of a JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleCallbackParam {
    #[serde(rename = "logId")]
    pub log_id: i64,
    #[serde(rename = "logDateTim")]
    pub log_date_tim: i64,
    #[serde(rename = "executeResult")]
    pub execute_result: ExecuteResult,
    /// 200 = handled ok, 500 = failed.
    #[serde(rename = "handleCode")]
    pub handle_code: i32,
    #[serde(rename = "handleMsg")]
    pub handle_msg: String,
}

impl HandleCallbackParam {
    /// Build a callback for the dispatch identified by `params`.
    pub fn new(params: &TriggerParams, code: i32, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            log_id: params.log_id,
            log_date_tim: params.log_date_time,
            execute_result: ExecuteResult {
                code,
                msg: msg.clone(),
            },
            handle_code: code,
            handle_msg: msg,
        }
    }
}
