use std::path::PathBuf;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use arbor_core::{ArborError, PtyEvent};

/// Caller -> arbor request. One JSON object per line on stdin.
///
/// `id` is chosen by the caller and echoed back verbatim in the reply.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Request {
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// arbor -> caller messages. One JSON object per line on stdout.
///
/// Replies echo the request `id`. Session events carry no `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub(crate) enum Outbound {
    #[serde(rename = "result")]
    Result { id: Value, result: Value },

    /// `id` is null when the request line could not be parsed far enough to
    /// find one.
    #[serde(rename = "error")]
    Error {
        id: Option<Value>,
        code: String,
        message: String,
    },

    #[serde(rename = "session.data")]
    SessionData {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Base64-encoded raw PTY output bytes.
        data: String,
    },

    #[serde(rename = "session.exit")]
    SessionExit {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
    },
}

impl Outbound {
    pub fn failure(id: Option<Value>, error: ProtocolError) -> Self {
        Outbound::Error {
            id,
            code: error.code,
            message: error.message,
        }
    }
}

impl From<PtyEvent> for Outbound {
    fn from(event: PtyEvent) -> Self {
        match event {
            PtyEvent::Data { session_id, chunk } => Outbound::SessionData {
                session_id,
                data: base64::engine::general_purpose::STANDARD.encode(chunk),
            },
            PtyEvent::Exit {
                session_id,
                exit_code,
            } => Outbound::SessionExit {
                session_id,
                exit_code,
            },
        }
    }
}

/// A `{code, message}` pair sent back instead of a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProtocolError {
    pub code: String,
    pub message: String,
}

impl ProtocolError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("INVALID_REQUEST", message)
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new("UNKNOWN_METHOD", format!("Unknown method '{}'", method))
    }

    pub fn invalid_params(method: &str, error: &serde_json::Error) -> Self {
        Self::new(
            "INVALID_PARAMS",
            format!("Invalid params for '{}': {}", method, error),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn from_error<E: ArborError>(error: E) -> Self {
        Self::new(error.error_code(), error.to_string())
    }
}

/// Parse one request line. On failure, returns whatever `id` could be
/// recovered so the error reply can still be correlated.
pub(crate) fn parse_request(line: &str) -> Result<Request, (Option<Value>, ProtocolError)> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| (None, ProtocolError::invalid_request(format!("Malformed JSON: {}", e))))?;

    let id = value.get("id").cloned().filter(|id| !id.is_null());
    if !value.is_object() {
        return Err((None, ProtocolError::invalid_request("Request must be a JSON object")));
    }
    if id.is_none() {
        return Err((None, ProtocolError::invalid_request("Request is missing 'id'")));
    }

    serde_json::from_value(value)
        .map_err(|e| (id, ProtocolError::invalid_request(e.to_string())))
}

// Params, one struct per method shape.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionIdParams {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WriteParams {
    pub session_id: String,
    /// Text written verbatim to the PTY.
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResizeParams {
    pub session_id: String,
    pub cols: u16,
    pub rows: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TerminateParams {
    pub session_id: String,
    /// `SIGHUP`, `SIGINT`, `SIGTERM` or `SIGKILL`; defaults to `SIGHUP`.
    #[serde(default)]
    pub signal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenameParams {
    pub session_id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CwdParams {
    pub cwd: PathBuf,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchParams {
    pub cwd: PathBuf,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateWorktreeParams {
    pub cwd: PathBuf,
    pub branch: String,
    /// Defaults to "create the branch if it does not exist yet".
    #[serde(default)]
    pub new_branch: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoveWorktreeParams {
    pub cwd: PathBuf,
    pub path: PathBuf,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorktreePathParams {
    pub cwd: PathBuf,
    pub branch: String,
}
