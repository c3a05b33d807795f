use crate::errors::ArborError;

#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("Failed to open pseudo-terminal: {message}")]
    OpenFailed { message: String },

    #[error("Failed to spawn '{program}': {message}")]
    SpawnFailed { program: String, message: String },

    #[error("Failed to write to session input: {message}")]
    WriteFailed { message: String },

    #[error("Unknown signal '{name}'")]
    UnknownSignal { name: String },
}

impl ArborError for PtyError {
    fn error_code(&self) -> &'static str {
        match self {
            PtyError::OpenFailed { .. } => "PTY_OPEN_FAILED",
            PtyError::SpawnFailed { .. } => "PTY_SPAWN_FAILED",
            PtyError::WriteFailed { .. } => "PTY_WRITE_FAILED",
            PtyError::UnknownSignal { .. } => "UNKNOWN_SIGNAL",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(self, PtyError::UnknownSignal { .. })
    }
}
