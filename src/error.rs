use thiserror::Error;
use tracing::warn;

/// Structural violations. These are bugs in the parser, a previous transition
/// or the engine itself; "this answer does not fit" is `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("malformed dialogue state: {0}")]
    MalformedState(String),

    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    #[error("unexpected dialogue act `{0}`")]
    UnexpectedDialogueAct(String),

    #[error("dialogue act `{0}` requires the result of the current statement")]
    MissingResultInfo(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DialogueError {
    /// Logs the violation before handing it back; these are never expected.
    pub fn malformed_state(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        warn!(%msg, "malformed dialogue state");
        DialogueError::MalformedState(msg)
    }

    pub fn malformed_expression(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        warn!(%msg, "malformed expression");
        DialogueError::MalformedExpression(msg)
    }
}

pub type Result<T> = std::result::Result<T, DialogueError>;
