//! Error types for session orchestration

use crate::registry::EntityKind;
use crate::types::TargetKind;
use thiserror::Error;

/// Errors produced while resolving handles or driving the automation engine.
///
/// Every operation of [`crate::SessionOrchestrator`] reports failure through
/// this type; the MCP layer turns each of them into a `null`/`false` result.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// No live object is registered under the handle
    #[error("Handle not found: {0}")]
    HandleNotFound(String),

    /// The handle exists but refers to a different kind of object
    #[error("Handle '{handle}' refers to a {actual}, expected a {expected}")]
    WrongHandleKind {
        handle: String,
        expected: EntityKind,
        actual: EntityKind,
    },

    /// Discovery returned several candidates and no human choice was recorded yet
    #[error("Multiple {kind} candidates found, a selection is required: {candidates:?}")]
    SelectionRequired {
        kind: TargetKind,
        candidates: Vec<String>,
    },

    /// The engine reported a failed connect/bind/action
    #[error("Engine call failed: {0}")]
    EngineFailure(String),

    /// A check performed before calling the engine did not pass
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Operation not available for this platform or adapter
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl AutomationError {
    /// Short machine-readable name used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            AutomationError::HandleNotFound(_) => "handle_not_found",
            AutomationError::WrongHandleKind { .. } => "wrong_handle_kind",
            AutomationError::SelectionRequired { .. } => "selection_required",
            AutomationError::EngineFailure(_) => "engine_failure",
            AutomationError::PreconditionFailed(_) => "precondition_failed",
            AutomationError::Unsupported(_) => "unsupported",
            AutomationError::PlatformError(_) => "platform_error",
            AutomationError::Timeout(_) => "timeout",
            AutomationError::Io(_) => "io",
            AutomationError::Image(_) => "image",
        }
    }
}
