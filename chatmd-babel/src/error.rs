//! Error kinds for the rendering direction
//!
//! Outcomes are reported as tagged string codes ([`ErrorKind`]) so they stay
//! serializable across the validator/renderer boundary. Runtime faults raised
//! inside the render pipeline are [`RenderError`]s; they are always caught at
//! the circuit-breaker boundary and turned back into an [`ErrorKind`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tagged outcome codes shared by the validator and the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Input exceeded the configured size cap
    ContentTooLarge,
    /// Bracket/parenthesis nesting exceeded the depth ceiling
    NestingTooDeep,
    /// Script-like content outside fenced code
    DangerousContent,
    /// Rendering ran past its deadline
    RenderTimeout,
    /// Rendering was cancelled by the caller
    RenderAborted,
    /// Rendered HTML exceeded the configured output cap
    OutputTooLarge,
    /// The circuit breaker refused to attempt the render
    CircuitOpen,
}

impl ErrorKind {
    /// The wire code for this kind (e.g. `DANGEROUS_CONTENT`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ContentTooLarge => "CONTENT_TOO_LARGE",
            ErrorKind::NestingTooDeep => "NESTING_TOO_DEEP",
            ErrorKind::DangerousContent => "DANGEROUS_CONTENT",
            ErrorKind::RenderTimeout => "RENDER_TIMEOUT",
            ErrorKind::RenderAborted => "RENDER_ABORTED",
            ErrorKind::OutputTooLarge => "OUTPUT_TOO_LARGE",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
        }
    }

    /// Whether this kind comes from input validation (recoverable, never
    /// counted against the circuit breaker)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorKind::ContentTooLarge | ErrorKind::NestingTooDeep | ErrorKind::DangerousContent
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime faults raised inside the protected render operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("render exceeded its {0} ms budget")]
    Timeout(u128),
    #[error("render was aborted")]
    Aborted,
    #[error("rendered output of {actual} chars exceeds the {limit} char limit")]
    OutputTooLarge { actual: usize, limit: usize },
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Timeout(_) => ErrorKind::RenderTimeout,
            RenderError::Aborted => ErrorKind::RenderAborted,
            RenderError::OutputTooLarge { .. } => ErrorKind::OutputTooLarge,
        }
    }
}
