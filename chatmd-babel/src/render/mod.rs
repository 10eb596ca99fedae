//! Markdown → HTML rendering direction
//!
//!     raw markdown
//!         │
//!         ├─ InputValidator ── invalid ──► Failure { error, plain(sanitized) }
//!         │
//!         ▼  (through the injected CircuitBreaker)
//!     separate adjacent formulas
//!         │
//!         ▼
//!     chunks ── engine ── budget check between chunks
//!         │
//!         ▼
//!     output cap ── sanitize ──► Success { html }
//!
//! Every path ends in a [`RenderResult`]. Runtime faults (timeout, abort,
//! oversized output, a panic inside the engine) count against the breaker and
//! come back as a `Failure` carrying a plain-text fallback computed before the
//! render began. Validation failures are the caller's input, not a fault, so
//! they bypass the breaker entirely.

pub mod breaker;
pub mod cancel;
pub mod chunk;
pub mod engine;
pub mod sanitize;
pub mod validator;

pub use breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use cancel::{CancellationToken, RenderBudget};
pub use engine::{CodeBlockMode, MarkdownEngine};
pub use sanitize::Sanitizer;
pub use validator::{InputValidator, ValidationResult};

use crate::error::{ErrorKind, RenderError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub const DEFAULT_MAX_INPUT_SIZE: usize = 1_000_000;
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 5_000_000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_CHUNK_SIZE: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Input cap in characters
    pub max_input_size: usize,
    /// Output cap in characters
    pub max_output_size: usize,
    pub timeout: Duration,
    pub sanitize: bool,
    pub code_block_mode: CodeBlockMode,
    /// Target chunk size in bytes
    pub chunk_size: usize,
    pub max_nesting_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            timeout: DEFAULT_TIMEOUT,
            sanitize: true,
            code_block_mode: CodeBlockMode::Full,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_nesting_depth: validator::DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RenderResult {
    Success { html: String },
    Failure { error: ErrorKind, fallback: String },
}

impl RenderResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RenderResult::Success { .. })
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            RenderResult::Success { .. } => None,
            RenderResult::Failure { error, .. } => Some(*error),
        }
    }

    /// The HTML to display: the rendered output or the fallback
    pub fn html(&self) -> &str {
        match self {
            RenderResult::Success { html } => html,
            RenderResult::Failure { fallback, .. } => fallback,
        }
    }
}

/// Renders untrusted Markdown into display-safe HTML
pub struct MarkdownRenderer {
    breaker: Arc<CircuitBreaker>,
    engine: OnceLock<MarkdownEngine>,
    sanitizer: OnceLock<Sanitizer>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(Arc::new(CircuitBreaker::default()))
    }
}

impl MarkdownRenderer {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            breaker,
            engine: OnceLock::new(),
            sanitizer: OnceLock::new(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn render(&self, markdown: &str, options: &RenderOptions) -> RenderResult {
        self.render_with_cancel(markdown, options, &CancellationToken::new())
    }

    /// Like [`render`](Self::render), but stops between chunks once `token`
    /// is cancelled
    pub fn render_with_cancel(
        &self,
        markdown: &str,
        options: &RenderOptions,
        token: &CancellationToken,
    ) -> RenderResult {
        let validation = InputValidator::with_max_nesting_depth(options.max_nesting_depth)
            .validate(markdown, options.max_input_size);
        if let Some(error) = validation.error {
            tracing::debug!(%error, "Markdown rejected by validation");
            return RenderResult::Failure {
                error,
                fallback: render_plain_text(&validation.sanitized),
            };
        }

        let fallback = render_plain_text(markdown);
        match self.breaker.call(|| self.render_protected(markdown, options, token)) {
            Ok(html) => RenderResult::Success { html },
            Err(BreakerError::Open) => {
                tracing::debug!("Circuit open, returning fallback");
                RenderResult::Failure {
                    error: ErrorKind::CircuitOpen,
                    fallback,
                }
            }
            Err(BreakerError::Failed(e)) => {
                tracing::warn!(error = %e, "Render failed");
                RenderResult::Failure {
                    error: e.kind(),
                    fallback,
                }
            }
            Err(BreakerError::Panicked) => {
                tracing::warn!("Markdown engine panicked");
                RenderResult::Failure {
                    error: ErrorKind::RenderAborted,
                    fallback,
                }
            }
        }
    }

    fn render_protected(
        &self,
        markdown: &str,
        options: &RenderOptions,
        token: &CancellationToken,
    ) -> Result<String, RenderError> {
        let budget = RenderBudget::new(options.timeout, token.clone());
        let engine = self.engine.get_or_init(MarkdownEngine::new);
        let prepared = engine::separate_adjacent_formulas(markdown);

        let chunks = chunk::split_into_chunks(&prepared, options.chunk_size.max(1));
        tracing::debug!(chunks = chunks.len(), "Rendering Markdown");

        let mut html = String::with_capacity(prepared.len() * 2);
        for piece in chunks {
            budget.check()?;
            html.push_str(&engine.render(piece, options.code_block_mode));
        }
        budget.check()?;

        let actual = html.chars().count();
        if actual > options.max_output_size {
            return Err(RenderError::OutputTooLarge {
                actual,
                limit: options.max_output_size,
            });
        }

        if options.sanitize {
            html = self.sanitizer.get_or_init(Sanitizer::new).clean(&html);
        }
        Ok(html)
    }
}

/// Escaped plain-text rendering, safe to display as-is
pub fn render_plain_text(text: &str) -> String {
    format!(
        "<pre class=\"chatmd-fallback\">{}</pre>",
        engine::escape_html(text)
    )
}
