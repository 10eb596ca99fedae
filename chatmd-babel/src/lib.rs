//! Content-fidelity pipeline between rendered chat markup and Markdown
//!
//!     Chat messages travel in two directions. Assistant replies arrive as
//!     Markdown and must be shown as HTML without letting untrusted input run
//!     scripts, hang the page or break the layout. Going the other way, a
//!     rendered message is captured back to Markdown, and code blocks, tables
//!     and typeset formulas must survive that trip intact.
//!
//!     This crate covers both directions:
//!         - extract: CodeExtractor, TableParser and MathExtractor protect
//!           constructs behind `{{KIND-N}}` placeholders around an external
//!           HTML→Markdown converter, then restore them.
//!         - render: InputValidator, CircuitBreaker and MarkdownRenderer turn
//!           Markdown into sanitized HTML with size caps, a deadline and a
//!           plain-text fallback that is always safe to show.
//!
//!     This is a pure lib: no printing, no env vars. The chatmd CLI and the
//!     config crate are thin shells around it.
//!
//!     The file structure :
//!     .
//!     ├── error.rs            # ErrorKind codes, RenderError
//!     ├── dom.rs              # html5ever DOM helpers
//!     ├── placeholder.rs      # PlaceholderMap, Extraction
//!     ├── extract
//!     │   ├── code.rs
//!     │   ├── math.rs         # also the emphasis repair pass
//!     │   ├── table.rs
//!     │   └── mod.rs          # Extractor trait, CapturePipeline
//!     └── render
//!         ├── validator.rs
//!         ├── breaker.rs
//!         ├── chunk.rs
//!         ├── cancel.rs
//!         ├── engine.rs       # comrak
//!         ├── sanitize.rs     # ammonia
//!         └── mod.rs          # MarkdownRenderer
//!
//! Testing
//!     tests
//!     ├── lib.rs
//!     ├── extract
//!     └── render
//!
//!     Rust does not discover tests in subdirectories on its own, so tests/lib.rs
//!     includes them as modules.

pub mod dom;
pub mod error;
pub mod extract;
pub mod placeholder;
pub mod render;

pub use error::{ErrorKind, RenderError};
pub use extract::{
    repair_math_emphasis, CapturePipeline, CodeExtractor, Extractor, HtmlToMarkdown,
    MathExtractor, ProtectedHtml, TableParser,
};
pub use placeholder::{Extraction, PlaceholderKind, PlaceholderMap};
pub use render::{
    render_plain_text, CancellationToken, CircuitBreaker, CircuitState, CodeBlockMode,
    InputValidator, MarkdownRenderer, RenderOptions, RenderResult, ValidationResult,
};
