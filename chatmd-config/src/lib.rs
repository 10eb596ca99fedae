//! Shared configuration loader for the chatmd toolchain.
//!
//! `defaults/chatmd.default.toml` is embedded into every binary so that docs
//! and runtime behavior stay in sync. Applications layer user-specific files on
//! top of those defaults via [`Loader`] before deserializing into
//! [`ChatmdConfig`].

use chatmd_babel::render::CodeBlockMode;
use chatmd_babel::{CircuitBreaker, RenderOptions};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub use config::ConfigError;

const DEFAULT_TOML: &str = include_str!("../defaults/chatmd.default.toml");

/// Top-level configuration consumed by chatmd applications.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatmdConfig {
    pub render: RenderConfig,
    pub breaker: BreakerConfig,
}

/// Mirrors the knobs exposed by the Markdown renderer.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub max_input_size: usize,
    pub max_output_size: usize,
    pub timeout_ms: u64,
    pub sanitize: bool,
    pub code_block_mode: CodeBlockMode,
    pub chunk_size: usize,
    pub max_nesting_depth: usize,
}

impl From<&RenderConfig> for RenderOptions {
    fn from(config: &RenderConfig) -> Self {
        RenderOptions {
            max_input_size: config.max_input_size,
            max_output_size: config.max_output_size,
            timeout: Duration::from_millis(config.timeout_ms),
            sanitize: config.sanitize,
            code_block_mode: config.code_block_mode,
            chunk_size: config.chunk_size,
            max_nesting_depth: config.max_nesting_depth,
        }
    }
}

impl From<RenderConfig> for RenderOptions {
    fn from(config: RenderConfig) -> Self {
        RenderOptions::from(&config)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl BreakerConfig {
    pub fn build(&self) -> CircuitBreaker {
        CircuitBreaker::new(self.failure_threshold, Duration::from_secs(self.cooldown_secs))
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI flags).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<ChatmdConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<ChatmdConfig, ConfigError> {
    Loader::new().build()
}
