// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// One typed error enum for the whole pipeline, built with
// thiserror so every variant carries an actionable message.
//
// Propagation policy:
//   - Structural problems (bad config, unknown generator,
//     empty validation split) abort the whole run.
//   - A missing optional dependency is fatal only when the
//     specific feature path is actually invoked — registry
//     lookup itself always succeeds.
//   - Per-task metric degeneracies are NOT errors: they are
//     absorbed locally and surface as NaN in the score report
//     so one bad task never blocks evaluation of the others.
//
// Reference: Rust Book §9 (Error Handling)

use thiserror::Error;

/// Unified error type for molprop operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Fatal configuration problems: malformed split sizes,
    /// empty validation partition, zero epochs, and so on.
    /// The message must state what was wrong and how to fix it.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A features generator name was not found in the registry.
    /// Mirrors the registry's lookup contract: unknown names fail
    /// fast at validation time, never mid-training.
    #[error(
        "Features generator \"{name}\" could not be found. \
         If this generator relies on an optional descriptor package, \
         you may need to install it and register the generator at startup."
    )]
    GeneratorNotFound { name: String },

    /// An optional heavy dependency is absent. Raised on generator
    /// invocation only — registration and listing always succeed.
    #[error(
        "Failed to load optional dependency '{package}' required by the \
         '{generator}' features generator. Install '{package}' and register \
         a working generator under this name to use it."
    )]
    DependencyMissing {
        package: &'static str,
        generator: &'static str,
    },

    /// A molecule failed to parse or a dataset is malformed.
    /// Malformed molecules must be filtered before reaching the
    /// training core; the core does not recover mid-batch.
    #[error("Data error: {0}")]
    Data(String),

    /// File I/O while persisting checkpoints or score reports.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of configs, scalers, and scores.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Shorthand for a configuration error with a formatted message.
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    /// Shorthand for a data error with a formatted message.
    pub fn data(msg: impl Into<String>) -> Self {
        PipelineError::Data(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;
