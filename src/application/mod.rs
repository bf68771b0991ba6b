// ============================================================
// Layer 2 — Application Layer
// ============================================================
// The use-case surface a caller programs against: assemble a
// TrainConfig, hand it to the training loop, and later run the
// saved ensemble over new molecules. Orchestration only — no
// tensor code, no file formats.

/// The validated training configuration
pub mod config;

/// Inference from a saved training run
pub mod predict_use_case;
