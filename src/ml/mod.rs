// ============================================================
// Layer 5 — Machine Learning
// ============================================================
// The Burn-backed core: the feed-forward property predictor, its
// masked losses, the learning rate schedules, the ensemble
// training loop, and the scoring machinery.
//
// Only trainer.rs and predict.rs touch the DataLoader; metrics
// and evaluation are plain f64 code so they run identically on
// any backend and need none to test.

/// Feed-forward property prediction model
pub mod model;

/// Masked per-dataset-type training losses
pub mod loss;

/// Noam and exponential learning rate schedules
pub mod scheduler;

/// Metric definitions, directions, and scoring functions
pub mod metrics;

/// Per-task evaluation of prediction matrices
pub mod evaluate;

/// Batched inference with per-dataset-type post-processing
pub mod predict;

/// The ensemble training loop
pub mod trainer;
