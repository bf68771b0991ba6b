// ============================================================
// Layer 6 — Infrastructure
// ============================================================
// Everything that touches the outside world: the filesystem for
// checkpoints and score reports, and the telemetry seam for
// callers that want live progress. No training logic lives here.

/// Saving/loading model weights and the run bundle
pub mod checkpoint;

/// test_scores.json and test_preds.csv writers
pub mod report;

/// Fire-and-forget progress events from the training loop
pub mod telemetry;
