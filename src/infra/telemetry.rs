// ============================================================
// Layer 6 — Telemetry Sink
// ============================================================
// An observation seam for the training loop. The trainer emits
// progress events through this trait; the default sink discards
// them, tracing already carries the human-readable log. A caller
// that wants live metrics (a progress bar, a dashboard bridge)
// implements the trait and passes its sink in.
//
// Sinks must be fire-and-forget: the trainer ignores anything a
// sink does, and a slow sink slows training, so implementations
// should hand events off cheaply.

/// Progress of one ensemble member's epoch.
#[derive(Debug, Clone)]
pub struct EpochReport {
    pub model_idx:      usize,
    pub epoch:          usize,
    pub train_loss:     f64,
    /// Mean validation score on the selection metric
    pub val_score:      f64,
    pub best_so_far:    bool,
}

/// Receives training progress events.
pub trait TelemetrySink: Send + Sync {
    fn epoch_completed(&self, _report: &EpochReport) {}

    fn member_completed(&self, _model_idx: usize, _best_val_score: f64) {}

    fn run_completed(&self, _ensemble_size: usize) {}
}

/// The default sink: drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {}
