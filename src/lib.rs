// ============================================================
// molprop — molecular property prediction with Burn
// ============================================================
// Train/validate/test pipelines over SMILES datasets: fingerprint
// featurization through a pluggable generator registry, seeded
// splitting, train-only scaling, ensemble training with per-epoch
// checkpoint selection, and deterministic score reports.
//
// Layered architecture, outermost first:
//   Layer 2  application/ — use cases and the TrainConfig surface
//   Layer 3  domain/      — molecules, task semantics, errors
//   Layer 4  data/        — datasets, splitting, scaling, batching
//   Layer 5  ml/          — model, losses, schedules, training loop
//   Layer 6  infra/       — checkpoints, reports, telemetry
//
// Typical use:
//
//   use molprop::application::config::TrainConfig;
//   use molprop::data::dataset::{MoleculeDatapoint, MoleculeDataset};
//   use molprop::ml::trainer::run_training;
//
//   let cfg = TrainConfig { task_names: vec!["logp".into()], ..Default::default() };
//   let data = MoleculeDataset::new(points, cfg.task_names.clone())?;
//   let scores = run_training(&cfg, data)?;

pub mod application;
pub mod data;
pub mod domain;
pub mod features;
pub mod infra;
pub mod ml;

pub use application::config::TrainConfig;
pub use domain::error::{PipelineError, Result};
pub use domain::task::{DatasetType, MeanPolicy};
pub use ml::metrics::Metric;
pub use ml::trainer::{run_training, run_training_with_telemetry};
