// ============================================================
// Layer 2 — Training Configuration
// ============================================================
// Every knob of a training run in one serializable struct, with
// a validate() gate that runs BEFORE any data is touched. The
// rule: a config that passes validate() never aborts the run for
// a structural reason later — bad values fail here, loudly, with
// a message that says how to fix them.
//
// Defaults follow the usual property-prediction baselines: a
// 2-layer FFN of width 300, Noam warmup over 2 epochs, Morgan
// fingerprint features, 80/10/10 random split.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::splitter::SplitType;
use crate::domain::error::{PipelineError, Result};
use crate::domain::task::{DatasetType, MeanPolicy};
use crate::ml::metrics::Metric;
use crate::ml::model::MoleculePredictorConfig;
use crate::ml::scheduler::{LrScheduler, ScheduleKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    // ── Problem definition ────────────────────────────────────
    pub dataset_type: DatasetType,
    pub task_names:   Vec<String>,
    /// Metric used for checkpoint selection
    pub metric:       Metric,
    /// Reported alongside `metric` but never drives selection
    pub extra_metrics: Vec<Metric>,
    /// Class count per task (multiclass only)
    pub multiclass_num_classes: usize,

    // ── Training loop ─────────────────────────────────────────
    pub epochs:        usize,
    pub batch_size:    usize,
    pub ensemble_size: usize,
    /// Seed for data splitting and shuffling
    pub seed:      u64,
    /// Base seed for weight initialization; member i trains with
    /// init_seed + i
    pub init_seed: u64,

    // ── Data handling ─────────────────────────────────────────
    pub split_type:  SplitType,
    pub split_sizes: [f64; 3],
    /// Registry generator names applied during featurization
    pub features_generators: Vec<String>,
    /// Standard-scale the generated features on the train split
    pub features_scaling: bool,
    pub mean_policy: MeanPolicy,

    // ── Model ─────────────────────────────────────────────────
    pub ffn_hidden_size: usize,
    pub ffn_num_layers:  usize,
    pub dropout:         f64,

    // ── Learning rate schedule ────────────────────────────────
    pub schedule:      ScheduleKind,
    pub init_lr:       f64,
    pub max_lr:        f64,
    pub final_lr:      f64,
    pub warmup_epochs: f64,
    /// Per-epoch decay factor (exponential schedule only)
    pub lr_gamma: f64,

    // ── Spectra ───────────────────────────────────────────────
    /// Intensity floor applied during spectra normalization
    pub spectra_target_floor: Option<f64>,
    /// phase_mask[k][j]: does phase k keep spectrum position j
    pub spectra_phase_mask: Option<Vec<Vec<bool>>>,

    // ── Output ────────────────────────────────────────────────
    pub save_dir:   PathBuf,
    /// Also write per-molecule test predictions as CSV
    pub save_preds: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset_type: DatasetType::Regression,
            task_names: Vec::new(),
            metric: Metric::Rmse,
            extra_metrics: Vec::new(),
            multiclass_num_classes: 3,
            epochs: 30,
            batch_size: 50,
            ensemble_size: 1,
            seed: 0,
            init_seed: 0,
            split_type: SplitType::Random,
            split_sizes: [0.8, 0.1, 0.1],
            features_generators: vec!["morgan".to_string()],
            features_scaling: true,
            mean_policy: MeanPolicy::Uniform,
            ffn_hidden_size: 300,
            ffn_num_layers: 2,
            dropout: 0.0,
            schedule: ScheduleKind::Noam,
            init_lr: 1e-4,
            max_lr: 1e-3,
            final_lr: 1e-4,
            warmup_epochs: 2.0,
            lr_gamma: 0.9,
            spectra_target_floor: Some(1e-8),
            spectra_phase_mask: None,
            save_dir: PathBuf::from("checkpoints"),
            save_preds: false,
        }
    }
}

impl TrainConfig {
    /// Check every structural constraint up front.
    pub fn validate(&self) -> Result<()> {
        if self.task_names.is_empty() {
            return Err(PipelineError::config(
                "task_names is empty; list one name per prediction target",
            ));
        }
        if self.epochs == 0 {
            return Err(PipelineError::config("epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be at least 1"));
        }
        if self.ensemble_size == 0 {
            return Err(PipelineError::config("ensemble_size must be at least 1"));
        }
        if self.ffn_num_layers == 0 {
            return Err(PipelineError::config("ffn_num_layers must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(PipelineError::config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.dataset_type == DatasetType::Multiclass && self.multiclass_num_classes < 2 {
            return Err(PipelineError::config(
                "multiclass_num_classes must be at least 2",
            ));
        }
        for lr in [self.init_lr, self.max_lr, self.final_lr] {
            if lr <= 0.0 {
                return Err(PipelineError::config(format!(
                    "learning rates must be positive, got {lr}"
                )));
            }
        }
        // Unknown generator names fail here, never mid-training
        for name in &self.features_generators {
            crate::features::get_features_generator(name)?;
        }
        for metric in self.metrics() {
            if !metric_supports(metric, self.dataset_type) {
                return Err(PipelineError::config(format!(
                    "metric '{metric}' is not defined for {} datasets",
                    self.dataset_type
                )));
            }
        }
        Ok(())
    }

    /// Selection metric first, extra metrics after, deduplicated.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut all = vec![self.metric];
        for &m in &self.extra_metrics {
            if !all.contains(&m) {
                all.push(m);
            }
        }
        all
    }

    pub fn num_tasks(&self) -> usize {
        self.task_names.len()
    }

    /// Model output width: one score per task, times the class
    /// count for multiclass.
    pub fn output_dim(&self) -> usize {
        match self.dataset_type {
            DatasetType::Multiclass => self.num_tasks() * self.multiclass_num_classes,
            _ => self.num_tasks(),
        }
    }

    pub fn model_config(&self, input_dim: usize) -> MoleculePredictorConfig {
        MoleculePredictorConfig::new(
            input_dim,
            self.ffn_hidden_size,
            self.ffn_num_layers,
            self.output_dim(),
            self.dropout,
        )
    }

    /// A fresh scheduler positioned at step zero.
    pub fn scheduler(&self, steps_per_epoch: usize) -> LrScheduler {
        match self.schedule {
            ScheduleKind::Noam => LrScheduler::noam(
                self.init_lr,
                self.max_lr,
                self.final_lr,
                self.warmup_epochs,
                self.epochs,
                steps_per_epoch,
            ),
            ScheduleKind::Exponential => LrScheduler::exponential(self.init_lr, self.lr_gamma),
        }
    }
}

fn metric_supports(metric: Metric, dataset_type: DatasetType) -> bool {
    use Metric::*;
    match dataset_type {
        DatasetType::Regression => matches!(metric, Rmse | Mae | Mse | R2),
        DatasetType::Classification => {
            matches!(metric, Auc | Accuracy | BinaryCrossEntropy)
        }
        DatasetType::Multiclass => matches!(metric, CrossEntropy | Accuracy),
        DatasetType::Spectra => matches!(metric, Sid),
    }
}
