// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists everything needed to reload a trained ensemble:
//
//   {save_dir}/
//     bundle.json       ← config + input width + fitted scalers
//     model_0/model.*   ← member 0 weights (full-precision mpk)
//     model_1/model.*   ← member 1 weights
//     ...
//
// Why a bundle next to the weights?
//   Weights alone cannot be loaded — the model must first be
//   rebuilt with the exact architecture, and predictions are
//   meaningless without the scalers fitted on the training
//   split. The bundle carries all of that in one JSON file.
//
// Weights use full-precision MessagePack records: a reloaded
// checkpoint is bit-identical to the model that was saved, so
// the best-epoch reload returns exactly the weights that scored
// best, not a rounded copy.
//
// The bundle is written atomically (tmp file + rename) so a
// crash mid-write never leaves a truncated bundle that a later
// load would trip over.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::application::config::TrainConfig;
use crate::data::scaler::StandardScaler;
use crate::ml::model::MoleculePredictor;

/// Everything except the weights: the run config, the feature
/// width the models were built for, and the scalers fitted on
/// the training split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointBundle {
    pub config:    TrainConfig,
    pub input_dim: usize,
    pub target_scaler:          Option<StandardScaler>,
    pub features_scaler:        Option<StandardScaler>,
    pub atom_descriptor_scaler: Option<StandardScaler>,
    pub bond_feature_scaler:    Option<StandardScaler>,
}

/// Manages saving and loading of ensemble checkpoints.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager rooted at `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create save directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn member_dir(&self, model_idx: usize) -> PathBuf {
        self.dir.join(format!("model_{model_idx}"))
    }

    fn weights_path(&self, model_idx: usize) -> PathBuf {
        // No extension — the recorder adds its own
        self.member_dir(model_idx).join("model")
    }

    /// Save one ensemble member's weights.
    pub fn save_model<B: Backend>(
        &self,
        model: &MoleculePredictor<B>,
        model_idx: usize,
    ) -> Result<()> {
        let member_dir = self.member_dir(model_idx);
        fs::create_dir_all(&member_dir).with_context(|| {
            format!("Failed to create member directory '{}'", member_dir.display())
        })?;

        let path = self.weights_path(model_idx);
        // Full precision: the reloaded best checkpoint must be the
        // exact weights that scored best in validation, not an f16
        // approximation of them
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!(model_idx, "saved model checkpoint");
        Ok(())
    }

    /// Rebuild one member from the bundle's architecture and load
    /// its saved weights into it.
    pub fn load_model<B: Backend>(
        &self,
        bundle: &CheckpointBundle,
        model_idx: usize,
        device: &B::Device,
    ) -> Result<MoleculePredictor<B>> {
        let path = self.weights_path(model_idx);
        let record = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Has model {model_idx} been trained?",
                    path.display()
                )
            })?;

        let model = bundle.config.model_config(bundle.input_dim).init(device);
        Ok(model.load_record(record))
    }

    /// Write the bundle atomically: serialize to a tmp file, then
    /// rename over the final path.
    pub fn save_bundle(&self, bundle: &CheckpointBundle) -> Result<()> {
        let path = self.dir.join("bundle.json");
        let tmp = self.dir.join("bundle.json.tmp");

        let json = serde_json::to_string_pretty(bundle)?;
        fs::write(&tmp, json)
            .with_context(|| format!("Cannot write bundle to '{}'", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Cannot finalize bundle at '{}'", path.display()))?;

        tracing::debug!(path = %path.display(), "saved checkpoint bundle");
        Ok(())
    }

    pub fn load_bundle(&self) -> Result<CheckpointBundle> {
        let path = self.dir.join("bundle.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read bundle from '{}'. Run training before prediction.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
