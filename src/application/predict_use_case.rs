// ============================================================
// Layer 2 — Prediction Use Case
// ============================================================
// Inference on new molecules from a finished training run. The
// checkpoint bundle carries everything needed to reproduce the
// training-time pipeline exactly: the generator names, the
// fitted feature scaler, the model architecture, and the target
// scaler — new molecules MUST go through the same transforms the
// training data did or the predictions are garbage.

use std::path::Path;

use anyhow::{Context, Result};

use crate::data::dataset::{MoleculeDatapoint, MoleculeDataset};
use crate::domain::error::PipelineError;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::predict::predict;
use crate::ml::trainer::EvalBackend;

/// Predict properties for new molecules using the ensemble saved
/// under `save_dir`. Each entry of `smiles` is one datapoint
/// (possibly multi-component). Returns the ensemble-mean
/// prediction rows, in input order and in original target units.
pub fn run_prediction(save_dir: &Path, smiles: &[Vec<String>]) -> Result<Vec<Vec<f64>>> {
    let manager = CheckpointManager::new(save_dir)?;
    let bundle = manager.load_bundle()?;
    let cfg = &bundle.config;
    let device = Default::default();

    // Rebuild the training-time featurization
    let points = smiles
        .iter()
        .map(|components| {
            MoleculeDatapoint::new(components.clone(), vec![None; cfg.num_tasks()])
        })
        .collect();
    let mut data = MoleculeDataset::new(points, cfg.task_names.clone())?;
    data.featurize(&cfg.features_generators)
        .context("featurization of prediction inputs failed")?;
    if let Some(scaler) = &bundle.features_scaler {
        data.apply_feature_scaler(scaler);
    }

    if data.features_size() != Some(bundle.input_dim) {
        return Err(PipelineError::data(format!(
            "prediction inputs produced {:?} features but the model expects {}; \
             do the inputs have the same component count as the training data?",
            data.features_size(),
            bundle.input_dim
        ))
        .into());
    }

    let width = cfg.output_dim();
    let mut sums = vec![vec![0.0f64; width]; data.len()];
    for model_idx in 0..cfg.ensemble_size {
        let model = manager.load_model::<EvalBackend>(&bundle, model_idx, &device)?;
        let preds = predict(
            &model,
            data.clone(),
            cfg.batch_size,
            &device,
            cfg.dataset_type,
            cfg.multiclass_num_classes,
            bundle.target_scaler.as_ref(),
        )?;
        for (sum_row, pred_row) in sums.iter_mut().zip(&preds) {
            for (s, p) in sum_row.iter_mut().zip(pred_row) {
                *s += p;
            }
        }
    }

    let n = cfg.ensemble_size as f64;
    let averaged = sums
        .into_iter()
        .map(|row| row.into_iter().map(|v| v / n).collect())
        .collect();
    tracing::info!(
        molecules = smiles.len(),
        ensemble_size = cfg.ensemble_size,
        dataset_type = %cfg.dataset_type,
        "prediction complete"
    );
    Ok(averaged)
}

/// Convenience wrapper for single-component inputs.
pub fn run_prediction_single(save_dir: &Path, smiles: &[String]) -> Result<Vec<Vec<f64>>> {
    let grouped: Vec<Vec<String>> = smiles.iter().map(|s| vec![s.clone()]).collect();
    run_prediction(save_dir, &grouped)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::TrainConfig;
    use crate::ml::metrics::Metric;
    use crate::ml::trainer::run_training;

    #[test]
    fn test_trained_run_predicts_new_molecules() {
        let _guard = crate::ml::trainer::TRAIN_TEST_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            task_names: vec!["y".into()],
            metric: Metric::Rmse,
            epochs: 1,
            batch_size: 4,
            ffn_hidden_size: 8,
            save_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let points = ["C", "CC", "CCC", "CCCC", "CO", "CCO", "CCCO", "CN", "CCN", "CCCN"]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                MoleculeDatapoint::new(vec![(*s).into()], vec![Some(i as f64)])
            })
            .collect();
        let data = MoleculeDataset::new(points, vec!["y".into()]).unwrap();
        run_training(&cfg, data).unwrap();

        let preds =
            run_prediction_single(tmp.path(), &["CCCCC".into(), "CCOC".into()]).unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].len(), 1);
        assert!(preds.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_prediction_without_training_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(run_prediction_single(tmp.path(), &["C".into()]).is_err());
    }
}
