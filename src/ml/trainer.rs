// ============================================================
// Layer 5 — Ensemble Training Loop
// ============================================================
// The full run: featurize → split → scale → train each ensemble
// member → reload each member's best checkpoint → average test
// predictions → score the ensemble → persist the reports.
//
// Backend split:
//   - Training uses TrainBackend (Autodiff<NdArray>) for gradients
//   - model.valid() returns the model on EvalBackend (NdArray):
//     no autodiff overhead and dropout disabled, so validation
//     and test predictions are deterministic
//
// Checkpoint policy: a member's weights are saved before epoch 1
// (so a run that never improves still has loadable weights) and
// re-saved only on STRICT improvement of the mean validation
// score. Ties keep the earlier checkpoint; a NaN score never
// counts as an improvement.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::config::TrainConfig;
use crate::data::batcher::MoleculeBatcher;
use crate::data::dataset::MoleculeDataset;
use crate::data::spectra::normalize_spectra;
use crate::data::splitter::split_data;
use crate::domain::error::PipelineError;
use crate::domain::task::DatasetType;
use crate::infra::checkpoint::{CheckpointBundle, CheckpointManager};
use crate::infra::report;
use crate::infra::telemetry::{EpochReport, NoopTelemetry, TelemetrySink};
use crate::ml::evaluate::{evaluate_predictions, multitask_mean, valid_target_counts};
use crate::ml::loss::compute_loss;
use crate::ml::predict::predict;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
pub type EvalBackend  = burn::backend::NdArray;

// Backend seeding is process-global, so tests that train must not
// interleave or reproducibility assertions get flaky
#[cfg(test)]
pub(crate) static TRAIN_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Train an ensemble and return the ensemble's test scores,
/// keyed by metric name.
pub fn run_training(
    cfg: &TrainConfig,
    data: MoleculeDataset,
) -> Result<BTreeMap<String, Vec<f64>>> {
    run_training_with_telemetry(cfg, data, &NoopTelemetry)
}

pub fn run_training_with_telemetry(
    cfg: &TrainConfig,
    mut data: MoleculeDataset,
    sink: &dyn TelemetrySink,
) -> Result<BTreeMap<String, Vec<f64>>> {
    cfg.validate()?;
    if data.num_tasks() != cfg.num_tasks() {
        return Err(PipelineError::config(format!(
            "dataset has {} tasks but the config names {}",
            data.num_tasks(),
            cfg.num_tasks()
        ))
        .into());
    }
    let device = <TrainBackend as Backend>::Device::default();
    let manager = CheckpointManager::new(cfg.save_dir.clone())?;

    // ── Featurize ─────────────────────────────────────────────────────────────
    tracing::info!(generators = ?cfg.features_generators, "featurizing molecules");
    data.featurize(&cfg.features_generators)
        .context("featurization failed")?;

    // ── Split ─────────────────────────────────────────────────────────────────
    let sizes = (cfg.split_sizes[0], cfg.split_sizes[1], cfg.split_sizes[2]);
    let (mut train, mut val, mut test) =
        split_data(data, cfg.split_type, sizes, cfg.seed)?;
    tracing::info!(
        train = train.len(),
        val = val.len(),
        test = test.len(),
        "split complete"
    );
    if train.is_empty() {
        return Err(PipelineError::config(
            "the training partition is empty; provide more data or larger split sizes",
        )
        .into());
    }
    if val.is_empty() {
        return Err(PipelineError::config(
            "the validation partition is empty; checkpoint selection needs \
             validation data — increase the validation split size",
        )
        .into());
    }
    if test.is_empty() {
        tracing::warn!("the test partition is empty; test scores will be NaN");
    }

    // ── Scale ─────────────────────────────────────────────────────────────────
    // Every scaler is fitted on the train partition ONLY and then
    // applied to all three, so no statistic leaks across splits.
    let features_scaler = if cfg.features_scaling {
        let scaler = train.fit_feature_scaler(0.0)?;
        train.apply_feature_scaler(&scaler);
        val.apply_feature_scaler(&scaler);
        test.apply_feature_scaler(&scaler);
        Some(scaler)
    } else {
        None
    };

    let target_scaler = if cfg.dataset_type.scales_targets() {
        // Val and test targets stay in original units; predictions
        // are inverse-scaled before any evaluation
        Some(train.normalize_targets(0.0)?)
    } else {
        None
    };

    if cfg.dataset_type == DatasetType::Spectra {
        for split in [&mut train, &mut val, &mut test] {
            normalize_spectra(
                split,
                cfg.spectra_phase_mask.as_deref(),
                cfg.spectra_target_floor,
            )?;
        }
    }

    let input_dim = train
        .features_size()
        .ok_or_else(|| PipelineError::data("no features were generated"))?;

    let bundle = CheckpointBundle {
        config: cfg.clone(),
        input_dim,
        target_scaler: target_scaler.clone(),
        features_scaler,
        atom_descriptor_scaler: None,
        bond_feature_scaler: None,
    };
    manager.save_bundle(&bundle)?;

    // ── Per-member training ───────────────────────────────────────────────────
    let num_tasks = cfg.num_tasks();
    let metrics = cfg.metrics();
    let val_targets = val.targets();
    let val_counts = valid_target_counts(&val_targets, num_tasks);
    let val_gt = val.gt_targets();
    let val_lt = val.lt_targets();

    let pred_width = bundle.config.output_dim();
    let mut sum_test_preds = vec![vec![0.0f64; pred_width]; test.len()];

    for model_idx in 0..cfg.ensemble_size {
        tracing::info!(model_idx, "training ensemble member");
        TrainBackend::seed(cfg.init_seed + model_idx as u64);

        let mut model = cfg.model_config(input_dim).init::<TrainBackend>(&device);
        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
        let steps_per_epoch = train.len().div_ceil(cfg.batch_size);
        let mut scheduler = cfg.scheduler(steps_per_epoch);

        let train_batcher = MoleculeBatcher::<TrainBackend>::new(device.clone());
        let train_loader = DataLoaderBuilder::new(train_batcher)
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed)
            .num_workers(1)
            .build(train.clone());

        // Initial checkpoint, replaced only on strict improvement
        manager.save_model(&model.valid(), model_idx)?;
        let mut best_score = if cfg.metric.is_minimized() {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        };

        for epoch in 1..=cfg.epochs {
            // ── Training phase ────────────────────────────────────────────────
            let mut loss_sum = 0.0f64;
            let mut batches = 0usize;
            for batch in train_loader.iter() {
                let preds = model.forward(batch.features.clone());
                let loss = compute_loss(
                    cfg.dataset_type,
                    preds,
                    &batch,
                    cfg.multiclass_num_classes,
                );
                loss_sum += loss.clone().into_scalar().elem::<f64>();
                batches += 1;

                let lr = scheduler.batch_lr();
                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);
            }
            scheduler.epoch_finished();
            let avg_loss = if batches > 0 {
                loss_sum / batches as f64
            } else {
                f64::NAN
            };

            // ── Validation phase ──────────────────────────────────────────────
            let val_preds = predict(
                &model.valid(),
                val.clone(),
                cfg.batch_size,
                &device,
                cfg.dataset_type,
                cfg.multiclass_num_classes,
                target_scaler.as_ref(),
            )?;
            let val_scores = evaluate_predictions(
                &val_preds,
                &val_targets,
                num_tasks,
                &metrics,
                cfg.dataset_type,
                val_gt.as_deref(),
                val_lt.as_deref(),
            );
            let mean_score = multitask_mean(
                &val_scores[cfg.metric.name()],
                Some(&val_counts),
                cfg.mean_policy,
            );

            // Strict inequality: ties keep the earlier checkpoint,
            // and NaN compares false on both branches
            let improved = if cfg.metric.is_minimized() {
                mean_score < best_score
            } else {
                mean_score > best_score
            };
            if improved {
                best_score = mean_score;
                manager.save_model(&model.valid(), model_idx)?;
            }

            tracing::info!(
                model_idx,
                epoch,
                train_loss = avg_loss,
                val_score = mean_score,
                metric = cfg.metric.name(),
                improved,
                "epoch complete"
            );
            sink.epoch_completed(&EpochReport {
                model_idx,
                epoch,
                train_loss: avg_loss,
                val_score: mean_score,
                best_so_far: improved,
            });
        }
        sink.member_completed(model_idx, best_score);

        // ── Test with the member's best weights ───────────────────────────────
        let best_model = manager.load_model::<EvalBackend>(&bundle, model_idx, &device)?;
        let test_preds = predict(
            &best_model,
            test.clone(),
            cfg.batch_size,
            &device,
            cfg.dataset_type,
            cfg.multiclass_num_classes,
            target_scaler.as_ref(),
        )?;
        let member_scores = evaluate_predictions(
            &test_preds,
            &test.targets(),
            num_tasks,
            &metrics,
            cfg.dataset_type,
            test.gt_targets().as_deref(),
            test.lt_targets().as_deref(),
        );
        for (metric, scores) in &member_scores {
            tracing::info!(model_idx, %metric, ?scores, "member test scores");
        }

        for (sum_row, pred_row) in sum_test_preds.iter_mut().zip(&test_preds) {
            for (s, p) in sum_row.iter_mut().zip(pred_row) {
                *s += p;
            }
        }
    }

    // ── Ensemble evaluation ───────────────────────────────────────────────────
    // The ensemble prediction is the element-wise mean of member
    // predictions; metrics are computed on that mean, NOT averaged
    // over member scores.
    let avg_test_preds: Vec<Vec<f64>> = sum_test_preds
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|v| v / cfg.ensemble_size as f64)
                .collect()
        })
        .collect();

    let ensemble_scores = evaluate_predictions(
        &avg_test_preds,
        &test.targets(),
        num_tasks,
        &metrics,
        cfg.dataset_type,
        test.gt_targets().as_deref(),
        test.lt_targets().as_deref(),
    );
    for (metric, scores) in &ensemble_scores {
        tracing::info!(%metric, ?scores, "ensemble test scores");
    }

    report::save_scores(manager.dir(), &ensemble_scores)?;
    if cfg.save_preds {
        report::save_predictions(
            manager.dir(),
            &test.smiles(),
            cfg.task_names.as_slice(),
            if cfg.dataset_type == DatasetType::Multiclass {
                cfg.multiclass_num_classes
            } else {
                1
            },
            &avg_test_preds,
        )?;
    }

    sink.run_completed(cfg.ensemble_size);
    tracing::info!("training complete");
    Ok(ensemble_scores)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::MoleculeDatapoint;
    use crate::ml::metrics::Metric;

    fn regression_config(dir: &std::path::Path) -> TrainConfig {
        TrainConfig {
            task_names: vec!["y".into()],
            metric: Metric::Rmse,
            epochs: 2,
            batch_size: 4,
            ffn_hidden_size: 8,
            save_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn molecules() -> Vec<&'static str> {
        vec![
            "C", "CC", "CCC", "CCCC", "CO", "CCO", "CCCO", "CN", "CCN", "CCCN",
        ]
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = regression_config(tmp.path());
        cfg.task_names = vec!["a".into(), "b".into()];
        let data = MoleculeDataset::new(
            vec![MoleculeDatapoint::new(vec!["C".into()], vec![Some(1.0)])],
            vec!["a".into()],
        )
        .unwrap();
        assert!(run_training(&cfg, data).is_err());
    }

    #[test]
    fn test_empty_validation_partition_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = regression_config(tmp.path());
        cfg.split_sizes = [0.9, 0.0, 0.1];
        let points = molecules()
            .into_iter()
            .map(|s| MoleculeDatapoint::new(vec![s.into()], vec![Some(1.0)]))
            .collect();
        let data = MoleculeDataset::new(points, vec!["y".into()]).unwrap();
        let err = run_training(&cfg, data).unwrap_err();
        assert!(err.to_string().contains("validation"));
    }

    #[test]
    fn test_full_regression_run_produces_scores_and_artifacts() {
        let _guard = TRAIN_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = regression_config(tmp.path());
        cfg.save_preds = true;
        let points = molecules()
            .into_iter()
            .enumerate()
            .map(|(i, s)| MoleculeDatapoint::new(vec![s.into()], vec![Some(i as f64)]))
            .collect();
        let data = MoleculeDataset::new(points, vec!["y".into()]).unwrap();

        let scores = run_training(&cfg, data).unwrap();
        assert_eq!(scores["rmse"].len(), 1);
        assert!(tmp.path().join("test_scores.json").exists());
        assert!(tmp.path().join("test_preds.csv").exists());
        assert!(tmp.path().join("bundle.json").exists());
        assert!(tmp.path().join("model_0").exists());
    }

    #[test]
    fn test_classification_ensemble_run() {
        let _guard = TRAIN_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = regression_config(tmp.path());
        cfg.dataset_type = DatasetType::Classification;
        cfg.metric = Metric::Auc;
        cfg.extra_metrics = vec![Metric::Accuracy];
        cfg.ensemble_size = 2;
        let points = molecules()
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                MoleculeDatapoint::new(vec![s.into()], vec![Some((i % 2) as f64)])
            })
            .collect();
        let data = MoleculeDataset::new(points, vec!["y".into()]).unwrap();

        let scores = run_training(&cfg, data).unwrap();
        assert!(scores.contains_key("auc"));
        assert!(scores.contains_key("accuracy"));
        // Both member checkpoints exist
        assert!(tmp.path().join("model_0").exists());
        assert!(tmp.path().join("model_1").exists());
    }

    #[test]
    fn test_ensemble_score_is_metric_of_mean_predictions() {
        let _guard = TRAIN_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = regression_config(tmp.path());
        cfg.dataset_type = DatasetType::Classification;
        cfg.metric = Metric::Accuracy;
        cfg.ensemble_size = 3;
        cfg.epochs = 1;
        cfg.split_sizes = [0.6, 0.2, 0.2];
        let smiles = [
            "C", "CC", "CCC", "CCCC", "CO", "CCO", "CCCO", "CN", "CCN", "CCCN", "CS",
            "CCS", "COC", "CCOC", "CNC", "CCNC", "C=C", "CC=C", "C#N", "CC#N",
        ];
        let points: Vec<_> = smiles
            .iter()
            .enumerate()
            .map(|(i, s)| {
                MoleculeDatapoint::new(vec![(*s).into()], vec![Some((i % 2) as f64)])
            })
            .collect();
        let data = MoleculeDataset::new(points, vec!["y".into()]).unwrap();

        let scores = run_training(&cfg, data.clone()).unwrap();

        // Recompute from the persisted member checkpoints: average
        // the members' prediction vectors FIRST, score once
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let bundle = manager.load_bundle().unwrap();
        let mut featurized = data;
        featurized.featurize(&cfg.features_generators).unwrap();
        let (_, _, mut test) = split_data(
            featurized,
            cfg.split_type,
            (cfg.split_sizes[0], cfg.split_sizes[1], cfg.split_sizes[2]),
            cfg.seed,
        )
        .unwrap();
        if let Some(scaler) = &bundle.features_scaler {
            test.apply_feature_scaler(scaler);
        }

        let device = Default::default();
        let mut mean_preds = vec![vec![0.0f64; 1]; test.len()];
        for model_idx in 0..cfg.ensemble_size {
            let model = manager
                .load_model::<EvalBackend>(&bundle, model_idx, &device)
                .unwrap();
            let preds = predict(
                &model,
                test.clone(),
                cfg.batch_size,
                &device,
                cfg.dataset_type,
                cfg.multiclass_num_classes,
                None,
            )
            .unwrap();
            for (sum_row, pred_row) in mean_preds.iter_mut().zip(&preds) {
                sum_row[0] += pred_row[0] / cfg.ensemble_size as f64;
            }
        }
        let expected = evaluate_predictions(
            &mean_preds,
            &test.targets(),
            1,
            &cfg.metrics(),
            cfg.dataset_type,
            None,
            None,
        );
        assert!((scores["accuracy"][0] - expected["accuracy"][0]).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_reproduces_scores_exactly() {
        let _guard = TRAIN_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let points = || {
            molecules()
                .into_iter()
                .enumerate()
                .map(|(i, s)| {
                    MoleculeDatapoint::new(vec![s.into()], vec![Some(i as f64 * 0.5)])
                })
                .collect::<Vec<_>>()
        };
        let mut reports = Vec::new();
        for _ in 0..2 {
            let tmp = tempfile::tempdir().unwrap();
            let cfg = regression_config(tmp.path());
            let data = MoleculeDataset::new(points(), vec!["y".into()]).unwrap();
            run_training(&cfg, data).unwrap();
            reports.push(std::fs::read_to_string(tmp.path().join("test_scores.json")).unwrap());
        }
        assert_eq!(reports[0], reports[1]);
    }

    #[test]
    fn test_all_missing_task_isolated_to_nan() {
        let _guard = TRAIN_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = regression_config(tmp.path());
        cfg.task_names = vec!["a".into(), "b".into()];
        // Task "b" has no targets anywhere
        let points = molecules()
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                MoleculeDatapoint::new(vec![s.into()], vec![Some(i as f64), None])
            })
            .collect();
        let data = MoleculeDataset::new(points, cfg.task_names.clone()).unwrap();

        let scores = run_training(&cfg, data).unwrap();
        assert!(scores["rmse"][0].is_finite());
        assert!(scores["rmse"][1].is_nan());
    }

    #[test]
    fn test_empty_test_partition_scores_nan() {
        let _guard = TRAIN_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = regression_config(tmp.path());
        cfg.split_sizes = [0.8, 0.2, 0.0];
        let points = molecules()
            .into_iter()
            .enumerate()
            .map(|(i, s)| MoleculeDatapoint::new(vec![s.into()], vec![Some(i as f64)]))
            .collect();
        let data = MoleculeDataset::new(points, vec!["y".into()]).unwrap();

        let scores = run_training(&cfg, data).unwrap();
        assert!(scores["rmse"].iter().all(|v| v.is_nan()));
    }
}
