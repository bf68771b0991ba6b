// ============================================================
// Layer 5 — Prediction Evaluation
// ============================================================
// Scores a prediction matrix against a target matrix, per task
// and per metric. The contract the rest of the pipeline leans on:
//
//   - Rows whose target is missing for a task are dropped from
//     THAT task's score only; other tasks keep them.
//   - A task with no valid rows, or a degenerate classification
//     task (one observed class), scores NaN. NaN never spreads
//     to sibling tasks.
//   - Empty prediction sets score NaN everywhere — never panic.
//   - Results come back keyed by metric name in a BTreeMap, so
//     serialized score reports have a stable key order.
//
// Spectra are scored as ONE aggregate divergence over all rows,
// not per task: a spectrum is a single observation spread across
// the task axis.

use std::collections::BTreeMap;

use crate::domain::task::{DatasetType, MeanPolicy};
use crate::ml::metrics::Metric;

/// Score `preds` against `targets` for every requested metric.
///
/// `preds[i]` is row i's predictions: `num_tasks` values, or
/// `num_tasks * num_classes` class probabilities for multiclass.
/// Returns one score per task per metric (a single aggregate
/// score for spectra).
pub fn evaluate_predictions(
    preds: &[Vec<f64>],
    targets: &[Vec<Option<f64>>],
    num_tasks: usize,
    metrics: &[Metric],
    dataset_type: DatasetType,
    gt_targets: Option<&[Vec<bool>]>,
    lt_targets: Option<&[Vec<bool>]>,
) -> BTreeMap<String, Vec<f64>> {
    let mut results = BTreeMap::new();

    if preds.is_empty() {
        let width = if dataset_type == DatasetType::Spectra {
            1
        } else {
            num_tasks
        };
        for metric in metrics {
            results.insert(metric.name().to_string(), vec![f64::NAN; width]);
        }
        return results;
    }

    if dataset_type == DatasetType::Spectra {
        let sid = spectra_sid(preds, targets);
        for metric in metrics {
            let score = if *metric == Metric::Sid { sid } else { f64::NAN };
            results.insert(metric.name().to_string(), vec![score]);
        }
        return results;
    }

    let num_classes = if dataset_type == DatasetType::Multiclass {
        preds[0].len() / num_tasks
    } else {
        1
    };

    for metric in metrics {
        let mut scores = Vec::with_capacity(num_tasks);
        for task in 0..num_tasks {
            let (task_preds, task_targets, task_gt, task_lt) =
                valid_rows(preds, targets, gt_targets, lt_targets, task, num_classes);
            scores.push(score_task(
                *metric,
                dataset_type,
                &task_preds,
                &task_targets,
                task_gt.as_deref(),
                task_lt.as_deref(),
            ));
        }
        results.insert(metric.name().to_string(), scores);
    }
    results
}

/// Rows of one task with a present target, predictions sliced to
/// that task's columns.
fn valid_rows(
    preds: &[Vec<f64>],
    targets: &[Vec<Option<f64>>],
    gt_targets: Option<&[Vec<bool>]>,
    lt_targets: Option<&[Vec<bool>]>,
    task: usize,
    num_classes: usize,
) -> (Vec<Vec<f64>>, Vec<f64>, Option<Vec<bool>>, Option<Vec<bool>>) {
    let mut task_preds = Vec::new();
    let mut task_targets = Vec::new();
    let mut task_gt = gt_targets.map(|_| Vec::new());
    let mut task_lt = lt_targets.map(|_| Vec::new());

    for (i, row) in targets.iter().enumerate() {
        let Some(target) = row[task] else { continue };
        task_targets.push(target);
        let start = task * num_classes;
        task_preds.push(preds[i][start..start + num_classes].to_vec());
        if let (Some(out), Some(gt)) = (task_gt.as_mut(), gt_targets) {
            out.push(gt[i][task]);
        }
        if let (Some(out), Some(lt)) = (task_lt.as_mut(), lt_targets) {
            out.push(lt[i][task]);
        }
    }
    (task_preds, task_targets, task_gt, task_lt)
}

fn score_task(
    metric: Metric,
    dataset_type: DatasetType,
    preds: &[Vec<f64>],
    targets: &[f64],
    gt: Option<&[bool]>,
    lt: Option<&[bool]>,
) -> f64 {
    if preds.is_empty() {
        return f64::NAN;
    }
    // Degenerate classification tasks: ranking metrics need both
    // classes in the observed targets
    if dataset_type == DatasetType::Classification && metric.requires_class_discrimination() {
        let positives = targets.iter().filter(|&&t| t > 0.5).count();
        if positives == 0 || positives == targets.len() {
            return f64::NAN;
        }
    }
    metric.compute(preds, targets, gt, lt)
}

/// Aggregate spectral information divergence across all rows.
/// Both the predicted and observed spectra are restricted to the
/// positions where the target is present, renormalized to sum to
/// one, and compared with the symmetric KL-style divergence.
fn spectra_sid(preds: &[Vec<f64>], targets: &[Vec<Option<f64>>]) -> f64 {
    const EPS: f64 = 1e-8;
    let mut total = 0.0;
    let mut rows = 0usize;

    for (pred_row, target_row) in preds.iter().zip(targets) {
        let kept: Vec<(f64, f64)> = pred_row
            .iter()
            .zip(target_row)
            .filter_map(|(&p, t)| t.map(|t| (p.max(EPS), t.max(EPS))))
            .collect();
        if kept.is_empty() {
            continue;
        }
        let pred_sum: f64 = kept.iter().map(|(p, _)| p).sum();
        let target_sum: f64 = kept.iter().map(|(_, t)| t).sum();

        total += kept
            .iter()
            .map(|(p, t)| {
                let p = p / pred_sum;
                let t = t / target_sum;
                p * (p / t).ln() + t * (t / p).ln()
            })
            .sum::<f64>();
        rows += 1;
    }

    if rows == 0 {
        f64::NAN
    } else {
        total / rows as f64
    }
}

/// Fold per-task scores into one scalar. NaN tasks are excluded
/// under both policies; all-NaN input yields NaN.
pub fn multitask_mean(scores: &[f64], valid_counts: Option<&[usize]>, policy: MeanPolicy) -> f64 {
    let weight = |task: usize| match policy {
        MeanPolicy::Uniform => 1.0,
        MeanPolicy::ValidTaskWeighted => valid_counts
            .and_then(|counts| counts.get(task))
            .map(|&c| c as f64)
            .unwrap_or(1.0),
    };

    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (task, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        let w = weight(task);
        weighted += w * score;
        total_weight += w;
    }
    if total_weight == 0.0 {
        f64::NAN
    } else {
        weighted / total_weight
    }
}

/// Number of present targets per task, the weights used by
/// [`MeanPolicy::ValidTaskWeighted`].
pub fn valid_target_counts(targets: &[Vec<Option<f64>>], num_tasks: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_tasks];
    for row in targets {
        for (task, t) in row.iter().enumerate() {
            if t.is_some() {
                counts[task] += 1;
            }
        }
    }
    counts
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_targets_filtered_per_task() {
        // Task 0 valid everywhere, task 1 valid only in row 0
        let preds = vec![vec![1.0, 5.0], vec![2.0, 9.0]];
        let targets = vec![vec![Some(1.0), Some(5.0)], vec![Some(2.0), None]];
        let scores = evaluate_predictions(
            &preds,
            &targets,
            2,
            &[Metric::Rmse],
            DatasetType::Regression,
            None,
            None,
        );
        let rmse = &scores["rmse"];
        assert_eq!(rmse[0], 0.0);
        // Row 1's wild task-1 prediction was excluded
        assert_eq!(rmse[1], 0.0);
    }

    #[test]
    fn test_all_missing_task_is_nan_isolated() {
        let preds = vec![vec![1.0, 3.0], vec![2.0, 4.0]];
        let targets = vec![vec![Some(1.0), None], vec![Some(2.0), None]];
        let scores = evaluate_predictions(
            &preds,
            &targets,
            2,
            &[Metric::Mae],
            DatasetType::Regression,
            None,
            None,
        );
        assert_eq!(scores["mae"][0], 0.0);
        assert!(scores["mae"][1].is_nan());
    }

    #[test]
    fn test_empty_predictions_are_nan_everywhere() {
        let scores = evaluate_predictions(
            &[],
            &[],
            3,
            &[Metric::Rmse, Metric::Mae],
            DatasetType::Regression,
            None,
            None,
        );
        assert_eq!(scores.len(), 2);
        for values in scores.values() {
            assert_eq!(values.len(), 3);
            assert!(values.iter().all(|v| v.is_nan()));
        }
    }

    #[test]
    fn test_degenerate_classification_task_is_nan() {
        let preds = vec![vec![0.9, 0.8], vec![0.1, 0.9]];
        let targets = vec![vec![Some(1.0), Some(1.0)], vec![Some(0.0), Some(1.0)]];
        let scores = evaluate_predictions(
            &preds,
            &targets,
            2,
            &[Metric::Auc],
            DatasetType::Classification,
            None,
            None,
        );
        assert_eq!(scores["auc"][0], 1.0);
        assert!(scores["auc"][1].is_nan());
    }

    #[test]
    fn test_multiclass_slices_class_columns() {
        // Two tasks, three classes each; row predicts classes 1 and 2
        let preds = vec![vec![0.1, 0.8, 0.1, 0.2, 0.2, 0.6]];
        let targets = vec![vec![Some(1.0), Some(2.0)]];
        let scores = evaluate_predictions(
            &preds,
            &targets,
            2,
            &[Metric::Accuracy],
            DatasetType::Multiclass,
            None,
            None,
        );
        assert_eq!(scores["accuracy"], vec![1.0, 1.0]);
    }

    #[test]
    fn test_spectra_single_aggregate_score() {
        let preds = vec![vec![0.5, 0.5], vec![0.3, 0.7]];
        let targets = vec![vec![Some(0.5), Some(0.5)], vec![Some(0.3), Some(0.7)]];
        let scores = evaluate_predictions(
            &preds,
            &targets,
            2,
            &[Metric::Sid],
            DatasetType::Spectra,
            None,
            None,
        );
        assert_eq!(scores["sid"].len(), 1);
        assert!(scores["sid"][0].abs() < 1e-12);
    }

    #[test]
    fn test_multitask_mean_policies() {
        let scores = [1.0, 3.0, f64::NAN];
        assert_eq!(multitask_mean(&scores, None, MeanPolicy::Uniform), 2.0);
        let counts = [1, 3, 10];
        let weighted = multitask_mean(&scores, Some(&counts), MeanPolicy::ValidTaskWeighted);
        assert!((weighted - (1.0 + 9.0) / 4.0).abs() < 1e-12);
        assert!(multitask_mean(&[f64::NAN], None, MeanPolicy::Uniform).is_nan());
    }

    #[test]
    fn test_stable_key_order() {
        let preds = vec![vec![1.0]];
        let targets = vec![vec![Some(1.0)]];
        let scores = evaluate_predictions(
            &preds,
            &targets,
            1,
            &[Metric::Rmse, Metric::Mae, Metric::R2],
            DatasetType::Regression,
            None,
            None,
        );
        let keys: Vec<&String> = scores.keys().collect();
        assert_eq!(keys, ["mae", "r2", "rmse"]);
    }
}
