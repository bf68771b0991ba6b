// ============================================================
// Layer 5 — Metrics
// ============================================================
// Per-task scoring functions plus the metadata the training loop
// needs about each metric:
//   - its optimization direction (minimize or maximize), fixed
//     at start and used for checkpoint selection
//   - its censored-target correction policy — parameterized per
//     metric, not hardcoded: error metrics tolerate a prediction
//     in the bound-satisfying direction without penalty, ranking
//     metrics ignore bounds entirely
//   - whether it needs class discrimination, so degenerate tasks
//     (fewer than two observed classes) score NaN instead of
//     failing the whole evaluation
//
// Every function here returns NaN for undefined inputs rather
// than raising: metric degeneracy is a soft condition surfaced
// in the score report, not an error.

use serde::{Deserialize, Serialize};

/// How a metric treats censored (gt/lt) targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundCorrection {
    /// Clamp the prediction to the bound when it already satisfies
    /// the inequality, so only directional violations are penalized
    ClampToBound,
    /// Bounds carry no usable signal for this metric
    Ignore,
}

/// The evaluation metrics this pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Rmse,
    Mae,
    Mse,
    R2,
    Auc,
    Accuracy,
    BinaryCrossEntropy,
    CrossEntropy,
    Sid,
}

impl Metric {
    /// True when smaller scores are better. Drives the
    /// checkpoint-if-improved comparison.
    pub fn is_minimized(self) -> bool {
        !matches!(self, Metric::R2 | Metric::Auc | Metric::Accuracy)
    }

    /// The censored-target correction to apply before scoring.
    pub fn bound_correction(self) -> BoundCorrection {
        match self {
            Metric::Rmse | Metric::Mae | Metric::Mse => BoundCorrection::ClampToBound,
            _ => BoundCorrection::Ignore,
        }
    }

    /// Ranking-based metrics need at least two observed classes.
    pub fn requires_class_discrimination(self) -> bool {
        matches!(self, Metric::Auc)
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::Mse => "mse",
            Metric::R2 => "r2",
            Metric::Auc => "auc",
            Metric::Accuracy => "accuracy",
            Metric::BinaryCrossEntropy => "binary_cross_entropy",
            Metric::CrossEntropy => "cross_entropy",
            Metric::Sid => "sid",
        }
    }

    /// Score one task. `preds[i]` is a single value for scalar
    /// tasks or the per-class probabilities for multiclass tasks;
    /// `targets[i]` is the observed value (class index for
    /// classification-style metrics). Rows with missing targets
    /// have already been filtered out by the evaluator.
    ///
    /// `Sid` is spectrum-level and scored by the evaluator
    /// directly; asking for it per task is undefined.
    pub fn compute(
        self,
        preds: &[Vec<f64>],
        targets: &[f64],
        gt: Option<&[bool]>,
        lt: Option<&[bool]>,
    ) -> f64 {
        if preds.is_empty() || preds.len() != targets.len() {
            return f64::NAN;
        }
        match self {
            Metric::Rmse => mse(preds, targets, gt, lt).sqrt(),
            Metric::Mse => mse(preds, targets, gt, lt),
            Metric::Mae => {
                let n = preds.len() as f64;
                bounded_errors(preds, targets, gt, lt)
                    .map(f64::abs)
                    .sum::<f64>()
                    / n
            }
            Metric::R2 => r2(preds, targets),
            Metric::Auc => auc(preds, targets),
            Metric::Accuracy => accuracy(preds, targets),
            Metric::BinaryCrossEntropy => binary_cross_entropy(preds, targets),
            Metric::CrossEntropy => cross_entropy(preds, targets),
            Metric::Sid => f64::NAN,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "rmse" => Metric::Rmse,
            "mae" => Metric::Mae,
            "mse" => Metric::Mse,
            "r2" => Metric::R2,
            "auc" => Metric::Auc,
            "accuracy" => Metric::Accuracy,
            "binary_cross_entropy" => Metric::BinaryCrossEntropy,
            "cross_entropy" => Metric::CrossEntropy,
            "sid" => Metric::Sid,
            other => return Err(format!("unknown metric '{other}'")),
        })
    }
}

// ─── Scoring functions ────────────────────────────────────────────────────────

/// Signed errors after the clamp-to-bound censoring correction:
/// a prediction beyond a gt bound (or below an lt bound) counts
/// as exactly on the bound.
fn bounded_errors<'a>(
    preds: &'a [Vec<f64>],
    targets: &'a [f64],
    gt: Option<&'a [bool]>,
    lt: Option<&'a [bool]>,
) -> impl Iterator<Item = f64> + 'a {
    preds.iter().enumerate().map(move |(i, p)| {
        let p = p[0];
        let t = targets[i];
        let gt_bound = gt.map(|g| g[i]).unwrap_or(false);
        let lt_bound = lt.map(|l| l[i]).unwrap_or(false);
        let adjusted = if gt_bound && p > t {
            t
        } else if lt_bound && p < t {
            t
        } else {
            p
        };
        adjusted - t
    })
}

fn mse(preds: &[Vec<f64>], targets: &[f64], gt: Option<&[bool]>, lt: Option<&[bool]>) -> f64 {
    let n = preds.len() as f64;
    bounded_errors(preds, targets, gt, lt)
        .map(|e| e * e)
        .sum::<f64>()
        / n
}

fn r2(preds: &[Vec<f64>], targets: &[f64]) -> f64 {
    let n = targets.len() as f64;
    let mean = targets.iter().sum::<f64>() / n;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean) * (t - mean)).sum();
    if ss_tot == 0.0 {
        // Constant targets — explained variance is undefined
        return f64::NAN;
    }
    let ss_res: f64 = preds
        .iter()
        .zip(targets)
        .map(|(p, t)| (p[0] - t) * (p[0] - t))
        .sum();
    1.0 - ss_res / ss_tot
}

/// ROC-AUC via the rank-sum (Mann-Whitney) formulation with
/// average ranks for ties. NaN when only one class is present.
fn auc(preds: &[Vec<f64>], targets: &[f64]) -> f64 {
    let n = preds.len();
    let positives = targets.iter().filter(|&&t| t > 0.5).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        preds[a][0]
            .partial_cmp(&preds[b][0])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks across tied prediction values
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && preds[order[j + 1]][0] == preds[order[i]][0] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = (0..n).filter(|&i| targets[i] > 0.5).map(|i| ranks[i]).sum();
    let p = positives as f64;
    (rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

/// Binary threshold at 0.5, or argmax for multiclass rows.
fn accuracy(preds: &[Vec<f64>], targets: &[f64]) -> f64 {
    let correct = preds
        .iter()
        .zip(targets)
        .filter(|(p, &t)| {
            if p.len() > 1 {
                argmax(p) == t as usize
            } else {
                (p[0] > 0.5) == (t > 0.5)
            }
        })
        .count();
    correct as f64 / preds.len() as f64
}

fn binary_cross_entropy(preds: &[Vec<f64>], targets: &[f64]) -> f64 {
    let n = preds.len() as f64;
    preds
        .iter()
        .zip(targets)
        .map(|(p, &t)| {
            let p = p[0].clamp(1e-12, 1.0 - 1e-12);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}

fn cross_entropy(preds: &[Vec<f64>], targets: &[f64]) -> f64 {
    let n = preds.len() as f64;
    let mut total = 0.0;
    for (p, &t) in preds.iter().zip(targets) {
        let class = t as usize;
        // A label outside the prediction width is a malformed
        // target; NaN for the task, same as the other degeneracies
        if t < 0.0 || class >= p.len() {
            return f64::NAN;
        }
        total += -p[class].max(1e-12).ln();
    }
    total / n
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(values: &[f64]) -> Vec<Vec<f64>> {
        values.iter().map(|&v| vec![v]).collect()
    }

    #[test]
    fn test_rmse_and_mae() {
        let preds = scalar(&[1.0, 2.0, 3.0]);
        let targets = [1.0, 2.0, 5.0];
        assert!((Metric::Mae.compute(&preds, &targets, None, None) - 2.0 / 3.0).abs() < 1e-12);
        assert!(
            (Metric::Rmse.compute(&preds, &targets, None, None) - (4.0f64 / 3.0).sqrt()).abs()
                < 1e-12
        );
    }

    #[test]
    fn test_bound_satisfying_prediction_not_penalized() {
        // Target is a gt bound of 2.0; predicting above it is free
        let preds = scalar(&[5.0]);
        let targets = [2.0];
        let gt = [true];
        let lt = [false];
        let rmse = Metric::Rmse.compute(&preds, &targets, Some(&gt), Some(&lt));
        assert_eq!(rmse, 0.0);

        // Predicting BELOW a gt bound is still an error
        let rmse = Metric::Rmse.compute(&scalar(&[1.0]), &targets, Some(&gt), Some(&lt));
        assert_eq!(rmse, 1.0);

        // Ranking metrics ignore bounds
        assert_eq!(Metric::Auc.bound_correction(), BoundCorrection::Ignore);
    }

    #[test]
    fn test_auc_perfect_and_random() {
        let targets = [0.0, 0.0, 1.0, 1.0];
        let perfect = scalar(&[0.1, 0.2, 0.8, 0.9]);
        assert_eq!(Metric::Auc.compute(&perfect, &targets, None, None), 1.0);

        let inverted = scalar(&[0.9, 0.8, 0.2, 0.1]);
        assert_eq!(Metric::Auc.compute(&inverted, &targets, None, None), 0.0);

        // All-tied predictions → 0.5 by average ranks
        let flat = scalar(&[0.5, 0.5, 0.5, 0.5]);
        assert!((Metric::Auc.compute(&flat, &targets, None, None) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_auc_degenerate_labels_is_nan() {
        let preds = scalar(&[0.2, 0.8]);
        assert!(Metric::Auc.compute(&preds, &[1.0, 1.0], None, None).is_nan());
        assert!(Metric::Auc.compute(&preds, &[0.0, 0.0], None, None).is_nan());
    }

    #[test]
    fn test_accuracy_binary_and_multiclass() {
        let preds = scalar(&[0.9, 0.2, 0.6]);
        let targets = [1.0, 0.0, 0.0];
        assert!((Metric::Accuracy.compute(&preds, &targets, None, None) - 2.0 / 3.0).abs() < 1e-12);

        let preds = vec![vec![0.1, 0.7, 0.2], vec![0.8, 0.1, 0.1]];
        let targets = [1.0, 2.0];
        assert!((Metric::Accuracy.compute(&preds, &targets, None, None) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cross_entropy_out_of_range_class_is_nan() {
        let preds = vec![vec![0.2, 0.8], vec![0.9, 0.1]];
        // Class 2 does not exist in a two-class prediction row
        assert!(Metric::CrossEntropy
            .compute(&preds, &[0.0, 2.0], None, None)
            .is_nan());
        assert!(Metric::CrossEntropy
            .compute(&preds, &[0.0, -1.0], None, None)
            .is_nan());
        // In-range labels still score normally
        assert!(Metric::CrossEntropy
            .compute(&preds, &[1.0, 0.0], None, None)
            .is_finite());
    }

    #[test]
    fn test_r2_constant_targets_is_nan() {
        let preds = scalar(&[1.0, 2.0]);
        assert!(Metric::R2.compute(&preds, &[3.0, 3.0], None, None).is_nan());
    }

    #[test]
    fn test_directions() {
        assert!(Metric::Rmse.is_minimized());
        assert!(Metric::Sid.is_minimized());
        assert!(!Metric::Auc.is_minimized());
        assert!(!Metric::R2.is_minimized());
    }

    #[test]
    fn test_empty_input_is_nan_not_panic() {
        for metric in [Metric::Rmse, Metric::Auc, Metric::Accuracy, Metric::R2] {
            assert!(metric.compute(&[], &[], None, None).is_nan());
        }
    }
}
