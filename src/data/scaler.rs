// ============================================================
// Layer 4 — Standard Scaler
// ============================================================
// Per-dimension zero-mean / unit-variance normalization.
//
// The contract that keeps training and inference symmetric:
//   - fit() runs on the TRAINING partition only
//   - the fitted scaler is applied verbatim to validation and
//     test, and is serialized into the checkpoint bundle so the
//     inference path can undo the transform
//   - once fitted, a scaler is immutable
//
// Degenerate dimensions: a zero-variance (or all-missing) column
// would divide by zero, so its std is substituted with the
// sentinel 1.0 and its mean with 0.0 when undefined — such
// dimensions are identity-mapped (documented behavior, relied on
// by the round-trip tests).
//
// Missing values are NaN on the way in; transform() replaces any
// NaN output with `replace_nan_token` so downstream tensors stay
// finite.

use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, Result};

/// Fitted normalization statistics for one feature/target space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
    replace_nan_token: f64,
}

impl StandardScaler {
    /// Fit per-dimension mean and standard deviation on `rows`,
    /// ignoring NaN entries (missing values).
    pub fn fit(rows: &[Vec<f64>], replace_nan_token: f64) -> Result<Self> {
        let width = rows
            .first()
            .map(|r| r.len())
            .ok_or_else(|| PipelineError::data("cannot fit a scaler on an empty set"))?;
        if rows.iter().any(|r| r.len() != width) {
            return Err(PipelineError::data(
                "cannot fit a scaler on rows of differing widths",
            ));
        }

        let mut means = vec![0.0; width];
        let mut stds = vec![0.0; width];
        for d in 0..width {
            let values: Vec<f64> = rows.iter().map(|r| r[d]).filter(|v| !v.is_nan()).collect();
            let (mean, std) = if values.is_empty() {
                // All-missing column: identity-mapped
                (0.0, 1.0)
            } else {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
                    / values.len() as f64;
                (mean, var.sqrt())
            };
            means[d] = mean;
            // Zero variance would make the transform degenerate —
            // substitute the sentinel and leave the dimension alone
            stds[d] = if std == 0.0 || std.is_nan() { 1.0 } else { std };
        }

        Ok(Self {
            means,
            stds,
            replace_nan_token,
        })
    }

    /// Fit on optional-valued target rows (None = missing).
    pub fn fit_targets(rows: &[Vec<Option<f64>>], replace_nan_token: f64) -> Result<Self> {
        let as_nan: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| r.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        Self::fit(&as_nan, replace_nan_token)
    }

    /// `(x - mean) / std` per dimension; NaN becomes the
    /// configured replacement token.
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&x, (&m, &s))| {
                let scaled = (x - m) / s;
                if scaled.is_nan() {
                    self.replace_nan_token
                } else {
                    scaled
                }
            })
            .collect()
    }

    /// Inverse of `transform` for finite inputs.
    pub fn inverse_transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&x, (&m, &s))| x * s + m)
            .collect()
    }

    /// Transform optional-valued targets, preserving missingness.
    pub fn transform_targets(&self, row: &[Option<f64>]) -> Vec<Option<f64>> {
        row.iter()
            .enumerate()
            .map(|(d, v)| v.map(|x| (x - self.means[d]) / self.stds[d]))
            .collect()
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }
}
