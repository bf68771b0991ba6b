// ============================================================
// Layer 3 — Task Semantics
// ============================================================
// What kind of prediction problem a dataset poses. The dataset
// type decides the loss, the prediction post-processing, the
// default metric, and whether targets are scaled — so it lives
// here in the domain layer where both the config surface and
// the training core can reach it.

use serde::{Deserialize, Serialize};

/// The four prediction regimes the pipeline supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    /// Continuous targets; trained on scaled values, reported
    /// in the original units
    Regression,
    /// Binary targets; the model emits logits, predictions are
    /// sigmoid probabilities
    Classification,
    /// Integer class targets; predictions are per-class softmax
    /// probabilities
    Multiclass,
    /// Each target row is one measured spectrum, normalized to a
    /// probability distribution
    Spectra,
}

impl DatasetType {
    /// Only regression targets go through a standard scaler.
    pub fn scales_targets(self) -> bool {
        matches!(self, DatasetType::Regression)
    }
}

impl std::fmt::Display for DatasetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DatasetType::Regression => "regression",
            DatasetType::Classification => "classification",
            DatasetType::Multiclass => "multiclass",
            DatasetType::Spectra => "spectra",
        })
    }
}

/// How per-task scores fold into the single scalar used for
/// checkpoint selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeanPolicy {
    /// Every task counts equally (NaN tasks excluded)
    Uniform,
    /// Tasks weighted by how many datapoints actually carry a
    /// target for them, so sparse tasks do not dominate
    ValidTaskWeighted,
}
