// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Shuffles datapoints with a SEEDED generator and splits them
// into three sets:
//   - Training set:   used to update model weights
//   - Validation set: drives checkpoint selection per epoch
//   - Test set:       held out until the very end
//
// Why a seeded RNG instead of thread_rng?
//   Reproducibility is part of the contract: the same dataset
//   and the same seed must produce identical partitions so runs
//   can be compared and resumed. Different seeds produce
//   different partitions with overwhelming probability.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom
// which is the standard unbiased shuffle algorithm.
//
// Reference: rand crate documentation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::MoleculeDataset;
use crate::domain::error::{PipelineError, Result};

/// How the dataset is partitioned. Only uniform random splitting
/// lives in this core; scaffold- or key-molecule-based splitting
/// belongs to an external collaborator with the same signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    Random,
}

/// Shuffle `data` with `seed` and split into (train, val, test)
/// according to `sizes` (fractions that must sum to 1).
///
/// An empty validation or test partition is NOT an error here —
/// the training loop decides which emptiness is fatal (empty
/// validation) and which degrades gracefully (empty test).
pub fn split_data(
    data: MoleculeDataset,
    split_type: SplitType,
    sizes: (f64, f64, f64),
    seed: u64,
) -> Result<(MoleculeDataset, MoleculeDataset, MoleculeDataset)> {
    let (train_frac, val_frac, test_frac) = sizes;
    if train_frac < 0.0 || val_frac < 0.0 || test_frac < 0.0 {
        return Err(PipelineError::config(format!(
            "split sizes must be non-negative, got {sizes:?}"
        )));
    }
    if (train_frac + val_frac + test_frac - 1.0).abs() > 1e-6 {
        return Err(PipelineError::config(format!(
            "split sizes must sum to 1, got {sizes:?} (sum {})",
            train_frac + val_frac + test_frac
        )));
    }

    let task_names = data.task_names().to_vec();
    let mut points = data.into_points();

    match split_type {
        SplitType::Random => {
            // Fisher-Yates shuffle, deterministic for a fixed seed
            let mut rng = StdRng::seed_from_u64(seed);
            points.shuffle(&mut rng);
        }
    }

    let total = points.len();
    let train_size = (train_frac * total as f64) as usize;
    let train_val_size = ((train_frac + val_frac) * total as f64) as usize;

    // split_off(n) removes elements [n..] and returns them
    let rest = points.split_off(train_size.min(total));
    let train = points;
    let mut val = rest;
    let test = val.split_off((train_val_size - train_size).min(val.len()));

    tracing::debug!(
        "Dataset split with seed {}: {} train, {} val, {} test",
        seed,
        train.len(),
        val.len(),
        test.len(),
    );

    Ok((
        MoleculeDataset::new(train, task_names.clone())?,
        MoleculeDataset::new(val, task_names.clone())?,
        MoleculeDataset::new(test, task_names)?,
    ))
}
