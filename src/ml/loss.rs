// ============================================================
// Layer 5 — Masked Training Losses
// ============================================================
// One loss per dataset type, all sharing the same masking rule:
// a missing target contributes exactly zero to the loss AND to
// the averaging denominator. Masks arrive from the batcher as
// float tensors, so masking is plain tensor arithmetic — no
// boolean indexing, no host round-trips inside the training loop.
//
// Censored regression targets use the same correction the error
// metrics use: a prediction already satisfying its inequality
// bound is moved onto the bound before the squared error, so it
// is not penalized for being on the right side.
//
// Reference: Burn Book §3 (Tensor operations)

use burn::prelude::*;
use burn::tensor::activation::{log_softmax, softplus};

use crate::data::batcher::MoleculeBatch;
use crate::domain::task::DatasetType;

const SID_EPS: f32 = 1e-8;

/// Scalar training loss for one batch of raw model scores.
///
/// `preds` is [batch, num_tasks] (or [batch, num_tasks * num_classes]
/// for multiclass).
pub fn compute_loss<B: Backend>(
    dataset_type: DatasetType,
    preds: Tensor<B, 2>,
    batch: &MoleculeBatch<B>,
    num_classes: usize,
) -> Tensor<B, 1> {
    match dataset_type {
        DatasetType::Regression => bounded_mse(preds, batch),
        DatasetType::Classification => masked_bce_with_logits(preds, batch),
        DatasetType::Multiclass => masked_cross_entropy(preds, batch, num_classes),
        DatasetType::Spectra => masked_sid(preds, batch),
    }
}

/// Mean squared error with the censoring correction. The bound
/// indicator is float arithmetic:
///
///   ind = gt_mask * 1[pred > target] + lt_mask * 1[pred < target]
///   adjusted = pred * (1 - ind) + target * ind
///
/// so a bound-satisfying prediction collapses onto its bound and
/// contributes zero error.
fn bounded_mse<B: Backend>(preds: Tensor<B, 2>, batch: &MoleculeBatch<B>) -> Tensor<B, 1> {
    let targets = batch.targets.clone();

    let above = preds.clone().greater(targets.clone()).float();
    let below = preds.clone().lower(targets.clone()).float();
    let indicator = batch.gt_mask.clone() * above + batch.lt_mask.clone() * below;

    let adjusted =
        preds * (indicator.clone().neg() + 1.0) + targets.clone() * indicator;

    let squared = (adjusted - targets).powf_scalar(2.0) * batch.target_mask.clone();
    squared.sum() / batch.target_mask.clone().sum().clamp_min(1.0)
}

/// Numerically stable binary cross-entropy on logits:
///
///   loss(x, z) = max(x, 0) - x*z + ln(1 + exp(-|x|))
///
/// masked and averaged over present targets only.
fn masked_bce_with_logits<B: Backend>(
    preds: Tensor<B, 2>,
    batch: &MoleculeBatch<B>,
) -> Tensor<B, 1> {
    let z = batch.targets.clone();
    let per_element = preds.clone().clamp_min(0.0) - preds.clone() * z
        + (preds.abs().neg().exp() + 1.0).log();

    let masked = per_element * batch.target_mask.clone();
    masked.sum() / batch.target_mask.clone().sum().clamp_min(1.0)
}

/// Multiclass negative log-likelihood. Scores reshape to
/// [batch, tasks, classes], log-softmax over the class axis,
/// then the target class is gathered per task.
fn masked_cross_entropy<B: Backend>(
    preds: Tensor<B, 2>,
    batch: &MoleculeBatch<B>,
    num_classes: usize,
) -> Tensor<B, 1> {
    let [batch_size, num_tasks] = batch.targets.dims();
    let scores = preds.reshape([batch_size, num_tasks, num_classes]);
    let log_probs = log_softmax(scores, 2);

    // Missing targets were zeroed by the batcher, a valid class
    // index, so gather is safe; the mask removes their loss.
    let class_indices = batch.targets.clone().int().reshape([batch_size, num_tasks, 1]);
    let picked = log_probs
        .gather(2, class_indices)
        .reshape([batch_size, num_tasks]);

    let masked = picked.neg() * batch.target_mask.clone();
    masked.sum() / batch.target_mask.clone().sum().clamp_min(1.0)
}

/// Spectral information divergence. Raw scores pass through
/// softplus to become positive intensities, are renormalized over
/// the present positions of each row, and compared to the target
/// distribution with the symmetric divergence.
fn masked_sid<B: Backend>(preds: Tensor<B, 2>, batch: &MoleculeBatch<B>) -> Tensor<B, 1> {
    let [batch_size, num_tasks] = batch.targets.dims();
    let mask = batch.target_mask.clone();

    let intensities = softplus(preds, 1.0).clamp_min(SID_EPS) * mask.clone();
    let row_sums = intensities
        .clone()
        .sum_dim(1)
        .expand([batch_size, num_tasks]);
    let pred_dist = (intensities / row_sums.clamp_min(SID_EPS)).clamp_min(SID_EPS);

    // Masked positions become 1.0 on both sides so their log
    // ratio is exactly zero
    let ones = (mask.clone().neg() + 1.0).clamp_min(0.0);
    let p = pred_dist * mask.clone() + ones.clone();
    let t = batch.targets.clone().clamp_min(SID_EPS) * mask.clone() + ones;

    let divergence = p.clone() * (p.clone() / t.clone()).log() + t.clone() * (t / p).log();
    divergence.sum() / mask.sum().clamp_min(1.0)
}
