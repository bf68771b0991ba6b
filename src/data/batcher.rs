// ============================================================
// Layer 4 — Molecule Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec of
// MoleculeDatapoints into backend tensors.
//
// How batching works here:
//   Input:  Vec of N featurized datapoints, features of width F,
//           T tasks
//   Output: MoleculeBatch with
//             features    [N, F] float
//             targets     [N, T] float (missing → 0.0)
//             target_mask [N, T] float (1.0 where target present)
//             gt/lt masks [N, T] float (censoring indicators)
//
// Missing targets are carried as an explicit mask rather than a
// sentinel value, so the loss can zero their contribution exactly.
//
// Precondition: every datapoint reaching this batcher has been
// featurized and validated upstream — the core assumes all
// batches are well-formed.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::MoleculeDatapoint;

/// A batch of datapoints ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct MoleculeBatch<B: Backend> {
    /// Molecule features — shape: [batch_size, features_size]
    pub features: Tensor<B, 2>,

    /// Targets with missing entries zeroed — shape: [batch, tasks]
    pub targets: Tensor<B, 2>,

    /// 1.0 where the target is present, 0.0 where missing
    pub target_mask: Tensor<B, 2>,

    /// 1.0 where the target is a greater-than bound
    pub gt_mask: Tensor<B, 2>,

    /// 1.0 where the target is a less-than bound
    pub lt_mask: Tensor<B, 2>,
}

/// The batcher struct — holds the target device so tensors are
/// created in the right place.
#[derive(Clone, Debug)]
pub struct MoleculeBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MoleculeBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MoleculeDatapoint, MoleculeBatch<B>> for MoleculeBatcher<B> {
    fn batch(&self, items: Vec<MoleculeDatapoint>) -> MoleculeBatch<B> {
        let batch_size = items.len();
        let num_tasks = items[0].targets.len();
        let features_size = items[0]
            .features
            .as_ref()
            .expect("datapoints must be featurized before batching")
            .len();

        // Flatten rows into one Vec per tensor, then reshape
        let mut features_flat = Vec::with_capacity(batch_size * features_size);
        let mut targets_flat = Vec::with_capacity(batch_size * num_tasks);
        let mut mask_flat = Vec::with_capacity(batch_size * num_tasks);
        let mut gt_flat = Vec::with_capacity(batch_size * num_tasks);
        let mut lt_flat = Vec::with_capacity(batch_size * num_tasks);

        for item in &items {
            let features = item
                .features
                .as_ref()
                .expect("datapoints must be featurized before batching");
            features_flat.extend(features.iter().map(|&v| v as f32));

            for (t, target) in item.targets.iter().enumerate() {
                match target {
                    Some(v) => {
                        targets_flat.push(*v as f32);
                        mask_flat.push(1.0f32);
                    }
                    None => {
                        targets_flat.push(0.0);
                        mask_flat.push(0.0);
                    }
                }
                let gt = item.gt_targets.as_ref().map(|b| b[t]).unwrap_or(false);
                let lt = item.lt_targets.as_ref().map(|b| b[t]).unwrap_or(false);
                gt_flat.push(gt as u8 as f32);
                lt_flat.push(lt as u8 as f32);
            }
        }

        let to_2d = |flat: Vec<f32>, width: usize| {
            Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
                .reshape([batch_size, width])
        };

        MoleculeBatch {
            features: to_2d(features_flat, features_size),
            targets: to_2d(targets_flat, num_tasks),
            target_mask: to_2d(mask_flat, num_tasks),
            gt_mask: to_2d(gt_flat, num_tasks),
            lt_mask: to_2d(lt_flat, num_tasks),
        }
    }
}
