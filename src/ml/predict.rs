// ============================================================
// Layer 5 — Prediction
// ============================================================
// Runs a trained model over a dataset and post-processes the raw
// scores into the units evaluation expects:
//
//   regression     : inverse target scaling (training units →
//                    original units)
//   classification : sigmoid probabilities
//   multiclass     : softmax per task, rows stay flattened as
//                    [task0 classes..., task1 classes...]
//   spectra        : softplus intensities normalized per row
//
// The loader here never shuffles — row order must line up with
// the dataset so predictions can be matched back to targets.

use burn::data::dataloader::DataLoaderBuilder;
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, softmax, softplus};

use crate::data::batcher::MoleculeBatcher;
use crate::data::dataset::MoleculeDataset;
use crate::data::scaler::StandardScaler;
use crate::domain::error::{PipelineError, Result};
use crate::domain::task::DatasetType;
use crate::ml::model::MoleculePredictor;

/// Predict every datapoint, in dataset order.
pub fn predict<B: Backend>(
    model: &MoleculePredictor<B>,
    data: MoleculeDataset,
    batch_size: usize,
    device: &B::Device,
    dataset_type: DatasetType,
    num_classes: usize,
    target_scaler: Option<&StandardScaler>,
) -> Result<Vec<Vec<f64>>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let num_tasks = data.num_tasks();

    let batcher = MoleculeBatcher::<B>::new(device.clone());
    let loader = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .num_workers(1)
        .build(data);

    let mut rows = Vec::new();
    for batch in loader.iter() {
        let scores = model.forward(batch.features);
        let [rows_in_batch, _] = scores.dims();

        let processed = match dataset_type {
            DatasetType::Regression => scores,
            DatasetType::Classification => sigmoid(scores),
            DatasetType::Multiclass => {
                let per_task = scores.reshape([rows_in_batch, num_tasks, num_classes]);
                softmax(per_task, 2).reshape([rows_in_batch, num_tasks * num_classes])
            }
            DatasetType::Spectra => {
                let intensities = softplus(scores, 1.0);
                let sums = intensities
                    .clone()
                    .sum_dim(1)
                    .clamp_min(1e-8)
                    .expand([rows_in_batch, num_tasks]);
                intensities / sums
            }
        };

        let width = match dataset_type {
            DatasetType::Multiclass => num_tasks * num_classes,
            _ => num_tasks,
        };
        let flat: Vec<f32> = processed
            .into_data()
            .to_vec()
            .map_err(|e| PipelineError::data(format!("failed to read predictions: {e:?}")))?;
        for chunk in flat.chunks(width) {
            let mut row: Vec<f64> = chunk.iter().map(|&v| v as f64).collect();
            if let Some(scaler) = target_scaler {
                row = scaler.inverse_transform(&row);
            }
            rows.push(row);
        }
    }
    Ok(rows)
}
