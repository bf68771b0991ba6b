// ============================================================
// Layer 4 — Molecule Dataset
// ============================================================
// The ordered collection of datapoints the whole pipeline runs
// on. Each datapoint holds:
//   - one or more molecules (multi-component inputs)
//   - a target vector, one entry per task, possibly missing
//     and possibly censored (gt/lt inequality bounds)
//   - an optional precomputed feature vector
//   - optional per-atom / per-bond descriptor rows
//   - an optional phase-indicator vector (spectra datasets)
//
// Invariant enforced at construction: every datapoint shares the
// dataset's task schema — the task count is fixed at load time.
//
// MoleculeDataset also implements Burn's Dataset trait so the
// DataLoader can call .get(index) and .len() on it.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::scaler::StandardScaler;
use crate::domain::error::{PipelineError, Result};
use crate::domain::molecule::Molecule;
use crate::features::fingerprints::MoleculeInput;
use crate::features::get_features_generator;

/// One molecule record with its targets and optional side data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoleculeDatapoint {
    /// SMILES of each component (usually one, more for mixtures
    /// and reactions)
    pub smiles: Vec<String>,

    /// One value per task; None = missing
    pub targets: Vec<Option<f64>>,

    /// Censoring masks: true marks "true value is at least /
    /// at most the stored target". None = nothing censored.
    pub gt_targets: Option<Vec<bool>>,
    pub lt_targets: Option<Vec<bool>>,

    /// Precomputed or generated molecule-level features
    pub features: Option<Vec<f64>>,

    /// Optional extra descriptor rows, one per atom / per bond
    pub atom_descriptors: Option<Vec<Vec<f64>>>,
    pub bond_features: Option<Vec<Vec<f64>>>,

    /// Phase indicator for spectra datasets (one-hot over phases)
    pub phase_features: Option<Vec<f64>>,
}

impl MoleculeDatapoint {
    pub fn new(smiles: Vec<String>, targets: Vec<Option<f64>>) -> Self {
        Self {
            smiles,
            targets,
            gt_targets: None,
            lt_targets: None,
            features: None,
            atom_descriptors: None,
            bond_features: None,
            phase_features: None,
        }
    }

    pub fn with_features(mut self, features: Vec<f64>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_bounds(mut self, gt: Vec<bool>, lt: Vec<bool>) -> Self {
        self.gt_targets = Some(gt);
        self.lt_targets = Some(lt);
        self
    }

    pub fn with_phase_features(mut self, phase: Vec<f64>) -> Self {
        self.phase_features = Some(phase);
        self
    }

    /// The molecules of this datapoint, parsed lazily downstream.
    pub fn molecules(&self) -> Vec<Molecule> {
        self.smiles.iter().map(Molecule::from_smiles).collect()
    }
}

/// Ordered sequence of datapoints sharing one task schema.
#[derive(Debug, Clone)]
pub struct MoleculeDataset {
    points: Vec<MoleculeDatapoint>,
    task_names: Vec<String>,
}

impl MoleculeDataset {
    /// Build a dataset, checking the task-schema invariant: every
    /// datapoint's target (and bound) vectors match the task count.
    pub fn new(points: Vec<MoleculeDatapoint>, task_names: Vec<String>) -> Result<Self> {
        let num_tasks = task_names.len();
        for (i, p) in points.iter().enumerate() {
            if p.targets.len() != num_tasks {
                return Err(PipelineError::data(format!(
                    "datapoint {i} has {} targets but the dataset schema has {num_tasks} tasks",
                    p.targets.len()
                )));
            }
            for bounds in [&p.gt_targets, &p.lt_targets].into_iter().flatten() {
                if bounds.len() != num_tasks {
                    return Err(PipelineError::data(format!(
                        "datapoint {i} has a bound mask of width {} for {num_tasks} tasks",
                        bounds.len()
                    )));
                }
            }
        }
        Ok(Self { points, task_names })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn num_tasks(&self) -> usize {
        self.task_names.len()
    }

    pub fn task_names(&self) -> &[String] {
        &self.task_names
    }

    pub fn points(&self) -> &[MoleculeDatapoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<MoleculeDatapoint> {
        self.points
    }

    /// SMILES of every datapoint (components joined with '.')
    pub fn smiles(&self) -> Vec<String> {
        self.points.iter().map(|p| p.smiles.join(".")).collect()
    }

    /// Target matrix, one row per datapoint.
    pub fn targets(&self) -> Vec<Vec<Option<f64>>> {
        self.points.iter().map(|p| p.targets.clone()).collect()
    }

    /// Replace every datapoint's targets (used by spectra
    /// normalization). Row count and widths must match the schema.
    pub fn set_targets(&mut self, targets: Vec<Vec<Option<f64>>>) -> Result<()> {
        if targets.len() != self.points.len() {
            return Err(PipelineError::data(format!(
                "set_targets got {} rows for {} datapoints",
                targets.len(),
                self.points.len()
            )));
        }
        for (p, t) in self.points.iter_mut().zip(targets) {
            if t.len() != self.task_names.len() {
                return Err(PipelineError::data(
                    "set_targets row width does not match the task schema",
                ));
            }
            p.targets = t;
        }
        Ok(())
    }

    /// Greater-than censoring masks, if any datapoint carries one.
    pub fn gt_targets(&self) -> Option<Vec<Vec<bool>>> {
        self.bound_masks(|p| p.gt_targets.as_ref())
    }

    /// Less-than censoring masks, if any datapoint carries one.
    pub fn lt_targets(&self) -> Option<Vec<Vec<bool>>> {
        self.bound_masks(|p| p.lt_targets.as_ref())
    }

    fn bound_masks<'a>(
        &'a self,
        pick: impl Fn(&'a MoleculeDatapoint) -> Option<&'a Vec<bool>>,
    ) -> Option<Vec<Vec<bool>>> {
        if self.points.iter().all(|p| pick(p).is_none()) {
            return None;
        }
        let width = self.task_names.len();
        Some(
            self.points
                .iter()
                .map(|p| pick(p).cloned().unwrap_or_else(|| vec![false; width]))
                .collect(),
        )
    }

    /// Phase-indicator matrix if every datapoint carries one.
    pub fn phase_features(&self) -> Option<Vec<Vec<f64>>> {
        self.points
            .iter()
            .map(|p| p.phase_features.clone())
            .collect()
    }

    /// Width of the feature vectors, if featurized.
    pub fn features_size(&self) -> Option<usize> {
        self.points
            .first()
            .and_then(|p| p.features.as_ref())
            .map(|f| f.len())
    }

    /// Run the named registry generators over every datapoint and
    /// append their output to its feature vector, in generator
    /// order. Unknown names fail before any molecule is touched.
    pub fn featurize(&mut self, generator_names: &[String]) -> Result<()> {
        // Fail fast on unknown names — nothing half-featurized
        let generators = generator_names
            .iter()
            .map(|name| get_features_generator(name))
            .collect::<Result<Vec<_>>>()?;

        for point in &mut self.points {
            let mut appended = point.features.take().unwrap_or_default();
            for generator in &generators {
                // A multi-component datapoint is one group; the
                // generator flattens per-molecule vectors which we
                // concatenate into one row
                let input = MoleculeInput::Grouped(vec![point.molecules()]);
                for vector in generator(&input)?.into_vectors() {
                    appended.extend_from_slice(&vector);
                }
            }
            point.features = Some(appended);
        }
        Ok(())
    }

    /// Fit a feature scaler on THIS dataset (call on the training
    /// partition only).
    pub fn fit_feature_scaler(&self, replace_nan_token: f64) -> Result<StandardScaler> {
        let rows: Vec<Vec<f64>> = self
            .points
            .iter()
            .map(|p| {
                p.features.clone().ok_or_else(|| {
                    PipelineError::data("cannot fit a feature scaler before featurization")
                })
            })
            .collect::<Result<_>>()?;
        StandardScaler::fit(&rows, replace_nan_token)
    }

    /// Apply an already-fitted feature scaler to every datapoint.
    pub fn apply_feature_scaler(&mut self, scaler: &StandardScaler) {
        for point in &mut self.points {
            if let Some(features) = &point.features {
                point.features = Some(scaler.transform(features));
            }
        }
    }

    /// Fit a target scaler on this dataset and scale the targets
    /// in place (regression only; call on the training partition).
    pub fn normalize_targets(&mut self, replace_nan_token: f64) -> Result<StandardScaler> {
        let rows = self.targets();
        let scaler = StandardScaler::fit_targets(&rows, replace_nan_token)?;
        for point in &mut self.points {
            point.targets = scaler.transform_targets(&point.targets);
        }
        Ok(scaler)
    }
}

impl Dataset<MoleculeDatapoint> for MoleculeDataset {
    fn get(&self, index: usize) -> Option<MoleculeDatapoint> {
        self.points.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_invariant_enforced() {
        let good = MoleculeDatapoint::new(vec!["CC".into()], vec![Some(1.0), None]);
        let bad = MoleculeDatapoint::new(vec!["CCO".into()], vec![Some(1.0)]);
        assert!(MoleculeDataset::new(
            vec![good.clone()],
            vec!["a".into(), "b".into()]
        )
        .is_ok());
        assert!(MoleculeDataset::new(vec![good, bad], vec!["a".into(), "b".into()]).is_err());
    }

    #[test]
    fn test_featurize_appends_fingerprints() {
        let points = vec![
            MoleculeDatapoint::new(vec!["CCO".into()], vec![Some(0.5)]),
            MoleculeDatapoint::new(vec!["c1ccccc1".into()], vec![None]),
        ];
        let mut data = MoleculeDataset::new(points, vec!["y".into()]).unwrap();
        data.featurize(&["morgan".to_string()]).unwrap();
        assert_eq!(data.features_size(), Some(2048));
    }

    #[test]
    fn test_featurize_unknown_name_fails_fast() {
        let mut data = MoleculeDataset::new(
            vec![MoleculeDatapoint::new(vec!["C".into()], vec![None])],
            vec!["y".into()],
        )
        .unwrap();
        let err = data.featurize(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, PipelineError::GeneratorNotFound { .. }));
        // Nothing was mutated
        assert_eq!(data.features_size(), None);
    }

    #[test]
    fn test_multicomponent_concatenates() {
        let mut data = MoleculeDataset::new(
            vec![MoleculeDatapoint::new(
                vec!["CC".into(), "O".into()],
                vec![Some(1.0)],
            )],
            vec!["y".into()],
        )
        .unwrap();
        data.featurize(&["morgan".to_string()]).unwrap();
        // Two components, one fingerprint each
        assert_eq!(data.features_size(), Some(2 * 2048));
    }

    #[test]
    fn test_normalize_targets_round_trips_after_split() {
        use crate::data::splitter::{split_data, SplitType};

        // Two regression tasks, ten points split 8/1/1
        let smiles = ["C", "CC", "CCC", "CCCC", "CO", "CCO", "CCCO", "CN", "CCN", "CCCN"];
        let points = smiles
            .iter()
            .enumerate()
            .map(|(i, s)| {
                MoleculeDatapoint::new(
                    vec![(*s).into()],
                    vec![Some(i as f64 * 0.7 - 1.0), Some(10.0 - i as f64)],
                )
            })
            .collect();
        let data = MoleculeDataset::new(points, vec!["a".into(), "b".into()]).unwrap();
        let (mut train, val, test) =
            split_data(data, SplitType::Random, (0.8, 0.1, 0.1), 7).unwrap();
        assert_eq!((train.len(), val.len(), test.len()), (8, 1, 1));

        let original = train.targets();
        let scaler = train.normalize_targets(0.0).unwrap();

        // Unscaling the scaler's own training-set output must
        // reconstruct the original target matrix
        for (scaled_row, original_row) in train.targets().iter().zip(&original) {
            let scaled: Vec<f64> = scaled_row.iter().map(|v| v.unwrap()).collect();
            let back = scaler.inverse_transform(&scaled);
            for (b, o) in back.iter().zip(original_row) {
                assert!((b - o.unwrap()).abs() < 1e-6, "{b} vs {o:?}");
            }
        }
    }

    #[test]
    fn test_bound_masks_fill_missing_rows() {
        let with_bounds = MoleculeDatapoint::new(vec!["C".into()], vec![Some(1.0)])
            .with_bounds(vec![true], vec![false]);
        let without = MoleculeDatapoint::new(vec!["N".into()], vec![Some(2.0)]);
        let data = MoleculeDataset::new(vec![with_bounds, without], vec!["y".into()]).unwrap();
        let gt = data.gt_targets().unwrap();
        assert_eq!(gt, vec![vec![true], vec![false]]);
        assert!(data.lt_targets().is_some());
    }
}
