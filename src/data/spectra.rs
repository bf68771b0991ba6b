// ============================================================
// Layer 4 — Spectra Target Normalization
// ============================================================
// Spectra datasets treat each task as one position of a measured
// spectrum. Before training, targets are normalized so each
// spectrum is a probability distribution:
//
//   1. Exclude positions ruled out by the datapoint's phase:
//      a position j is kept when phase_features · phase_mask[·][j]
//      is positive (or when no phase information exists).
//      Excluded positions become missing (None).
//   2. Floor surviving intensities at `threshold` so the SID
//      divergence never sees a zero.
//   3. Divide by the row sum so kept positions sum to 1.
//
// The SAME transform runs over train, validation, and test —
// spectra have no target scaler, this normalization is its
// stand-in and must stay split-symmetric.

use crate::data::dataset::MoleculeDataset;
use crate::domain::error::Result;

/// Normalize a dataset's spectrum targets in place.
///
/// `phase_mask[k][j]` says whether phase `k` keeps spectrum
/// position `j`; a datapoint's one-hot `phase_features` selects
/// the row. Datasets without phase information keep all positions.
pub fn normalize_spectra(
    data: &mut MoleculeDataset,
    phase_mask: Option<&[Vec<bool>]>,
    threshold: Option<f64>,
) -> Result<()> {
    let phase_features = data.phase_features();
    let targets = data.targets();

    let normalized: Vec<Vec<Option<f64>>> = targets
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let keep: Vec<bool> = match (phase_mask, phase_features.as_ref()) {
                (Some(mask), Some(phases)) => (0..row.len())
                    .map(|j| {
                        mask.iter()
                            .zip(&phases[i])
                            .map(|(mask_row, &weight)| weight * (mask_row[j] as u8 as f64))
                            .sum::<f64>()
                            > 0.0
                    })
                    .collect(),
                _ => vec![true; row.len()],
            };

            let floored: Vec<Option<f64>> = row
                .iter()
                .zip(&keep)
                .map(|(v, &kept)| match (v, kept) {
                    (Some(value), true) => Some(threshold.map_or(*value, |t| value.max(t))),
                    _ => None,
                })
                .collect();

            let sum: f64 = floored.iter().flatten().sum();
            if sum > 0.0 {
                floored.into_iter().map(|v| v.map(|x| x / sum)).collect()
            } else {
                floored
            }
        })
        .collect();

    data.set_targets(normalized)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::MoleculeDatapoint;

    #[test]
    fn test_rows_sum_to_one() {
        let points = vec![
            MoleculeDatapoint::new(vec!["C".into()], vec![Some(2.0), Some(6.0), Some(2.0)]),
            MoleculeDatapoint::new(vec!["N".into()], vec![Some(1.0), Some(1.0), None]),
        ];
        let mut data = MoleculeDataset::new(
            points,
            vec!["s0".into(), "s1".into(), "s2".into()],
        )
        .unwrap();
        normalize_spectra(&mut data, None, Some(1e-8)).unwrap();

        for row in data.targets() {
            let sum: f64 = row.iter().flatten().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
        assert_eq!(data.targets()[0][1], Some(0.6));
    }

    #[test]
    fn test_phase_mask_excludes_positions() {
        let points = vec![
            // Phase 0 keeps positions 0 and 1; phase 1 keeps 1 and 2
            MoleculeDatapoint::new(vec!["C".into()], vec![Some(1.0), Some(1.0), Some(2.0)])
                .with_phase_features(vec![1.0, 0.0]),
            MoleculeDatapoint::new(vec!["N".into()], vec![Some(1.0), Some(1.0), Some(2.0)])
                .with_phase_features(vec![0.0, 1.0]),
        ];
        let mut data = MoleculeDataset::new(
            points,
            vec!["s0".into(), "s1".into(), "s2".into()],
        )
        .unwrap();
        let mask = vec![vec![true, true, false], vec![false, true, true]];
        normalize_spectra(&mut data, Some(&mask), None).unwrap();

        let t = data.targets();
        assert!(t[0][2].is_none());
        assert_eq!(t[0][0], Some(0.5));
        assert!(t[1][0].is_none());
        assert_eq!(t[1][2], Some(2.0 / 3.0));
    }

    #[test]
    fn test_floor_threshold_applied() {
        let points = vec![MoleculeDatapoint::new(
            vec!["C".into()],
            vec![Some(0.0), Some(1.0)],
        )];
        let mut data =
            MoleculeDataset::new(points, vec!["s0".into(), "s1".into()]).unwrap();
        normalize_spectra(&mut data, None, Some(0.25)).unwrap();
        let t = data.targets();
        // 0.0 floored to 0.25 before normalizing by 1.25
        assert_eq!(t[0][0], Some(0.2));
        assert_eq!(t[0][1], Some(0.8));
    }
}
