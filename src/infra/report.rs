// ============================================================
// Layer 6 — Score and Prediction Reports
// ============================================================
// Final run artifacts:
//   test_scores.json — per-task test scores for every metric,
//                      pretty-printed with keys in sorted order
//                      so two identical runs produce byte-equal
//                      files
//   test_preds.csv   — per-molecule ensemble predictions, one
//                      row per test datapoint in dataset order
//
// NaN is not valid JSON, so NaN scores serialize as null.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use serde_json::json;

/// Write `test_scores.json` under `dir`.
pub fn save_scores(dir: &Path, scores: &BTreeMap<String, Vec<f64>>) -> Result<()> {
    let path = dir.join("test_scores.json");

    // BTreeMap iterates sorted; map NaN to null explicitly since
    // serde_json refuses bare NaN
    let body: serde_json::Map<String, serde_json::Value> = scores
        .iter()
        .map(|(metric, values)| {
            let values: Vec<serde_json::Value> = values
                .iter()
                .map(|&v| if v.is_nan() { json!(null) } else { json!(v) })
                .collect();
            (metric.clone(), json!(values))
        })
        .collect();

    let json = serde_json::to_string_pretty(&body)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Cannot write scores to '{}'", path.display()))?;
    tracing::info!(path = %path.display(), "wrote test scores");
    Ok(())
}

/// Write `test_preds.csv` under `dir`: header of SMILES plus one
/// column per prediction (multiclass tasks expand to one column
/// per class).
pub fn save_predictions(
    dir: &Path,
    smiles: &[String],
    task_names: &[String],
    num_classes: usize,
    preds: &[Vec<f64>],
) -> Result<()> {
    let path = dir.join("test_preds.csv");
    let file = File::create(&path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut out = BufWriter::new(file);

    let mut header = vec!["smiles".to_string()];
    for name in task_names {
        if num_classes > 1 {
            for class in 0..num_classes {
                header.push(format!("{name}_class_{class}"));
            }
        } else {
            header.push(name.clone());
        }
    }
    writeln!(out, "{}", header.join(","))?;

    for (s, row) in smiles.iter().zip(preds) {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{},{}", s, values.join(","))?;
    }
    out.flush()?;
    tracing::info!(path = %path.display(), rows = preds.len(), "wrote test predictions");
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_sorted_and_nan_as_null() {
        let tmp = tempfile::tempdir().unwrap();
        let mut scores = BTreeMap::new();
        scores.insert("rmse".to_string(), vec![0.5, f64::NAN]);
        scores.insert("mae".to_string(), vec![0.25, 0.75]);
        save_scores(tmp.path(), &scores).unwrap();

        let body = std::fs::read_to_string(tmp.path().join("test_scores.json")).unwrap();
        assert!(body.find("\"mae\"").unwrap() < body.find("\"rmse\"").unwrap());
        assert!(body.contains("null"));
        // Valid JSON after the NaN substitution
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(parsed["rmse"][1].is_null());
    }

    #[test]
    fn test_predictions_csv_layout() {
        let tmp = tempfile::tempdir().unwrap();
        save_predictions(
            tmp.path(),
            &["CCO".into(), "c1ccccc1".into()],
            &["logp".into()],
            1,
            &[vec![1.5], vec![-0.25]],
        )
        .unwrap();

        let body = std::fs::read_to_string(tmp.path().join("test_preds.csv")).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "smiles,logp");
        assert_eq!(lines[1], "CCO,1.5");
        assert_eq!(lines[2], "c1ccccc1,-0.25");
    }

    #[test]
    fn test_multiclass_header_expands_classes() {
        let tmp = tempfile::tempdir().unwrap();
        save_predictions(
            tmp.path(),
            &["C".into()],
            &["phase".into()],
            3,
            &[vec![0.2, 0.3, 0.5]],
        )
        .unwrap();
        let body = std::fs::read_to_string(tmp.path().join("test_preds.csv")).unwrap();
        assert!(body.starts_with("smiles,phase_class_0,phase_class_1,phase_class_2"));
    }
}
