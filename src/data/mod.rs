// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw SMILES records to backend-ready tensor
// batches. The pipeline flows in this order:
//
//   SMILES + targets
//       │
//       ▼
//   MoleculeDataset   → schema-checked datapoints
//       │
//       ▼
//   featurize()       → registry generators fill feature vectors
//       │
//       ▼
//   split_data()      → seeded train / validation / test
//       │
//       ▼
//   StandardScaler    → fit on train, applied to val and test
//       │
//       ▼
//   MoleculeBatcher   → stacks datapoints into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Datapoints, datasets, and the task-schema invariant
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffling into train/validation/test partitions
pub mod splitter;

/// Mean/std normalization shared by features and targets
pub mod scaler;

/// Spectrum-specific target normalization (phase masks, flooring)
pub mod spectra;
