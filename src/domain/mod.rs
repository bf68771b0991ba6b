// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types that define what the system talks about.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - NO ML-specific code
//
// Why keep this layer pure?
//   - Easy to unit test (no backend needed)
//   - Easy to understand (no framework noise)
//   - The SMILES parser and error taxonomy are reusable by
//     any future front end (CLI, service, notebook bindings)
//
// Reference: Rust Book §5 (Structs), §9 (Error Handling)

// Molecules: SMILES notation and parsed molecular graphs
pub mod molecule;

// Dataset types and score-averaging policies
pub mod task;

// The typed error taxonomy for the whole pipeline
pub mod error;
