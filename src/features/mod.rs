// ============================================================
// Layer 4 — Features Registry
// ============================================================
// A process-wide name → generator table so a features generator
// can be selected purely by its registered string name.
//
// How the registry behaves:
//   - register() stores a generator, silently overwriting a
//     previous entry with the same name
//   - get() fails with GeneratorNotFound for unknown names, with
//     a message pointing at optional dependency installation
//   - available list preserves insertion order, so help text and
//     logs print the generators in a reproducible order
//
// Concurrency: registration happens once at startup, before the
// first lookup, so the RwLock is read-mostly and uncontended.
// The table stores plain `fn` pointers — generators are pure
// functions of their input, never closures over mutable state.
//
// Reference: Rust Book §16 (Shared-State Concurrency)

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::domain::error::{PipelineError, Result};
use crate::features::fingerprints::{GeneratedFeatures, MoleculeInput};

pub mod fingerprints;

/// A features generator: a pure function from a molecule (or a
/// nested batch of grouped molecules) to numeric feature vectors.
pub type FeaturesGenerator = fn(&MoleculeInput) -> Result<GeneratedFeatures>;

/// The registry itself: a hash table for lookup plus a side Vec
/// preserving insertion order for listing.
struct Registry {
    table: HashMap<String, FeaturesGenerator>,
    order: Vec<String>,
}

impl Registry {
    fn with_defaults() -> Self {
        let mut registry = Self {
            table: HashMap::new(),
            order: Vec::new(),
        };
        registry.insert("morgan", fingerprints::morgan_binary_features_generator);
        registry.insert("morgan_count", fingerprints::morgan_counts_features_generator);
        // Descriptor generators are registered even when the heavy
        // descriptor package is absent: lookup succeeds, invocation
        // fails with DependencyMissing. Callers must treat the two
        // as independent.
        registry.insert("rdkit_2d", fingerprints::rdkit_2d_features_generator);
        registry.insert(
            "rdkit_2d_normalized",
            fingerprints::rdkit_2d_normalized_features_generator,
        );
        registry
    }

    fn insert(&mut self, name: &str, generator: FeaturesGenerator) {
        if self.table.insert(name.to_string(), generator).is_none() {
            self.order.push(name.to_string());
        }
    }
}

static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

/// The global registry, with the built-in generators installed on
/// first access.
fn registry() -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| RwLock::new(Registry::with_defaults()))
}

/// Register a features generator under `name`, overwriting any
/// existing entry with that name.
pub fn register_features_generator(name: &str, generator: FeaturesGenerator) {
    let mut reg = registry().write().unwrap_or_else(|e| e.into_inner());
    reg.insert(name, generator);
}

/// Look up a registered features generator by name.
///
/// Unknown names fail fast with `GeneratorNotFound` — this is the
/// check configuration validation runs before training starts.
pub fn get_features_generator(name: &str) -> Result<FeaturesGenerator> {
    let reg = registry().read().unwrap_or_else(|e| e.into_inner());
    reg.table
        .get(name)
        .copied()
        .ok_or_else(|| PipelineError::GeneratorNotFound {
            name: name.to_string(),
        })
}

/// All registered generator names, in registration order.
pub fn available_features_generators() -> Vec<String> {
    let reg = registry().read().unwrap_or_else(|e| e.into_inner());
    reg.order.clone()
}
