// ============================================================
// Layer 4 — Fingerprint Generators
// ============================================================
// Deterministic molecule → fixed-length vector functions.
//
// The workhorse is the Morgan (ECFP-style) circular fingerprint:
//   1. Give every atom an initial identifier hashed from its
//      local invariants (element, degree, hydrogens, charge,
//      aromaticity)
//   2. For `radius` rounds, re-hash each atom together with the
//      sorted (bond order, neighbor identifier) list — after
//      round r the identifier describes the substructure within
//      r bonds of the atom
//   3. Fold every identifier from every round into a fixed-width
//      vector with `id % num_bits`
//
// Two encodings of step 3:
//   - binary: each position flags presence of some substructure
//   - counts: hashed occurrence counts (non-binary integers;
//     collisions across different substructures are expected
//     and acceptable under hashing)
//
// Determinism matters: the same molecule with the same radius
// and bit width must yield a bit-identical vector, so hashing
// uses fixed-key FNV-1a rather than the std RandomState.
//
// Reference: Rogers & Hahn (2010) Extended-Connectivity Fingerprints

use crate::domain::error::{PipelineError, Result};
use crate::domain::molecule::{MolGraph, Molecule};

/// Default Morgan fingerprint radius.
pub const MORGAN_RADIUS: usize = 2;
/// Default Morgan fingerprint width in bits.
pub const MORGAN_NUM_BITS: usize = 2048;

/// Generator input: one molecule, or an ordered sequence of
/// ordered groups of molecules (multi-component datapoints).
#[derive(Debug, Clone)]
pub enum MoleculeInput {
    Single(Molecule),
    Grouped(Vec<Vec<Molecule>>),
}

/// Generator output, mirroring the input shape. Grouped input is
/// flattened across groups into one sequence of vectors with
/// group order preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedFeatures {
    Single(Vec<f64>),
    Grouped(Vec<Vec<f64>>),
}

impl GeneratedFeatures {
    /// Flatten to a list of vectors regardless of shape.
    pub fn into_vectors(self) -> Vec<Vec<f64>> {
        match self {
            GeneratedFeatures::Single(v) => vec![v],
            GeneratedFeatures::Grouped(vs) => vs,
        }
    }
}

// ─── FNV-1a hashing ───────────────────────────────────────────────────────────
// Fixed offset/prime constants: identical output on every run,
// every platform. The folded identifiers feed `% num_bits`.

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(words: &[u64]) -> u64 {
    let mut hash = FNV_OFFSET;
    for w in words {
        for byte in w.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// All substructure identifiers of a molecule up to `radius`
/// bonds: one per atom per round, including round 0.
fn morgan_identifiers(graph: &MolGraph, radius: usize) -> Vec<u64> {
    // Round 0: atom invariants only
    let mut current: Vec<u64> = graph
        .atoms
        .iter()
        .enumerate()
        .map(|(i, a)| {
            fnv1a(&[
                a.atomic_num as u64,
                graph.degree(i) as u64,
                a.num_h as u64,
                (a.charge as i64 + 128) as u64,
                a.aromatic as u64,
                a.isotope as u64,
            ])
        })
        .collect();

    let mut identifiers = current.clone();

    for round in 1..=radius {
        let mut next = Vec::with_capacity(current.len());
        for i in 0..graph.atoms.len() {
            // Sort the neighborhood so the identifier does not
            // depend on SMILES atom ordering
            let mut env: Vec<(u64, u64)> = graph
                .neighbors(i)
                .iter()
                .map(|&(nbr, bond)| (graph.bonds[bond].order.code(), current[nbr]))
                .collect();
            env.sort_unstable();

            let mut words = vec![round as u64, current[i]];
            for (order, id) in env {
                words.push(order);
                words.push(id);
            }
            next.push(fnv1a(&words));
        }
        identifiers.extend_from_slice(&next);
        current = next;
    }

    identifiers
}

/// Morgan fingerprint of one molecule, folded to `num_bits`.
/// `counts = false` gives the binary-presence encoding.
pub fn morgan_fingerprint(
    molecule: &Molecule,
    radius: usize,
    num_bits: usize,
    counts: bool,
) -> Result<Vec<f64>> {
    let graph = molecule.to_graph()?;
    let mut fingerprint = vec![0.0; num_bits];
    for id in morgan_identifiers(&graph, radius) {
        let bit = (id % num_bits as u64) as usize;
        if counts {
            fingerprint[bit] += 1.0;
        } else {
            fingerprint[bit] = 1.0;
        }
    }
    Ok(fingerprint)
}

/// Apply `f` over the input shape: one vector for a single
/// molecule, a flattened group-ordered sequence for grouped input.
fn apply_over_input(
    input: &MoleculeInput,
    f: impl Fn(&Molecule) -> Result<Vec<f64>>,
) -> Result<GeneratedFeatures> {
    match input {
        MoleculeInput::Single(molecule) => Ok(GeneratedFeatures::Single(f(molecule)?)),
        MoleculeInput::Grouped(groups) => {
            let mut features = Vec::new();
            for group in groups {
                for molecule in group {
                    features.push(f(molecule)?);
                }
            }
            Ok(GeneratedFeatures::Grouped(features))
        }
    }
}

/// Binary Morgan fingerprint generator (registry name `morgan`).
/// Every output value is 0.0 or 1.0; length is `MORGAN_NUM_BITS`.
pub fn morgan_binary_features_generator(input: &MoleculeInput) -> Result<GeneratedFeatures> {
    apply_over_input(input, |m| {
        morgan_fingerprint(m, MORGAN_RADIUS, MORGAN_NUM_BITS, false)
    })
}

/// Counts-based Morgan fingerprint generator (registry name
/// `morgan_count`). Values are non-negative integers stored as f64.
pub fn morgan_counts_features_generator(input: &MoleculeInput) -> Result<GeneratedFeatures> {
    apply_over_input(input, |m| {
        morgan_fingerprint(m, MORGAN_RADIUS, MORGAN_NUM_BITS, true)
    })
}

// ─── Optional descriptor generators ──────────────────────────────────────────
// The 2D descriptor family depends on a heavy external descriptor
// package that this build does not carry. The registry still
// registers these names so listing and lookup behave identically
// whether or not the package is present; only invocation fails.
// A build that links a real descriptor backend overwrites these
// entries via register_features_generator (overwrite is silent by
// contract).

/// Placeholder for RDKit 2D descriptors (registry name `rdkit_2d`).
pub fn rdkit_2d_features_generator(_input: &MoleculeInput) -> Result<GeneratedFeatures> {
    Err(PipelineError::DependencyMissing {
        package: "descriptastorus",
        generator: "rdkit_2d",
    })
}

/// Placeholder for normalized RDKit 2D descriptors (registry name
/// `rdkit_2d_normalized`).
pub fn rdkit_2d_normalized_features_generator(
    _input: &MoleculeInput,
) -> Result<GeneratedFeatures> {
    Err(PipelineError::DependencyMissing {
        package: "descriptastorus",
        generator: "rdkit_2d_normalized",
    })
}
