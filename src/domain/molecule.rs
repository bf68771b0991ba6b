// ============================================================
// Layer 3 — Molecule Domain Type
// ============================================================
// A molecule is either a SMILES line notation or a parsed
// molecular graph. Datapoints keep the canonical string form
// around for traceability (score reports, prediction CSVs)
// and parse to a graph lazily when a fingerprint needs one.
//
// The parser covers the SMILES subset that property-prediction
// datasets actually use:
//   - organic subset atoms  B C N O P S F Cl Br I
//   - aromatic lowercase    b c n o p s
//   - bracket atoms         [13CH4], [NH4+], [O-], [nH], [Fe+2]
//   - bonds                 - = # : and (ignored) / \
//   - branches              ( )
//   - ring closures         digits and %nn
//   - disconnected parts    .
//
// Stereo markers (@, @@, / \) are accepted and discarded —
// circular fingerprints are 2D descriptors and do not see them.
//
// Reference: Weininger (1988) SMILES, Daylight theory manual

use crate::domain::error::{PipelineError, Result};

/// Bond order between two atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Integer code used when hashing bond environments.
    pub fn code(self) -> u64 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }

    /// Contribution to an atom's valence when computing implicit
    /// hydrogens. Aromatic bonds count as 1.5 like in Kekulé-free
    /// perception; the total is rounded up afterwards.
    fn valence_units(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }
}

/// One atom in a molecular graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// Atomic number (C = 6, N = 7, ...)
    pub atomic_num: u8,
    /// Written lowercase / inside an aromatic ring
    pub aromatic: bool,
    /// Formal charge from a bracket expression
    pub charge: i8,
    /// Hydrogen count: explicit from brackets, otherwise filled
    /// from standard valence once all bonds are known
    pub num_h: u8,
    /// Isotope label from a bracket expression (0 = unspecified)
    pub isotope: u16,
}

/// One bond in a molecular graph (undirected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

/// A parsed molecular graph: atoms, bonds, and an adjacency list
/// mapping each atom to its `(neighbor, bond index)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct MolGraph {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl MolGraph {
    /// Neighbors of atom `i` as `(neighbor index, bond index)` pairs.
    pub fn neighbors(&self, i: usize) -> &[(usize, usize)] {
        &self.adjacency[i]
    }

    /// Heavy-atom degree of atom `i`.
    pub fn degree(&self, i: usize) -> usize {
        self.adjacency[i].len()
    }
}

/// A molecule reference: either the raw line notation or an
/// already-parsed graph. One entry function branches on the tag
/// instead of inspecting types at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Molecule {
    Smiles(String),
    Graph(MolGraph),
}

impl Molecule {
    pub fn from_smiles(smiles: impl Into<String>) -> Self {
        Molecule::Smiles(smiles.into())
    }

    /// Resolve to a parsed graph, parsing the SMILES form on demand.
    pub fn to_graph(&self) -> Result<MolGraph> {
        match self {
            Molecule::Smiles(s) => parse_smiles(s),
            Molecule::Graph(g) => Ok(g.clone()),
        }
    }
}

// ─── SMILES parsing ───────────────────────────────────────────────────────────

/// Default valence used to fill implicit hydrogens on organic
/// subset atoms. Indexed by atomic number.
fn default_valence(atomic_num: u8) -> Option<u8> {
    match atomic_num {
        5 => Some(3),              // B
        6 => Some(4),              // C
        7 => Some(3),              // N
        8 => Some(2),              // O
        15 => Some(3),             // P
        16 => Some(2),             // S
        9 | 17 | 35 | 53 => Some(1), // F Cl Br I
        _ => None,
    }
}

fn atomic_number(symbol: &str) -> Option<u8> {
    Some(match symbol {
        "H" => 1,
        "He" => 2,
        "Li" => 3,
        "Be" => 4,
        "B" => 5,
        "C" => 6,
        "N" => 7,
        "O" => 8,
        "F" => 9,
        "Na" => 11,
        "Mg" => 12,
        "Al" => 13,
        "Si" => 14,
        "P" => 15,
        "S" => 16,
        "Cl" => 17,
        "K" => 19,
        "Ca" => 20,
        "Mn" => 25,
        "Fe" => 26,
        "Co" => 27,
        "Ni" => 28,
        "Cu" => 29,
        "Zn" => 30,
        "As" => 33,
        "Se" => 34,
        "Br" => 35,
        "Ag" => 47,
        "Sn" => 50,
        "I" => 53,
        "Pt" => 78,
        "Au" => 79,
        "Hg" => 80,
        _ => return None,
    })
}

/// Incrementally built graph plus the parser bookkeeping that
/// SMILES needs: a branch stack and open ring-closure table.
struct GraphBuilder {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// Atom awaiting the next bond, None right after a '.'
    prev: Option<usize>,
    /// '(' saves prev here, ')' restores it
    branch_stack: Vec<Option<usize>>,
    /// ring number → (atom index, bond order written before the digit)
    open_rings: Vec<(u16, usize, Option<BondOrder>)>,
    /// bond symbol read since the last atom, consumed by the next
    /// atom or ring closure
    pending_bond: Option<BondOrder>,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            atoms: Vec::new(),
            bonds: Vec::new(),
            prev: None,
            branch_stack: Vec::new(),
            open_rings: Vec::new(),
            pending_bond: None,
        }
    }

    fn add_atom(&mut self, atom: Atom) {
        let idx = self.atoms.len();
        let aromatic = atom.aromatic;
        self.atoms.push(atom);
        if let Some(prev) = self.prev {
            let order = self.pending_bond.take().unwrap_or({
                // Two adjacent aromatic atoms bond aromatically by default
                if aromatic && self.atoms[prev].aromatic {
                    BondOrder::Aromatic
                } else {
                    BondOrder::Single
                }
            });
            self.bonds.push(Bond { a: prev, b: idx, order });
        }
        self.pending_bond = None;
        self.prev = Some(idx);
    }

    fn close_ring(&mut self, number: u16) -> Result<()> {
        let here = self
            .prev
            .ok_or_else(|| PipelineError::data("ring closure digit before any atom"))?;
        if let Some(pos) = self.open_rings.iter().position(|(n, _, _)| *n == number) {
            let (_, other, opening_order) = self.open_rings.swap_remove(pos);
            if other == here {
                return Err(PipelineError::data(format!(
                    "ring closure {number} bonds an atom to itself"
                )));
            }
            let order = self
                .pending_bond
                .take()
                .or(opening_order)
                .unwrap_or({
                    if self.atoms[here].aromatic && self.atoms[other].aromatic {
                        BondOrder::Aromatic
                    } else {
                        BondOrder::Single
                    }
                });
            self.bonds.push(Bond { a: other, b: here, order });
        } else {
            let order = self.pending_bond.take();
            self.open_rings.push((number, here, order));
        }
        Ok(())
    }

    fn finish(self, smiles: &str) -> Result<MolGraph> {
        if !self.open_rings.is_empty() {
            return Err(PipelineError::data(format!(
                "unclosed ring bond(s) in SMILES '{smiles}'"
            )));
        }
        if !self.branch_stack.is_empty() {
            return Err(PipelineError::data(format!(
                "unclosed branch '(' in SMILES '{smiles}'"
            )));
        }
        if self.atoms.is_empty() {
            return Err(PipelineError::data(format!(
                "SMILES '{smiles}' contains no atoms"
            )));
        }

        let mut atoms = self.atoms;
        let bonds = self.bonds;

        // Adjacency list
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.a].push((bond.b, bi));
            adjacency[bond.b].push((bond.a, bi));
        }

        // Fill implicit hydrogens on organic-subset atoms.
        // Bracket atoms already carry an explicit count (possibly 0).
        for (i, atom) in atoms.iter_mut().enumerate() {
            if atom.num_h != u8::MAX {
                continue;
            }
            let used: f64 = adjacency[i]
                .iter()
                .map(|&(_, bi)| bonds[bi].order.valence_units())
                .sum();
            let valence = default_valence(atom.atomic_num).unwrap_or(0) as f64;
            atom.num_h = (valence - used.ceil()).max(0.0) as u8;
        }

        Ok(MolGraph { atoms, bonds, adjacency })
    }
}

/// Parse a SMILES string into a molecular graph.
///
/// Returns `PipelineError::Data` on malformed input — callers are
/// expected to filter such molecules out before training.
pub fn parse_smiles(smiles: &str) -> Result<MolGraph> {
    let mut builder = GraphBuilder::new();
    let chars: Vec<char> = smiles.trim().chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            // Organic subset, possibly two letters (Cl, Br)
            'C' if chars.get(i + 1) == Some(&'l') => {
                builder.add_atom(plain_atom(17, false));
                i += 2;
            }
            'B' if chars.get(i + 1) == Some(&'r') => {
                builder.add_atom(plain_atom(35, false));
                i += 2;
            }
            'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' => {
                let num = atomic_number(&c.to_string()).expect("organic subset symbol");
                builder.add_atom(plain_atom(num, false));
                i += 1;
            }
            'b' | 'c' | 'n' | 'o' | 'p' | 's' => {
                let num = atomic_number(&c.to_ascii_uppercase().to_string())
                    .expect("aromatic subset symbol");
                builder.add_atom(plain_atom(num, true));
                i += 1;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|p| i + p)
                    .ok_or_else(|| {
                        PipelineError::data(format!("unterminated '[' in SMILES '{smiles}'"))
                    })?;
                let body: String = chars[i + 1..close].iter().collect();
                builder.add_atom(parse_bracket_atom(&body, smiles)?);
                i = close + 1;
            }
            '-' => {
                builder.pending_bond = Some(BondOrder::Single);
                i += 1;
            }
            '=' => {
                builder.pending_bond = Some(BondOrder::Double);
                i += 1;
            }
            '#' => {
                builder.pending_bond = Some(BondOrder::Triple);
                i += 1;
            }
            ':' => {
                builder.pending_bond = Some(BondOrder::Aromatic);
                i += 1;
            }
            // Stereo bond markers carry no 2D information
            '/' | '\\' => {
                builder.pending_bond = Some(BondOrder::Single);
                i += 1;
            }
            '(' => {
                builder.branch_stack.push(builder.prev);
                i += 1;
            }
            ')' => {
                builder.prev = builder.branch_stack.pop().ok_or_else(|| {
                    PipelineError::data(format!("unmatched ')' in SMILES '{smiles}'"))
                })?;
                i += 1;
            }
            '0'..='9' => {
                builder.close_ring(c.to_digit(10).unwrap() as u16)?;
                i += 1;
            }
            '%' => {
                // Two-digit ring closure %nn
                let d1 = chars.get(i + 1).and_then(|c| c.to_digit(10));
                let d2 = chars.get(i + 2).and_then(|c| c.to_digit(10));
                match (d1, d2) {
                    (Some(a), Some(b)) => {
                        builder.close_ring((a * 10 + b) as u16)?;
                        i += 3;
                    }
                    _ => {
                        return Err(PipelineError::data(format!(
                            "'%' must be followed by two digits in SMILES '{smiles}'"
                        )))
                    }
                }
            }
            '.' => {
                // Disconnected component — next atom starts a new fragment
                builder.prev = None;
                builder.pending_bond = None;
                i += 1;
            }
            other => {
                return Err(PipelineError::data(format!(
                    "unexpected character '{other}' in SMILES '{smiles}'"
                )))
            }
        }
    }

    builder.finish(smiles)
}

/// An organic-subset atom: hydrogens filled in later (u8::MAX is
/// the "not yet known" marker consumed by `finish`).
fn plain_atom(atomic_num: u8, aromatic: bool) -> Atom {
    Atom {
        atomic_num,
        aromatic,
        charge: 0,
        num_h: u8::MAX,
        isotope: 0,
    }
}

/// Parse the body of a bracket atom expression (without `[` / `]`):
/// `isotope? symbol chirality? Hcount? charge?`
fn parse_bracket_atom(body: &str, smiles: &str) -> Result<Atom> {
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;

    // Isotope
    let mut isotope: u16 = 0;
    while i < chars.len() && chars[i].is_ascii_digit() {
        isotope = isotope * 10 + chars[i].to_digit(10).unwrap() as u16;
        i += 1;
    }

    // Element symbol — uppercase + optional lowercase, or a single
    // aromatic lowercase letter
    let (symbol, aromatic) = if i < chars.len() && chars[i].is_ascii_uppercase() {
        let mut sym = chars[i].to_string();
        i += 1;
        if i < chars.len() && chars[i].is_ascii_lowercase() && chars[i] != 'h' {
            // 'h' would be an H-count on e.g. [Ch4] which is invalid anyway;
            // two-letter symbols never end in 'h' in our table
            sym.push(chars[i]);
            if atomic_number(&sym).is_none() {
                sym.pop();
            } else {
                i += 1;
            }
        }
        (sym, false)
    } else if i < chars.len() && matches!(chars[i], 'b' | 'c' | 'n' | 'o' | 'p' | 's') {
        let sym = chars[i].to_ascii_uppercase().to_string();
        i += 1;
        (sym, true)
    } else {
        return Err(PipelineError::data(format!(
            "bracket atom '[{body}]' has no element symbol in SMILES '{smiles}'"
        )));
    };

    let atomic_num = atomic_number(&symbol).ok_or_else(|| {
        PipelineError::data(format!(
            "unknown element '{symbol}' in bracket atom of SMILES '{smiles}'"
        ))
    })?;

    // Chirality markers — parsed and discarded
    while i < chars.len() && chars[i] == '@' {
        i += 1;
    }

    // Explicit hydrogen count
    let mut num_h: u8 = 0;
    if i < chars.len() && chars[i] == 'H' {
        i += 1;
        if i < chars.len() && chars[i].is_ascii_digit() {
            num_h = chars[i].to_digit(10).unwrap() as u8;
            i += 1;
        } else {
            num_h = 1;
        }
    }

    // Charge: +, -, ++, --, +2, -3 ...
    let mut charge: i8 = 0;
    while i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
        let sign: i8 = if chars[i] == '+' { 1 } else { -1 };
        i += 1;
        if i < chars.len() && chars[i].is_ascii_digit() {
            charge = sign * chars[i].to_digit(10).unwrap() as i8;
            i += 1;
        } else {
            charge += sign;
        }
    }

    if i != chars.len() {
        return Err(PipelineError::data(format!(
            "trailing '{}' in bracket atom '[{body}]' of SMILES '{smiles}'",
            chars[i..].iter().collect::<String>()
        )));
    }

    Ok(Atom {
        atomic_num,
        aromatic,
        charge,
        num_h,
        isotope,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethanol() {
        let g = parse_smiles("CCO").unwrap();
        assert_eq!(g.atoms.len(), 3);
        assert_eq!(g.bonds.len(), 2);
        // CH3-CH2-OH: 3, 2 and 1 implicit hydrogens
        assert_eq!(g.atoms[0].num_h, 3);
        assert_eq!(g.atoms[1].num_h, 2);
        assert_eq!(g.atoms[2].num_h, 1);
    }

    #[test]
    fn test_benzene_ring_closure() {
        let g = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(g.atoms.len(), 6);
        assert_eq!(g.bonds.len(), 6);
        assert!(g.atoms.iter().all(|a| a.aromatic));
        assert!(g.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
        // Every aromatic carbon has exactly one hydrogen
        assert!(g.atoms.iter().all(|a| a.num_h == 1));
    }

    #[test]
    fn test_branches_and_double_bond() {
        // Acetic acid CC(=O)O
        let g = parse_smiles("CC(=O)O").unwrap();
        assert_eq!(g.atoms.len(), 4);
        assert_eq!(g.bonds.len(), 3);
        assert_eq!(g.bonds[1].order, BondOrder::Double);
        // Carbonyl carbon has no hydrogens left
        assert_eq!(g.atoms[1].num_h, 0);
    }

    #[test]
    fn test_bracket_atom_charge_and_h() {
        let g = parse_smiles("[NH4+]").unwrap();
        assert_eq!(g.atoms[0].atomic_num, 7);
        assert_eq!(g.atoms[0].num_h, 4);
        assert_eq!(g.atoms[0].charge, 1);

        let g = parse_smiles("[O-]").unwrap();
        assert_eq!(g.atoms[0].charge, -1);
        assert_eq!(g.atoms[0].num_h, 0);
    }

    #[test]
    fn test_disconnected_fragments() {
        // Sodium acetate: no bond across the dot
        let g = parse_smiles("CC(=O)[O-].[Na+]").unwrap();
        assert_eq!(g.atoms.len(), 5);
        assert_eq!(g.bonds.len(), 3);
    }

    #[test]
    fn test_malformed_smiles_is_data_error() {
        assert!(matches!(
            parse_smiles("C1CC"),
            Err(PipelineError::Data(_))
        ));
        assert!(matches!(
            parse_smiles("C(C"),
            Err(PipelineError::Data(_))
        ));
        assert!(matches!(parse_smiles(""), Err(PipelineError::Data(_))));
        assert!(matches!(
            parse_smiles("C?C"),
            Err(PipelineError::Data(_))
        ));
    }

    #[test]
    fn test_molecule_lazy_parse() {
        let m = Molecule::from_smiles("c1ccccc1O");
        let g = m.to_graph().unwrap();
        assert_eq!(g.atoms.len(), 7);
        // Already-parsed graphs round-trip unchanged
        let m2 = Molecule::Graph(g.clone());
        assert_eq!(m2.to_graph().unwrap(), g);
    }
}
