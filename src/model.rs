//! Core types for **ortholog groups**, **best hits**, **primer pairs** and
//! **gapped alignments**.
//!
//! This module holds the data model shared by every stage. Values are built
//! once at an ingestion boundary (FASTA, BLAST table, primer report) and are
//! read-only afterwards; transformations return new values.
//!
//! # Coordinates
//! All ranges are 0-based and half-open. Genome ranges ([`HitRange`]) index
//! the reference record; primer ranges ([`PosRange`]) index alignment columns.
use core::fmt;
use std::collections::{btree_map, BTreeMap, HashMap};
use std::str::FromStr;

use crate::error::{MarkerError, Result};

/// Orientation of a hit relative to the reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Strand {
    /// Same direction as the reference.
    Plus,
    /// Reverse complement needed to match the reference.
    Minus,
}

impl FromStr for Strand {
    type Err = MarkerError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plus" => Ok(Strand::Plus),
            "minus" => Ok(Strand::Minus),
            other => Err(MarkerError::InvalidStrand(other.to_string())),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Plus => write!(f, "plus"),
            Strand::Minus => write!(f, "minus"),
        }
    }
}

/// A single nucleotide sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub id: String,
    pub description: Option<String>,
    pub residues: Vec<u8>,
    /// Strand assigned by the best hit, once known.
    pub strand: Option<Strand>,
}

impl Sequence {
    pub fn new(id: impl Into<String>, description: Option<String>, residues: Vec<u8>) -> Self {
        Sequence { id: id.into(), description, residues, strand: None }
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// A cluster of orthologous sequences, in input order.
#[derive(Clone, Debug, PartialEq)]
pub struct OrthologGroup {
    pub id: String,
    pub sequences: Vec<Sequence>,
}

/// Genome coordinates of a best hit, `start <= end`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HitRange {
    start: usize,
    end: usize,
}

impl HitRange {
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(MarkerError::InvalidRange { start, end });
        }
        Ok(HitRange { start, end })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &HitRange) -> HitRange {
        HitRange { start: self.start.min(other.start), end: self.end.max(other.end) }
    }
}

/// Hit detail for one ortholog sequence against the chosen reference record.
#[derive(Clone, Debug, PartialEq)]
pub struct SeqHit {
    pub strand: Strand,
    pub bitscore: f64,
    pub evalue: f64,
    /// Subject coordinates covered by the hit.
    pub range: HitRange,
}

/// The genomic match selected for one ortholog.
#[derive(Clone, Debug, PartialEq)]
pub struct BestHit {
    pub ortholog: String,
    /// Sequence id to hit detail.
    pub seqs: HashMap<String, SeqHit>,
    pub range: HitRange,
}

/// Best hits keyed by reference-record id; at most one entry per record.
#[derive(Clone, Debug, Default)]
pub struct BestHitTable {
    entries: BTreeMap<String, BestHit>,
}

impl BestHitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the hit for `record`, refusing a second entry for the same record.
    pub fn insert(&mut self, record: impl Into<String>, hit: BestHit) -> Result<()> {
        match self.entries.entry(record.into()) {
            btree_map::Entry::Occupied(e) => Err(MarkerError::DuplicateHit { record: e.key().clone() }),
            btree_map::Entry::Vacant(v) => {
                v.insert(hit);
                Ok(())
            }
        }
    }

    pub fn get(&self, record: &str) -> Option<&BestHit> {
        self.entries.get(record)
    }

    pub fn contains(&self, record: &str) -> bool {
        self.entries.contains_key(record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BestHit)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Column window of a primer, written `start-end` in reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PosRange {
    pub start: usize,
    pub end: usize,
}

impl PosRange {
    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

impl FromStr for PosRange {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (a, b) = s.trim().split_once('-').ok_or_else(|| format!("position '{}' is not 'start-end'", s))?;
        let start = a.parse::<usize>().map_err(|e| format!("position '{}': {}", s, e))?;
        let end = b.parse::<usize>().map_err(|e| format!("position '{}': {}", s, e))?;
        Ok(PosRange { start, end })
    }
}

impl fmt::Display for PosRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One oligo of a primer pair, as reported 5'→3'.
#[derive(Clone, Debug, PartialEq)]
pub struct Primer {
    pub sequence: String,
    pub pos: PosRange,
    /// Melting temperature in °C.
    pub tm: f64,
    /// Length stated by the primer-design tool.
    pub length: usize,
}

/// A forward/reverse primer pair designed on one ortholog alignment.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimerPair {
    pub ortholog: String,
    pub fw: Primer,
    pub rv: Primer,
    /// Product length in base pairs.
    pub product_len: usize,
}

/// One row of a gapped alignment.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedRow {
    pub id: String,
    pub description: Option<String>,
    pub residues: Vec<u8>,
}

impl AlignedRow {
    pub fn new(id: impl Into<String>, residues: Vec<u8>) -> Self {
        AlignedRow { id: id.into(), description: None, residues }
    }
}

/// Ordered rows of identical width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Alignment {
    rows: Vec<AlignedRow>,
}

impl Alignment {
    /// Build an alignment, rejecting rows whose width differs from the first.
    pub fn new(rows: Vec<AlignedRow>) -> Result<Self> {
        if let Some(first) = rows.first() {
            let expected = first.residues.len();
            if let Some(bad) = rows.iter().find(|r| r.residues.len() != expected) {
                return Err(MarkerError::RaggedAlignment {
                    row: bad.id.clone(),
                    expected,
                    found: bad.residues.len(),
                });
            }
        }
        Ok(Alignment { rows })
    }

    /// Rows derived column-for-column from an existing alignment.
    pub(crate) fn new_unchecked(rows: Vec<AlignedRow>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].residues.len() == w[1].residues.len()));
        Alignment { rows }
    }

    /// Column count `L`; zero for an empty alignment.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |r| r.residues.len())
    }

    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<AlignedRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
