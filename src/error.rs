//! Error taxonomy for the marker stages.
//!
//! Every failure carries enough context (ortholog id, sequence id or path) to
//! locate the offending input. [`MarkerError::scope`] tells the pipeline
//! whether to log and continue, or to give up on the run.
use std::path::PathBuf;

use thiserror::Error;

/// How far a failure reaches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorScope {
    /// One ortholog or one file; logged, the batch continues.
    Item,
    /// One report block did not match the expected layout.
    Block,
    /// Nothing downstream can proceed.
    Run,
}

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read genome {path}: {message}")]
    Genome { path: PathBuf, message: String },

    #[error("malformed FASTA {path}: {message}")]
    Fasta { path: PathBuf, message: String },

    #[error("malformed alignment {path}: {message}")]
    Alignment { path: PathBuf, message: String },

    #[error("empty alignment: {path}")]
    EmptyAlignment { path: PathBuf },

    #[error("row '{row}' has width {found}, expected {expected}")]
    RaggedAlignment {
        row: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid BLAST hit at {path} line {line}: {message}")]
    InvalidHit {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("duplicate best hit for reference record '{record}'")]
    DuplicateHit { record: String },

    #[error("invalid coordinate range {start}..{end}")]
    InvalidRange { start: usize, end: usize },

    #[error("unknown strand '{0}' (expected 'plus' or 'minus')")]
    InvalidStrand(String),

    #[error("report {path}, primer set block {block}: {message}")]
    Report {
        path: PathBuf,
        block: usize,
        message: String,
    },

    #[error("primer pair {index} of ortholog '{ortholog}': {message}")]
    PrimerGeometry {
        ortholog: String,
        index: usize,
        message: String,
    },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("external tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MarkerError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MarkerError::Io { path: path.into(), source }
    }

    pub fn scope(&self) -> ErrorScope {
        match self {
            MarkerError::Report { .. } => ErrorScope::Block,
            MarkerError::Genome { .. }
            | MarkerError::InvalidHit { .. }
            | MarkerError::DuplicateHit { .. }
            | MarkerError::Config { .. } => ErrorScope::Run,
            _ => ErrorScope::Item,
        }
    }
}

pub type Result<T> = std::result::Result<T, MarkerError>;

#[cfg(test)]
mod scope_tests {
    use super::*;

    #[test]
    fn report_errors_are_block_scoped() {
        let e = MarkerError::Report { path: "x.rep".into(), block: 2, message: "no match".into() };
        assert_eq!(e.scope(), ErrorScope::Block);
        assert!(e.to_string().contains("block 2"));
    }

    #[test]
    fn genome_errors_end_the_run() {
        let e = MarkerError::Genome { path: "genome.fasta".into(), message: "missing".into() };
        assert_eq!(e.scope(), ErrorScope::Run);
    }

    #[test]
    fn alignment_errors_are_per_item() {
        assert_eq!(MarkerError::EmptyAlignment { path: "a.aln".into() }.scope(), ErrorScope::Item);
    }
}
