#![forbid(unsafe_code)]
//! # markerscout
//!
//! Reference-guided marker discovery: place each ortholog group on a
//! reference genome, realign it with the matching genome slice, design
//! primers on the alignment and show where every primer pair lands.
//!
//! ## Stages
//! - **Slice extraction** ([`slice`]): best BLAST hit per ortholog, padded
//!   genome slice, strand-corrected members, one composite FASTA each.
//! - **Realignment** ([`tools`]): MAFFT with input order preserved, so the
//!   reference slice stays the last row.
//! - **Aliasing** ([`alias`]): numeric row ids for the primer designer.
//! - **Report parsing** ([`report`]) and **primer tables** ([`export`]).
//! - **Primer alignments** ([`reconstruct`]): one gapped row per primer pair
//!   stacked above the ortholog alignment.
//!
//! [`pipeline::Pipeline`] runs the stages over a working directory; the
//! `markerscout` binary exposes each one as a subcommand.
//!
//! ## Coordinates
//! 0-based, half-open everywhere. BLAST's 1-based inclusive coordinates are
//! converted once, at ingestion.
//!
//! ## Example
//! ```rust
//! use markerscout::model::{PosRange, Primer, PrimerPair};
//! use markerscout::reconstruct::primer_row;
//!
//! let primer = |seq: &str, start: usize| Primer {
//!     sequence: seq.to_string(),
//!     pos: PosRange { start, end: start + seq.len() },
//!     tm: 60.0,
//!     length: seq.len(),
//! };
//! let pair = PrimerPair {
//!     ortholog: "OG1".into(),
//!     fw: primer("ACGT", 2),
//!     rv: primer("AACC", 10),
//!     product_len: 12,
//! };
//! let row = primer_row("OG1", 1, &pair, 16).unwrap();
//! assert_eq!(row.id, "OG1_1-1");
//! assert_eq!(row.residues, b"--ACGT----GGTT--".to_vec());
//! ```

pub mod alias;
pub mod config;
pub mod error;
pub mod export;
pub mod hits;
pub mod layout;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod reconstruct;
pub mod report;
pub mod seqio;
pub mod slice;
pub mod tools;

pub use config::Config;
pub use error::{ErrorScope, MarkerError, Result};
pub use pipeline::{Pipeline, RunSummary, StageSummary};

/// Crate version string (from `CARGO_PKG_VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
