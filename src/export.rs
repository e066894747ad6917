//! Flat primer tables: `primers.fa` and `primers.csv`.
//!
//! Pairs are numbered 1.. within each ortholog, in report order, so
//! `{o}_{i}_fw` here names the same pair as row `{o}_{i}-{i}` of the primer
//! alignment.
use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{MarkerError, Result};
use crate::layout;
use crate::model::{PrimerPair, Sequence};
use crate::seqio;

const CSV_HEADER: [&str; 9] =
    ["index", "ortholog", "product_length", "seqFw", "seqRv", "tmFw", "tmRv", "lenFw", "lenRv"];

/// Serialized in [`CSV_HEADER`] order.
#[derive(Debug, Serialize)]
struct PrimerRow<'a> {
    index: usize,
    ortholog: &'a str,
    product_length: usize,
    seq_fw: &'a str,
    seq_rv: &'a str,
    tm_fw: f64,
    tm_rv: f64,
    len_fw: usize,
    len_rv: usize,
}

/// Two FASTA records per pair, forward then reverse, both 5'→3'.
pub fn primer_records(by_ortholog: &BTreeMap<String, Vec<PrimerPair>>) -> Vec<Sequence> {
    let mut out = Vec::new();
    for (ortholog, pairs) in by_ortholog {
        for (i, p) in pairs.iter().enumerate() {
            let n = i + 1;
            out.push(Sequence::new(format!("{}_{}_fw", ortholog, n), None, p.fw.sequence.as_bytes().to_vec()));
            out.push(Sequence::new(format!("{}_{}_rv", ortholog, n), None, p.rv.sequence.as_bytes().to_vec()));
        }
    }
    out
}

pub fn write_primers_fasta<P: AsRef<Path>>(path: P, by_ortholog: &BTreeMap<String, Vec<PrimerPair>>) -> Result<usize> {
    let records = primer_records(by_ortholog);
    seqio::write_fasta_file(path, &records)?;
    Ok(records.len())
}

/// One CSV row per pair; `index` runs over the whole table. The header is
/// written even when there are no pairs.
pub fn write_primers_csv<P: AsRef<Path>>(path: P, by_ortholog: &BTreeMap<String, Vec<PrimerPair>>) -> Result<usize> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_path(path.as_ref())?;
    w.write_record(CSV_HEADER)?;
    let mut index = 0usize;
    for (ortholog, pairs) in by_ortholog {
        for p in pairs {
            index += 1;
            w.serialize(PrimerRow {
                index,
                ortholog: ortholog.as_str(),
                product_length: p.product_len,
                seq_fw: p.fw.sequence.as_str(),
                seq_rv: p.rv.sequence.as_str(),
                tm_fw: p.fw.tm,
                tm_rv: p.rv.tm,
                len_fw: p.fw.length,
                len_rv: p.rv.length,
            })?;
        }
    }
    w.flush().map_err(|e| MarkerError::io(path.as_ref(), e))?;
    Ok(index)
}

/// Write both tables into `primer_dir`.
pub fn export_tables(primer_dir: &Path, by_ortholog: &BTreeMap<String, Vec<PrimerPair>>) -> Result<()> {
    std::fs::create_dir_all(primer_dir).map_err(|e| MarkerError::io(primer_dir, e))?;
    let records = write_primers_fasta(primer_dir.join(layout::PRIMERS_FASTA), by_ortholog)?;
    let rows = write_primers_csv(primer_dir.join(layout::PRIMERS_CSV), by_ortholog)?;
    info!(records, rows, dir = %primer_dir.display(), "exported primer tables");
    Ok(())
}
