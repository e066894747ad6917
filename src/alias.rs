//! Numeric row aliases for the primer-design tool.
//!
//! Clustal truncates identifiers and the primer designer needs them unique, so
//! rows are renamed `"0"`, `"1"`, ... in row order before design. The mapping
//! back to the original ids is kept in `{orthologId}.alias.tsv`.
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{MarkerError, Result};
use crate::layout;
use crate::model::{AlignedRow, Alignment};
use crate::seqio;

/// `(alias, original id)` in row order.
pub type AliasMap = Vec<(String, String)>;

/// Rename every row to its index. Residues and row order are unchanged.
pub fn alias_alignment(aln: &Alignment) -> (Alignment, AliasMap) {
    let mut map = AliasMap::with_capacity(aln.len());
    let rows = aln
        .rows()
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let alias = i.to_string();
            map.push((alias.clone(), r.id.clone()));
            AlignedRow { id: alias, description: None, residues: r.residues.clone() }
        })
        .collect();
    (Alignment::new_unchecked(rows), map)
}

/// Write the alias table as tab-separated `alias  original` rows.
pub fn write_alias_table<P: AsRef<Path>>(path: P, map: &AliasMap) -> Result<()> {
    let mut w = csv::WriterBuilder::new().delimiter(b'\t').from_path(path.as_ref())?;
    w.write_record(["alias", "original"])?;
    for (alias, original) in map {
        w.write_record([alias, original])?;
    }
    w.flush().map_err(|e| MarkerError::io(path.as_ref(), e))
}

/// Alias one `{id}.mapped.aln` into `primer_dir`, returning the written path.
pub fn alias_file(mapped: &Path, primer_dir: &Path) -> Result<PathBuf> {
    let ortholog = layout::ortholog_id_from_path(mapped).ok_or_else(|| MarkerError::Alignment {
        path: mapped.to_path_buf(),
        message: "cannot derive ortholog id from file name".to_string(),
    })?;
    let aln = seqio::read_clustal(mapped)?;
    let (aliased, map) = alias_alignment(&aln);
    let out = layout::aliased_alignment(primer_dir, &ortholog);
    seqio::write_clustal_file(&out, &aliased)?;
    write_alias_table(layout::alias_table(primer_dir, &ortholog), &map)?;
    debug!(ortholog = %ortholog, rows = aliased.len(), path = %out.display(), "aliased alignment");
    Ok(out)
}

/// Alias each file in parallel, logging and skipping those that fail.
/// Returns the paths written, in input order.
pub fn alias_files(mapped: &[PathBuf], primer_dir: &Path) -> Vec<PathBuf> {
    mapped
        .par_iter()
        .filter_map(|p| match alias_file(p, primer_dir) {
            Ok(out) => Some(out),
            Err(e) => {
                warn!(path = %p.display(), error = %e, "empty or unreadable alignment; ortholog skipped");
                None
            }
        })
        .collect()
}
