//! File naming shared with the surrounding pipeline.
//!
//! Names are fixed; downstream tools and reports find artifacts by them.
use std::path::{Path, PathBuf};

pub const TRIMMED_EXT: &str = ".trim.fasta";
pub const COMPOSITE_EXT: &str = ".ref.fasta";
pub const MAPPED_EXT: &str = ".mapped.aln";
pub const ALIASED_EXT: &str = ".prifi.aln";
pub const ALIAS_TABLE_EXT: &str = ".alias.tsv";
pub const REPORT_EXT: &str = ".rep";
pub const PRIMER_ALN_EXT: &str = ".primer_aln.fasta";
pub const PRIMERS_FASTA: &str = "primers.fa";
pub const PRIMERS_CSV: &str = "primers.csv";

fn named(dir: &Path, ortholog: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}{}", ortholog, ext))
}

/// `{id}.trim.fasta`: trimmed ortholog group.
pub fn trimmed_group(dir: &Path, ortholog: &str) -> PathBuf {
    named(dir, ortholog, TRIMMED_EXT)
}

/// `{id}.ref.fasta`: ortholog sequences plus reference slice.
pub fn composite_fasta(dir: &Path, ortholog: &str) -> PathBuf {
    named(dir, ortholog, COMPOSITE_EXT)
}

/// `{id}.mapped.aln`: re-aligned composite.
pub fn mapped_alignment(dir: &Path, ortholog: &str) -> PathBuf {
    named(dir, ortholog, MAPPED_EXT)
}

/// `{id}.prifi.aln`: alignment with numeric row ids.
pub fn aliased_alignment(dir: &Path, ortholog: &str) -> PathBuf {
    named(dir, ortholog, ALIASED_EXT)
}

pub fn alias_table(dir: &Path, ortholog: &str) -> PathBuf {
    named(dir, ortholog, ALIAS_TABLE_EXT)
}

/// `{id}.primer_aln.fasta`: primer rows plus the alignment.
pub fn primer_alignment(dir: &Path, ortholog: &str) -> PathBuf {
    named(dir, ortholog, PRIMER_ALN_EXT)
}

/// Ortholog id of an artifact: first dot-delimited token of the file name.
pub fn ortholog_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let id = name.split('.').next()?;
    if id.is_empty() { None } else { Some(id.to_string()) }
}

/// Files in `dir` whose name ends with `suffix`, sorted by name.
pub fn files_with_suffix(dir: &Path, suffix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let p = entry?.path();
        let matches = p.is_file() && p.file_name().and_then(|s| s.to_str()).map_or(false, |n| n.ends_with(suffix));
        if matches {
            out.push(p);
        }
    }
    out.sort();
    Ok(out)
}
