//! Primer placement rows.
//!
//! Each primer pair becomes a gapped pseudo-sequence in the column space of
//! its ortholog alignment:
//!
//! ```text
//! '-' * fw.start | fw | '-' * (rv.start - fw.end) | revcomp(rv) | '-' * (L - rv.end)
//! ```
//!
//! The reverse primer is reported 5'→3' on the opposite strand, hence the
//! reverse complement. Pairs whose windows overlap, run past the alignment, or
//! disagree with their sequence length are rejected rather than padded.
use std::path::{Path, PathBuf};

use bio::alphabets::dna;
use tracing::{debug, warn};

use crate::error::{MarkerError, Result};
use crate::layout;
use crate::model::{AlignedRow, Alignment, PrimerPair};
use crate::seqio;

const GAP: u8 = b'-';

/// Row id of the `index`-th (1-based) primer pair.
pub fn primer_row_id(ortholog: &str, index: usize) -> String {
    format!("{}_{}-{}", ortholog, index, index)
}

fn check_geometry(pair: &PrimerPair, width: usize) -> std::result::Result<(), String> {
    let (fw, rv) = (&pair.fw.pos, &pair.rv.pos);
    if fw.start > fw.end || rv.start > rv.end {
        return Err(format!("inverted window ({} / {})", fw, rv));
    }
    if fw.end > rv.start {
        return Err(format!("forward window {} overlaps reverse window {}", fw, rv));
    }
    if rv.end > width {
        return Err(format!("reverse window {} exceeds alignment width {}", rv, width));
    }
    for (label, p) in [("forward", &pair.fw), ("reverse", &pair.rv)] {
        if p.sequence.len() != p.pos.width() {
            return Err(format!(
                "{} primer has {} bases but window {} spans {} columns",
                label,
                p.sequence.len(),
                p.pos,
                p.pos.width()
            ));
        }
    }
    Ok(())
}

/// Synthesize the gapped row for one primer pair in an alignment of `width`
/// columns. The result is exactly `width` long.
pub fn primer_row(ortholog: &str, index: usize, pair: &PrimerPair, width: usize) -> Result<AlignedRow> {
    check_geometry(pair, width).map_err(|message| MarkerError::PrimerGeometry {
        ortholog: ortholog.to_string(),
        index,
        message,
    })?;
    let (fw, rv) = (&pair.fw.pos, &pair.rv.pos);
    let mut row = Vec::with_capacity(width);
    row.resize(fw.start, GAP);
    row.extend_from_slice(pair.fw.sequence.as_bytes());
    row.resize(rv.start, GAP);
    row.extend(dna::revcomp(pair.rv.sequence.as_bytes()));
    row.resize(width, GAP);
    Ok(AlignedRow::new(primer_row_id(ortholog, index), row))
}

/// Primer rows followed by every row of `aln`.
///
/// Rejected pairs are returned beside the alignment; the remaining pairs keep
/// their original 1-based index in the row id.
pub fn reconstruct(ortholog: &str, pairs: &[PrimerPair], aln: &Alignment) -> (Alignment, Vec<MarkerError>) {
    let width = aln.width();
    let mut rows = Vec::with_capacity(pairs.len() + aln.len());
    let mut rejected = Vec::new();
    for (i, pair) in pairs.iter().enumerate() {
        match primer_row(ortholog, i + 1, pair, width) {
            Ok(r) => rows.push(r),
            Err(e) => rejected.push(e),
        }
    }
    rows.extend(aln.rows().iter().cloned());
    (Alignment::new_unchecked(rows), rejected)
}

/// Write `{ortholog}.primer_aln.fasta` next to `{ortholog}.prifi.aln`.
///
/// Returns `None` when there is nothing to place: no pairs, or every pair
/// rejected.
pub fn export_primer_alignment(primer_dir: &Path, ortholog: &str, pairs: &[PrimerPair]) -> Result<Option<PathBuf>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let aln = seqio::read_clustal(layout::aliased_alignment(primer_dir, ortholog))?;
    let (combined, rejected) = reconstruct(ortholog, pairs, &aln);
    for e in &rejected {
        warn!(ortholog, error = %e, "primer pair skipped");
    }
    if rejected.len() == pairs.len() {
        return Ok(None);
    }
    let out = layout::primer_alignment(primer_dir, ortholog);
    seqio::write_alignment_fasta(&out, &combined)?;
    debug!(ortholog, rows = combined.len(), path = %out.display(), "wrote primer alignment");
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PosRange, Primer};

    fn pair(fw: (usize, usize), rv: (usize, usize)) -> PrimerPair {
        let fw_seq: String = "ACGT".chars().cycle().take(fw.1 - fw.0).collect();
        let rv_seq: String = "AAGC".chars().cycle().take(rv.1.saturating_sub(rv.0)).collect();
        PrimerPair {
            ortholog: "OG1".into(),
            fw: Primer { sequence: fw_seq, pos: PosRange { start: fw.0, end: fw.1 }, tm: 60.0, length: fw.1 - fw.0 },
            rv: Primer {
                sequence: rv_seq,
                pos: PosRange { start: rv.0, end: rv.1 },
                tm: 59.0,
                length: rv.1.saturating_sub(rv.0),
            },
            product_len: rv.1.saturating_sub(fw.0),
        }
    }

    fn run_len(row: &[u8], from: usize, byte: u8) -> usize {
        row[from..].iter().take_while(|&&b| b == byte).count()
    }

    #[test]
    fn documented_row_layout() {
        let p = pair((10, 30), (100, 120));
        let row = primer_row("OG1", 1, &p, 150).unwrap();
        let r = &row.residues;
        assert_eq!(row.id, "OG1_1-1");
        assert_eq!(r.len(), 150);
        assert_eq!(run_len(r, 0, b'-'), 10);
        assert_eq!(&r[10..30], p.fw.sequence.as_bytes());
        assert_eq!(run_len(r, 30, b'-'), 70);
        assert_eq!(&r[100..120], dna::revcomp(p.rv.sequence.as_bytes()).as_slice());
        assert_eq!(&r[100..104], b"GCTT");
        assert_eq!(run_len(r, 120, b'-'), 30);
    }

    #[test]
    fn width_is_exact_across_placements() {
        let width = 90;
        for a in [0, 5, 20] {
            for gap in [0, 1, 13] {
                for tail in [0, 7] {
                    let (b, c) = (a + 18, a + 18 + gap);
                    let d = width - tail;
                    let row = primer_row("OG1", 1, &pair((a, b), (c, d)), width).unwrap();
                    assert_eq!(row.residues.len(), width, "fw=({a},{b}) rv=({c},{d})");
                }
            }
        }
    }

    #[test]
    fn adjacent_windows_leave_no_gap() {
        let row = primer_row("OG1", 1, &pair((0, 4), (4, 8)), 8).unwrap();
        assert!(!row.residues.contains(&b'-'));
    }

    #[test]
    fn overlapping_windows_are_rejected() {
        let err = primer_row("OG1", 3, &pair((10, 30), (25, 45)), 100).unwrap_err();
        match err {
            MarkerError::PrimerGeometry { index, message, .. } => {
                assert_eq!(index, 3);
                assert!(message.contains("overlaps"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn window_past_alignment_end_is_rejected() {
        assert!(matches!(
            primer_row("OG1", 1, &pair((10, 30), (100, 120)), 110),
            Err(MarkerError::PrimerGeometry { .. })
        ));
    }

    #[test]
    fn sequence_length_must_match_window() {
        let mut p = pair((10, 30), (100, 120));
        p.fw.sequence.push('A');
        assert!(matches!(primer_row("OG1", 1, &p, 150), Err(MarkerError::PrimerGeometry { .. })));
    }

    #[test]
    fn primer_rows_precede_alignment_rows_and_keep_indices() {
        let aln = Alignment::new(vec![
            AlignedRow::new("0", vec![b'A'; 60]),
            AlignedRow::new("1", vec![b'C'; 60]),
        ])
        .unwrap();
        let pairs = vec![pair((0, 10), (40, 50)), pair((5, 25), (20, 30)), pair((10, 20), (45, 55))];
        let (out, rejected) = reconstruct("OG1", &pairs, &aln);
        let ids: Vec<_> = out.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["OG1_1-1", "OG1_3-3", "0", "1"]);
        assert_eq!(rejected.len(), 1);
        assert!(out.rows().iter().all(|r| r.residues.len() == 60));
    }

    #[test]
    fn export_writes_only_for_orthologs_with_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let aln = Alignment::new(vec![AlignedRow::new("0", vec![b'G'; 40])]).unwrap();
        seqio::write_clustal_file(layout::aliased_alignment(dir.path(), "OG1"), &aln).unwrap();

        assert_eq!(export_primer_alignment(dir.path(), "OG1", &[]).unwrap(), None);
        assert!(!layout::primer_alignment(dir.path(), "OG1").exists());

        let out = export_primer_alignment(dir.path(), "OG1", &[pair((2, 8), (30, 36))]).unwrap().unwrap();
        let rows = seqio::read_fasta(&out).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "OG1_1-1");
        assert_eq!(rows[0].residues.len(), 40);
        assert_eq!(rows[1].residues, vec![b'G'; 40]);
    }

    #[test]
    fn all_rejected_pairs_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let aln = Alignment::new(vec![AlignedRow::new("0", vec![b'G'; 40])]).unwrap();
        seqio::write_clustal_file(layout::aliased_alignment(dir.path(), "OG2"), &aln).unwrap();
        assert_eq!(export_primer_alignment(dir.path(), "OG2", &[pair((2, 8), (30, 60))]).unwrap(), None);
    }
}
