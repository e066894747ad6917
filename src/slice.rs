//! Reference-guided slice extraction.
//!
//! For every reference record with a best hit, the ortholog's own sequences
//! (strand-corrected) and a padded, upper-cased slice of the record are written
//! to `{orthologId}.ref.fasta`. The reference slice is always the last record:
//! the aligner runs with input order preserved, so it stays the last row.
use std::collections::HashSet;
use std::path::Path;

use bio::alphabets::dna;
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::error::{MarkerError, Result};
use crate::layout;
use crate::model::{BestHit, BestHitTable, HitRange, Sequence, Strand};
use crate::seqio::{self, GenomeRecord};

/// Half-open slice bounds around `range`, clamped to `[0, genome_len]`.
pub fn padded_bounds(range: HitRange, genome_len: usize, padding: usize) -> (usize, usize) {
    let end = genome_len.min(range.end().saturating_add(padding));
    let start = range.start().saturating_sub(padding).min(end);
    (start, end)
}

/// The padded, upper-cased slice of a genome record.
pub fn extract_slice(record: &GenomeRecord, range: HitRange, padding: usize) -> Sequence {
    let (start, end) = padded_bounds(range, record.seq.len(), padding);
    let residues = record.seq[start..end].to_ascii_uppercase();
    Sequence::new(record.id.clone(), Some(format!("slice={}..{}", start, end)), residues)
}

/// Orient `seq` to the reference.
///
/// `Minus` sequences are reverse-complemented and their id gains `suffix`
/// (once; an id already ending in `suffix` keeps it). The description becomes
/// the new id.
pub fn correct_strand(seq: &Sequence, strand: Strand, suffix: &str) -> Sequence {
    match strand {
        Strand::Plus => Sequence { strand: Some(Strand::Plus), ..seq.clone() },
        Strand::Minus => {
            let id = if seq.id.ends_with(suffix) { seq.id.clone() } else { format!("{}{}", seq.id, suffix) };
            Sequence {
                description: Some(id.clone()),
                id,
                residues: dna::revcomp(&seq.residues),
                strand: Some(Strand::Minus),
            }
        }
    }
}

/// Composite records for one ortholog: member sequences in group order, then
/// the reference slice.
///
/// Members without a hit are kept unchanged and reported through `on_missing`.
pub fn build_composite<F>(
    members: &[Sequence],
    hit: &BestHit,
    record: &GenomeRecord,
    cfg: &ExtractionConfig,
    mut on_missing: F,
) -> Vec<Sequence>
where
    F: FnMut(&Sequence),
{
    let mut out: Vec<Sequence> = members
        .iter()
        .map(|s| match hit.seqs.get(&s.id) {
            Some(h) => correct_strand(s, h.strand, &cfg.reverse_suffix),
            None => {
                on_missing(s);
                s.clone()
            }
        })
        .collect();
    out.push(extract_slice(record, hit.range, cfg.padding));
    out
}

/// Outcome of one extraction run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractionSummary {
    /// Composite files written.
    pub written: usize,
    /// Orthologs skipped because their group file could not be read or written.
    pub skipped: usize,
    /// Member sequences written without a hit.
    pub unmatched_sequences: usize,
    /// Best-hit records absent from the genome.
    pub unseen_records: usize,
}

/// Stream `genome` and write one composite per best-hit record into `mapped_dir`.
///
/// Ortholog groups are read from `{trimmed_dir}/{orthologId}.trim.fasta`. An
/// unreadable genome is fatal; anything per ortholog is logged and skipped.
pub fn extract_all(
    genome: &Path,
    hits: &BestHitTable,
    trimmed_dir: &Path,
    mapped_dir: &Path,
    cfg: &ExtractionConfig,
) -> Result<ExtractionSummary> {
    std::fs::create_dir_all(mapped_dir).map_err(|e| MarkerError::io(mapped_dir, e))?;
    let mut summary = ExtractionSummary::default();
    let mut seen: HashSet<String> = HashSet::new();

    seqio::for_each_genome_record(genome, |record| {
        let Some(hit) = hits.get(&record.id) else { return Ok(()) };
        if !seen.insert(record.id.clone()) {
            warn!(
                ortholog = %hit.ortholog,
                record = %record.id,
                genome = %genome.display(),
                "repeated genome record id; later copy ignored"
            );
            return Ok(());
        }
        match write_composite(&record, hit, trimmed_dir, mapped_dir, cfg) {
            Ok(unmatched) => {
                summary.written += 1;
                summary.unmatched_sequences += unmatched;
            }
            Err(e) => {
                warn!(ortholog = %hit.ortholog, record = %record.id, error = %e, "skipping ortholog");
                summary.skipped += 1;
            }
        }
        Ok(())
    })?;

    summary.unseen_records = hits.iter().filter(|(record, _)| !seen.contains(record.as_str())).count();
    if summary.unseen_records > 0 {
        warn!(count = summary.unseen_records, genome = %genome.display(), "best-hit records not found in genome");
    }
    info!(
        written = summary.written,
        skipped = summary.skipped,
        unmatched = summary.unmatched_sequences,
        "reference slices extracted"
    );
    Ok(summary)
}

fn write_composite(
    record: &GenomeRecord,
    hit: &BestHit,
    trimmed_dir: &Path,
    mapped_dir: &Path,
    cfg: &ExtractionConfig,
) -> Result<usize> {
    let group_path = layout::trimmed_group(trimmed_dir, &hit.ortholog);
    let group = seqio::read_ortholog_group(&group_path)?;
    let mut unmatched = 0usize;
    let composite = build_composite(&group.sequences, hit, record, cfg, |s| {
        unmatched += 1;
        warn!(
            ortholog = %group.id,
            sequence = %s.id,
            path = %group_path.display(),
            "ortholog sequence not found in BLAST hits; written unchanged"
        );
    });
    let out = layout::composite_fasta(mapped_dir, &hit.ortholog);
    seqio::write_fasta_file(&out, &composite)?;
    debug!(ortholog = %hit.ortholog, path = %out.display(), records = composite.len(), "wrote composite");
    Ok(unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeqHit;
    use std::collections::HashMap;

    fn genome(len: usize) -> GenomeRecord {
        let seq: Vec<u8> = b"acgt".iter().cycle().take(len).copied().collect();
        GenomeRecord { id: "chr1".into(), seq }
    }

    fn seq_hit(strand: Strand) -> SeqHit {
        SeqHit { strand, bitscore: 100.0, evalue: 1e-30, range: HitRange::new(500, 520).unwrap() }
    }

    #[test]
    fn slice_of_interior_hit_is_padded_and_uppercased() {
        let g = genome(1000);
        let s = extract_slice(&g, HitRange::new(500, 520).unwrap(), 100);
        assert_eq!(s.len(), 220);
        assert_eq!(s.residues, g.seq[400..620].to_ascii_uppercase());
        assert_eq!(s.id, "chr1");
        assert_eq!(s.description.as_deref(), Some("slice=400..620"));
    }

    #[test]
    fn bounds_clamp_at_both_genome_edges() {
        assert_eq!(padded_bounds(HitRange::new(10, 40).unwrap(), 1000, 100), (0, 140));
        assert_eq!(padded_bounds(HitRange::new(900, 995).unwrap(), 1000, 100), (800, 1000));
        assert_eq!(padded_bounds(HitRange::new(0, 1000).unwrap(), 1000, 100), (0, 1000));
    }

    #[test]
    fn range_past_genome_end_yields_empty_slice() {
        assert_eq!(padded_bounds(HitRange::new(2000, 2100).unwrap(), 1000, 100), (1000, 1000));
        let s = extract_slice(&genome(1000), HitRange::new(2000, 2100).unwrap(), 100);
        assert!(s.is_empty());
    }

    #[test]
    fn minus_strand_is_reverse_complemented_and_renamed() {
        let s = Sequence::new("sp1|g7", Some("gene 7".into()), b"AACGTT-G".to_vec());
        let c = correct_strand(&s, Strand::Minus, "_rv");
        assert_eq!(c.id, "sp1|g7_rv");
        assert_eq!(c.description.as_deref(), Some("sp1|g7_rv"));
        assert_eq!(c.residues, b"C-AACGTT".to_vec());
    }

    #[test]
    fn double_correction_restores_residues_but_not_a_second_suffix() {
        let s = Sequence::new("s", None, b"ATGGCCAAN".to_vec());
        let once = correct_strand(&s, Strand::Minus, "_rv");
        let twice = correct_strand(&once, Strand::Minus, "_rv");
        assert_eq!(twice.residues, s.residues);
        assert_eq!(twice.id, "s_rv");
        assert_ne!(twice.id, s.id);
    }

    #[test]
    fn plus_strand_is_untouched() {
        let s = Sequence::new("s", Some("d".into()), b"acgT".to_vec());
        let c = correct_strand(&s, Strand::Plus, "_rv");
        assert_eq!((c.id.as_str(), c.residues.as_slice()), ("s", b"acgT".as_slice()));
        assert_eq!(c.description.as_deref(), Some("d"));
    }

    #[test]
    fn composite_keeps_unmatched_members_and_ends_with_reference() {
        let members = vec![
            Sequence::new("a", None, b"AAAC".to_vec()),
            Sequence::new("b", None, b"GGGT".to_vec()),
            Sequence::new("c", None, b"TTTT".to_vec()),
        ];
        let mut seqs = HashMap::new();
        seqs.insert("a".to_string(), seq_hit(Strand::Plus));
        seqs.insert("b".to_string(), seq_hit(Strand::Minus));
        let hit = BestHit { ortholog: "OG1".into(), seqs, range: HitRange::new(500, 520).unwrap() };
        let mut missing = Vec::new();
        let out = build_composite(&members, &hit, &genome(1000), &ExtractionConfig::default(), |s| {
            missing.push(s.id.clone())
        });
        let ids: Vec<_> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b_rv", "c", "chr1"]);
        assert_eq!(out[1].residues, b"ACCC".to_vec());
        assert_eq!(out[2].residues, b"TTTT".to_vec());
        assert_eq!(missing, vec!["c".to_string()]);
        assert_eq!(out[3].len(), 220);
    }

    #[test]
    fn extraction_writes_composites_and_tolerates_missing_groups() {
        let dir = tempfile::tempdir().unwrap();
        let trimmed = dir.path().join("trimmed");
        let mapped = dir.path().join("mapped");
        std::fs::create_dir_all(&trimmed).unwrap();
        let genome_path = dir.path().join("genome.fasta");
        let chr1: String = "ACGT".repeat(250);
        let chr2: String = "GGCC".repeat(50);
        std::fs::write(&genome_path, format!(">chr1 main\n{}\n>chr2\n{}\n", chr1, chr2)).unwrap();
        std::fs::write(trimmed.join("OG1.trim.fasta"), ">a\nACGTACGT\n>b\nTTGG\n").unwrap();

        let mut table = BestHitTable::new();
        let mut seqs = HashMap::new();
        seqs.insert("a".to_string(), seq_hit(Strand::Minus));
        table.insert("chr1", BestHit { ortholog: "OG1".into(), seqs, range: HitRange::new(500, 520).unwrap() }).unwrap();
        table
            .insert("chr2", BestHit { ortholog: "OG2".into(), seqs: HashMap::new(), range: HitRange::new(0, 10).unwrap() })
            .unwrap();
        table
            .insert("chrX", BestHit { ortholog: "OG3".into(), seqs: HashMap::new(), range: HitRange::new(0, 10).unwrap() })
            .unwrap();

        let summary = extract_all(&genome_path, &table, &trimmed, &mapped, &ExtractionConfig::default()).unwrap();
        assert_eq!(
            summary,
            ExtractionSummary { written: 1, skipped: 1, unmatched_sequences: 1, unseen_records: 1 }
        );
        let composite = seqio::read_fasta(layout::composite_fasta(&mapped, "OG1")).unwrap();
        let ids: Vec<_> = composite.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a_rv", "b", "chr1"]);
        assert_eq!(composite[2].residues, chr1.as_bytes()[400..620].to_vec());
        assert!(!layout::composite_fasta(&mapped, "OG2").exists());
    }

    #[test]
    fn repeated_genome_record_keeps_the_first_copy() {
        let dir = tempfile::tempdir().unwrap();
        let trimmed = dir.path().join("trimmed");
        let mapped = dir.path().join("mapped");
        std::fs::create_dir_all(&trimmed).unwrap();
        let genome_path = dir.path().join("genome.fasta");
        std::fs::write(&genome_path, ">chr1\nACGTACGT\n>chr1\nTTTTTTTT\n").unwrap();
        std::fs::write(trimmed.join("OG1.trim.fasta"), ">a\nACGT\n").unwrap();

        let mut table = BestHitTable::new();
        table
            .insert("chr1", BestHit { ortholog: "OG1".into(), seqs: HashMap::new(), range: HitRange::new(2, 4).unwrap() })
            .unwrap();

        let summary = extract_all(&genome_path, &table, &trimmed, &mapped, &ExtractionConfig::default()).unwrap();
        assert_eq!(
            summary,
            ExtractionSummary { written: 1, skipped: 0, unmatched_sequences: 1, unseen_records: 0 }
        );
        let composite = seqio::read_fasta(layout::composite_fasta(&mapped, "OG1")).unwrap();
        assert_eq!(composite.last().unwrap().residues, b"ACGTACGT".to_vec());
    }
}
