//! Best-hit ingestion from BLAST tabular output.
//!
//! The table is the one written by `blastn -outfmt "6 std sstrand"`:
//! `qseqid sseqid pident length mismatch gapopen qstart qend sstart send evalue
//! bitscore sstrand`. Rows are validated here (strand, coordinates) so that the
//! slice arithmetic downstream never sees a malformed record.
//!
//! BLAST subject coordinates are 1-based and inclusive, with `sstart > send`
//! on the minus strand; [`BlastHit::range`] is the 0-based half-open span.
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{MarkerError, Result};
use crate::model::{BestHit, BestHitTable, HitRange, OrthologGroup, SeqHit, Strand};

#[derive(Debug, Deserialize)]
struct RawHit {
    qseqid: String,
    sseqid: String,
    _pident: f64,
    _length: u64,
    _mismatch: u64,
    _gapopen: u64,
    _qstart: u64,
    _qend: u64,
    sstart: usize,
    send: usize,
    evalue: f64,
    bitscore: f64,
    sstrand: String,
}

/// One validated BLAST hit.
#[derive(Debug, Clone, PartialEq)]
pub struct BlastHit {
    /// Ortholog sequence id.
    pub query: String,
    /// Reference record id.
    pub subject: String,
    pub evalue: f64,
    pub bitscore: f64,
    pub strand: Strand,
    pub range: HitRange,
}

/// Load and validate a BLAST tabular file. Any malformed row fails the run.
pub fn load_blast_table<P: AsRef<Path>>(path: P) -> Result<Vec<BlastHit>> {
    let p = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .from_path(p)
        .map_err(|e| MarkerError::InvalidHit { path: p.to_path_buf(), line: 0, message: e.to_string() })?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| MarkerError::InvalidHit {
            path: p.to_path_buf(),
            line: e.position().map_or(0, |pos| pos.line()),
            message: e.to_string(),
        })?;
        let line = rec.position().map_or(0, |pos| pos.line());
        let invalid = |message: String| MarkerError::InvalidHit { path: p.to_path_buf(), line, message };
        let raw: RawHit = rec.deserialize(None).map_err(|e| invalid(e.to_string()))?;
        let strand = raw.sstrand.parse::<Strand>().map_err(|e| invalid(e.to_string()))?;
        if raw.sstart == 0 || raw.send == 0 {
            return Err(invalid(format!("subject coordinates must be 1-based, got {}..{}", raw.sstart, raw.send)));
        }
        let lo = raw.sstart.min(raw.send);
        let hi = raw.sstart.max(raw.send);
        out.push(BlastHit {
            query: raw.qseqid,
            subject: raw.sseqid,
            evalue: raw.evalue,
            bitscore: raw.bitscore,
            strand,
            range: HitRange::new(lo - 1, hi)?,
        });
    }
    debug!(path = %p.display(), hits = out.len(), "loaded BLAST table");
    Ok(out)
}

/// Map every member sequence id to its ortholog id.
pub fn membership<'a, I>(groups: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a OrthologGroup>,
{
    let mut m = HashMap::new();
    for g in groups {
        for s in &g.sequences {
            m.insert(s.id.clone(), g.id.clone());
        }
    }
    m
}

/// Pick one reference record per ortholog and at most one ortholog per record.
///
/// Per (sequence, record) only the highest-bitscore hit counts. Each ortholog
/// takes the record with the largest summed bitscore over its sequences; if two
/// orthologs want the same record the higher score wins and the other is
/// dropped with a warning.
pub fn select_best_hits(hits: &[BlastHit], membership: &HashMap<String, String>) -> Result<BestHitTable> {
    let mut best_pair: BTreeMap<(&str, &str), &BlastHit> = BTreeMap::new();
    for h in hits {
        if !membership.contains_key(&h.query) {
            warn!(sequence = %h.query, record = %h.subject, "BLAST query is not a member of any ortholog; ignored");
            continue;
        }
        let slot = best_pair.entry((h.query.as_str(), h.subject.as_str())).or_insert(h);
        if h.bitscore > slot.bitscore {
            *slot = h;
        }
    }

    // ortholog -> record -> hits
    let mut by_ortholog: BTreeMap<&str, BTreeMap<&str, Vec<&BlastHit>>> = BTreeMap::new();
    for ((query, subject), h) in &best_pair {
        let ortholog = membership[*query].as_str();
        by_ortholog.entry(ortholog).or_default().entry(*subject).or_default().push(*h);
    }

    // record -> (score, ortholog, hits)
    let mut claims: BTreeMap<&str, (f64, &str, Vec<&BlastHit>)> = BTreeMap::new();
    for (ortholog, records) in by_ortholog {
        let mut chosen: Option<(f64, &str, Vec<&BlastHit>)> = None;
        for (record, hs) in records {
            let score: f64 = hs.iter().map(|h| h.bitscore).sum();
            if chosen.as_ref().map_or(true, |c| score > c.0) {
                chosen = Some((score, record, hs));
            }
        }
        let Some((score, record, hs)) = chosen else { continue };
        let held = claims.get(record).map(|(s, o, _)| (*s, *o));
        match held {
            Some((held_score, holder)) if held_score >= score => {
                warn!(ortholog, record, holder, "reference record already claimed by a better-scoring ortholog; dropped");
            }
            Some((_, holder)) => {
                warn!(ortholog = holder, record, winner = ortholog, "reference record claimed by a better-scoring ortholog; dropped");
                claims.insert(record, (score, ortholog, hs));
            }
            None => {
                claims.insert(record, (score, ortholog, hs));
            }
        }
    }

    let mut table = BestHitTable::new();
    for (record, (_, ortholog, hs)) in claims {
        let range = hs.iter().skip(1).fold(hs[0].range, |acc, h| acc.union(&h.range));
        let seqs = hs
            .iter()
            .map(|h| {
                (h.query.clone(), SeqHit { strand: h.strand, bitscore: h.bitscore, evalue: h.evalue, range: h.range })
            })
            .collect();
        table.insert(record, BestHit { ortholog: ortholog.to_string(), seqs, range })?;
    }
    Ok(table)
}
