//! Sequence and alignment IO: **FASTA / FASTA.GZ** genomes, ortholog FASTA
//! files and **Clustal** alignments.
//!
//! ### Design
//! - **Genome** streamed record by record with `needletail`; the reference can
//!   be large and is only ever read sequentially.
//! - **Ortholog / composite FASTA** read and written with `bio::io::fasta`, which
//!   keeps the description next to the id.
//! - **Clustal** read and written here; only the blocked `id residues [count]`
//!   layout is recognised, consensus lines are skipped.
//!
//! ### Errors
//! Files are opened and closed inside each call. Failures carry the path.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bio::io::fasta;
use needletail::parse_fastx_file;

use crate::error::{MarkerError, Result};
use crate::layout;
use crate::model::{AlignedRow, Alignment, OrthologGroup, Sequence};

/// Columns per Clustal block.
const CLUSTAL_BLOCK: usize = 60;

/// A reference genome record as streamed from disk.
#[derive(Debug, Clone)]
pub struct GenomeRecord {
    /// First whitespace-delimited token of the header.
    pub id: String,
    pub seq: Vec<u8>,
}

/// Core driver: stream genome records in file order, invoking `on_record` for each.
///
/// Any read failure is fatal for the run ([`MarkerError::Genome`]). Returns the
/// number of records seen.
pub fn for_each_genome_record<P, F>(path: P, mut on_record: F) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(GenomeRecord) -> Result<()>,
{
    let p = path.as_ref();
    let genome_err = |message: String| MarkerError::Genome { path: p.to_path_buf(), message };
    let mut reader = parse_fastx_file(p).map_err(|e| genome_err(e.to_string()))?;
    let mut n = 0usize;
    while let Some(record) = reader.next() {
        let rec = record.map_err(|e| genome_err(e.to_string()))?;
        let header = String::from_utf8_lossy(rec.id()).to_string();
        let id = header.split_whitespace().next().unwrap_or("").to_string();
        let seq = rec.seq().to_vec();
        on_record(GenomeRecord { id, seq })?;
        n += 1;
    }
    Ok(n)
}

/// Read every record of a FASTA file.
pub fn read_fasta<P: AsRef<Path>>(path: P) -> Result<Vec<Sequence>> {
    let p = path.as_ref();
    let file = File::open(p).map_err(|e| MarkerError::io(p, e))?;
    let reader = fasta::Reader::new(file);
    let mut out = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| MarkerError::Fasta { path: p.to_path_buf(), message: e.to_string() })?;
        out.push(Sequence::new(record.id(), record.desc().map(String::from), record.seq().to_vec()));
    }
    Ok(out)
}

/// Load a trimmed ortholog group; the id comes from the file name.
pub fn read_ortholog_group<P: AsRef<Path>>(path: P) -> Result<OrthologGroup> {
    let p = path.as_ref();
    let id = layout::ortholog_id_from_path(p).ok_or_else(|| MarkerError::Fasta {
        path: p.to_path_buf(),
        message: "cannot derive ortholog id from file name".to_string(),
    })?;
    Ok(OrthologGroup { id, sequences: read_fasta(p)? })
}

/// Write sequences as FASTA to any writer.
pub fn write_fasta<W: Write>(w: W, seqs: &[Sequence]) -> std::io::Result<()> {
    let mut writer = fasta::Writer::new(w);
    for s in seqs {
        writer.write(&s.id, s.description.as_deref(), &s.residues)?;
    }
    writer.flush()
}

pub fn write_fasta_file<P: AsRef<Path>>(path: P, seqs: &[Sequence]) -> Result<()> {
    let p = path.as_ref();
    let file = File::create(p).map_err(|e| MarkerError::io(p, e))?;
    write_fasta(BufWriter::new(file), seqs).map_err(|e| MarkerError::io(p, e))
}

/// Write an alignment as gapped FASTA.
pub fn write_alignment_fasta<P: AsRef<Path>>(path: P, aln: &Alignment) -> Result<()> {
    let p = path.as_ref();
    let file = File::create(p).map_err(|e| MarkerError::io(p, e))?;
    let mut writer = fasta::Writer::new(BufWriter::new(file));
    for row in aln.rows() {
        writer.write(&row.id, row.description.as_deref(), &row.residues).map_err(|e| MarkerError::io(p, e))?;
    }
    writer.flush().map_err(|e| MarkerError::io(p, e))
}

/// Read a Clustal alignment from disk.
///
/// A missing header, an empty file and a file without rows are errors; callers
/// decide whether that skips one ortholog or more.
pub fn read_clustal<P: AsRef<Path>>(path: P) -> Result<Alignment> {
    let p = path.as_ref();
    let text = std::fs::read_to_string(p).map_err(|e| MarkerError::io(p, e))?;
    parse_clustal(&text, p)
}

/// Parse Clustal text; `path` is only used for error context.
pub fn parse_clustal(text: &str, path: &Path) -> Result<Alignment> {
    let bad = |message: String| MarkerError::Alignment { path: path.to_path_buf(), message };
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());
    match lines.next() {
        None => return Err(MarkerError::EmptyAlignment { path: path.to_path_buf() }),
        Some(h) if h.starts_with("CLUSTAL") => {}
        Some(h) => return Err(bad(format!("expected CLUSTAL header, found '{}'", h))),
    }

    // Rows are matched by position: the first block fixes the order, the
    // i-th line of every later block extends row i. Ids may repeat.
    let mut rows: Vec<AlignedRow> = Vec::new();
    let mut block = 0usize;
    let mut pos = 0usize;
    let mut in_block = false;
    for line in lines {
        // Blank separators and consensus lines (leading whitespace).
        if line.trim().is_empty() || line.starts_with(char::is_whitespace) {
            in_block = false;
            continue;
        }
        if !in_block {
            in_block = true;
            block += 1;
            pos = 0;
        }
        let mut fields = line.split_whitespace();
        let id = fields.next().unwrap_or_default();
        let residues = fields.next().unwrap_or("");
        if let Some(extra) = fields.next() {
            if extra.parse::<usize>().is_err() {
                return Err(bad(format!("unexpected token '{}' after residues of '{}'", extra, id)));
            }
        }
        if block == 1 {
            rows.push(AlignedRow::new(id, residues.as_bytes().to_vec()));
        } else {
            let row = rows.get_mut(pos).ok_or_else(|| {
                bad(format!("block {} has more rows than the first block ({})", block, pos))
            })?;
            if row.id != id {
                return Err(bad(format!("block {} row {} is '{}', expected '{}'", block, pos + 1, id, row.id)));
            }
            row.residues.extend_from_slice(residues.as_bytes());
        }
        pos += 1;
    }
    if rows.is_empty() {
        return Err(MarkerError::EmptyAlignment { path: path.to_path_buf() });
    }
    Alignment::new(rows)
}

/// Write an alignment in Clustal layout.
pub fn write_clustal<W: Write>(mut w: W, aln: &Alignment) -> std::io::Result<()> {
    writeln!(w, "CLUSTAL W (1.83) multiple sequence alignment")?;
    writeln!(w)?;
    writeln!(w)?;
    let pad = aln.rows().iter().map(|r| r.id.len()).max().unwrap_or(0) + 6;
    let width = aln.width();
    let blocks = std::cmp::max(1, width.div_ceil(CLUSTAL_BLOCK));
    for b in 0..blocks {
        let start = b * CLUSTAL_BLOCK;
        let end = std::cmp::min(width, start + CLUSTAL_BLOCK);
        for row in aln.rows() {
            let chunk = String::from_utf8_lossy(&row.residues[start..end]);
            writeln!(w, "{:<pad$}{}", row.id, chunk, pad = pad)?;
        }
        writeln!(w)?;
    }
    w.flush()
}

pub fn write_clustal_file<P: AsRef<Path>>(path: P, aln: &Alignment) -> Result<()> {
    let p = path.as_ref();
    let file = File::create(p).map_err(|e| MarkerError::io(p, e))?;
    write_clustal(BufWriter::new(file), aln).map_err(|e| MarkerError::io(p, e))
}
