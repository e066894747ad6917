//! Primer-design report parsing.
//!
//! A report is a sequence of blocks separated by `---` lines. Every block that
//! contains `Primer set` must have this layout (blank lines and surrounding
//! whitespace are tolerated):
//!
//! ```text
//! Primer set 1  (10-30 / 80-100)
//!
//! Fw 5'-ACGTACGTACGTACGTACGT
//! Rv 5'-TTAATTAATTAATTAATTAA
//!
//! Tm = 60.1 / 59.8
//! Primer lengths: 20 / 20
//! Avg. #sequences in primer alignments: 4.0 / 4.0
//! Estimated product length: 90
//! ```
//!
//! The last label may also read `Product length`. A block that does not fit is
//! a hard error for the whole report; an absent or empty report simply has no
//! primer pairs.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::error::{ErrorScope, MarkerError, Result};
use crate::layout;
use crate::model::{PosRange, Primer, PrimerPair};

const BLOCK_START: &str = "Primer set";

const BLOCK_PATTERN: &str = concat!(
    r"^Primer set \d+\s+\((?P<pos_fw>\S+) / (?P<pos_rv>\S+)\)\s*",
    r"Fw 5'-(?P<seq_fw>\S+?)(?:-3')?[ \t]*\r?\n\s*",
    r"Rv 5'-(?P<seq_rv>\S+?)(?:-3')?[ \t]*\r?\n\s*",
    r"Tm = (?P<tm_fw>\S+) / (?P<tm_rv>\S+)\s*",
    r"Primer lengths: (?P<len_fw>\d+) / (?P<len_rv>\d+)\s*",
    r"(?:Avg\. #sequences in primer alignments: \S+ / \S+\s*)?",
    r"(?:Estimated product length|Product length): (?P<prod_len>\d+)",
);

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BLOCK_PATTERN).expect("primer block pattern compiles"))
}

/// A separator is a line of three or more dashes.
fn is_separator(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 3 && t.bytes().all(|b| b == b'-')
}

/// Split report text into primer-set blocks, each starting at `Primer set`.
///
/// Text before the first `Primer set` of a chunk (headers, summaries) is
/// dropped, as are chunks without one.
pub fn primer_blocks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if is_separator(line) {
            chunks.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    chunks.push(current);
    chunks
        .into_iter()
        .filter_map(|c| c.find(BLOCK_START).map(|i| c[i..].to_string()))
        .collect()
}

/// Parse report text. `ortholog` is stamped on every pair; `path` is only used
/// for error context.
pub fn parse_report_str(text: &str, ortholog: &str, path: &Path) -> Result<Vec<PrimerPair>> {
    primer_blocks(text)
        .iter()
        .enumerate()
        .map(|(i, block)| parse_block(block, ortholog).map_err(|message| MarkerError::Report {
            path: path.to_path_buf(),
            block: i + 1,
            message,
        }))
        .collect()
}

fn parse_block(block: &str, ortholog: &str) -> std::result::Result<PrimerPair, String> {
    if block[BLOCK_START.len()..].contains(BLOCK_START) {
        return Err("two primer sets without a separator between them".to_string());
    }
    let caps = block_regex()
        .captures(block)
        .ok_or_else(|| "block does not match the primer set layout".to_string())?;
    let fw = primer(&caps, "pos_fw", "seq_fw", "tm_fw", "len_fw")?;
    let rv = primer(&caps, "pos_rv", "seq_rv", "tm_rv", "len_rv")?;
    let product_len = number::<usize>(&caps, "prod_len")?;
    Ok(PrimerPair { ortholog: ortholog.to_string(), fw, rv, product_len })
}

fn primer(caps: &Captures<'_>, pos: &str, seq: &str, tm: &str, len: &str) -> std::result::Result<Primer, String> {
    let pos: PosRange = caps[pos].parse()?;
    if pos.start > pos.end {
        return Err(format!("position {} runs backwards", pos));
    }
    Ok(Primer {
        sequence: caps[seq].to_string(),
        pos,
        tm: number::<f64>(caps, tm)?,
        length: number::<usize>(caps, len)?,
    })
}

fn number<T>(caps: &Captures<'_>, name: &str) -> std::result::Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    caps[name].parse::<T>().map_err(|e| format!("{} '{}': {}", name, &caps[name], e))
}

/// Parse one report file. The ortholog id is the first dot-delimited token of
/// its name. A missing or empty file yields no pairs.
pub fn parse_report_file<P: AsRef<Path>>(path: P) -> Result<Vec<PrimerPair>> {
    let p = path.as_ref();
    let ortholog = layout::ortholog_id_from_path(p).ok_or_else(|| MarkerError::Report {
        path: p.to_path_buf(),
        block: 0,
        message: "cannot derive ortholog id from file name".to_string(),
    })?;
    let text = match std::fs::read_to_string(p) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(ortholog = %ortholog, path = %p.display(), "no primer report; no primers for this ortholog");
            return Ok(Vec::new());
        }
        Err(e) => return Err(MarkerError::io(p, e)),
    };
    let pairs = parse_report_str(&text, &ortholog, p)?;
    debug!(ortholog = %ortholog, pairs = pairs.len(), "parsed primer report");
    Ok(pairs)
}

/// Primer pairs gathered from a directory of reports.
#[derive(Debug, Default)]
pub struct ReportBatch {
    /// Pairs grouped by ortholog id; orthologs without pairs are absent.
    pub pairs: BTreeMap<String, Vec<PrimerPair>>,
    /// Reports dropped because a block did not parse.
    pub rejected: usize,
}

/// Parse every `*.rep` file in `dir`, grouped by ortholog id.
///
/// A report with a malformed block is logged and contributes nothing; other
/// failures propagate.
pub fn parse_report_dir<P: AsRef<Path>>(dir: P) -> Result<ReportBatch> {
    let d = dir.as_ref();
    let files = layout::files_with_suffix(d, layout::REPORT_EXT).map_err(|e| MarkerError::io(d, e))?;
    let mut batch = ReportBatch::default();
    for f in files {
        match parse_report_file(&f) {
            Ok(pairs) => {
                for pair in pairs {
                    batch.pairs.entry(pair.ortholog.clone()).or_default().push(pair);
                }
            }
            Err(e) if e.scope() == ErrorScope::Block => {
                warn!(path = %f.display(), error = %e, "primer report rejected");
                batch.rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }
    info!(
        orthologs = batch.pairs.len(),
        pairs = batch.pairs.values().map(Vec::len).sum::<usize>(),
        rejected = batch.rejected,
        "collected primer pairs"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_SET: &str = "PriFi report for OG5\n\n\
Primer set 1  (10-30 / 80-100)\n\n\
Fw 5'-ACGTACGTACGTACGTACGT\n\
Rv 5'-TTAATTAATTAATTAATTAA\n\n\
Tm = 60.1 / 59.8\n\
Primer lengths: 20 / 20\n\
Avg. #sequences in primer alignments: 4.0 / 3.5\n\
Product length: 90\n\
----------------------------------------\n";

    fn parse(text: &str) -> Result<Vec<PrimerPair>> {
        parse_report_str(text, "OG5", Path::new("OG5.prifi.aln.rep"))
    }

    #[test]
    fn parses_documented_block() {
        let pairs = parse(ONE_SET).unwrap();
        assert_eq!(pairs.len(), 1);
        let p = &pairs[0];
        assert_eq!(p.ortholog, "OG5");
        assert_eq!(p.fw.pos, PosRange { start: 10, end: 30 });
        assert_eq!(p.rv.pos, PosRange { start: 80, end: 100 });
        assert_eq!(p.product_len, 90);
        assert_eq!(p.fw.sequence, "ACGTACGTACGTACGTACGT");
        assert_eq!(p.rv.sequence, "TTAATTAATTAATTAATTAA");
        assert_eq!((p.fw.tm, p.rv.tm), (60.1, 59.8));
        assert_eq!((p.fw.length, p.rv.length), (20, 20));
    }

    #[test]
    fn both_product_length_labels_give_the_same_pair() {
        let estimated = ONE_SET.replace("Product length", "Estimated product length");
        assert_ne!(estimated, ONE_SET);
        assert_eq!(parse(&estimated).unwrap(), parse(ONE_SET).unwrap());
    }

    #[test]
    fn three_prime_marker_and_crlf_are_tolerated() {
        let text = ONE_SET
            .replace("ACGTACGTACGTACGTACGT\n", "ACGTACGTACGTACGTACGT-3'\n")
            .replace('\n', "\r\n");
        let pairs = parse(&text).unwrap();
        assert_eq!(pairs[0].fw.sequence, "ACGTACGTACGTACGTACGT");
        assert_eq!(pairs[0].rv.sequence, "TTAATTAATTAATTAATTAA");
    }

    #[test]
    fn several_blocks_and_unterminated_tail() {
        let second = ONE_SET.replace("Primer set 1", "Primer set 2").replace("10-30", "12-32");
        let tail = second.trim_end_matches(|c| c == '-' || c == '\n').to_string();
        let text = format!("{}{}", ONE_SET, tail);
        let pairs = parse(&text).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].fw.pos.start, 12);
    }

    #[test]
    fn malformed_block_is_a_hard_error() {
        let text = ONE_SET.replace("Tm = 60.1 / 59.8", "Tm: 60.1");
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, MarkerError::Report { block: 1, .. }), "{err}");
    }

    #[test]
    fn non_numeric_temperature_is_rejected() {
        let err = parse(&ONE_SET.replace("60.1", "hot")).unwrap_err();
        assert!(err.to_string().contains("tm_fw"), "{err}");
    }

    #[test]
    fn missing_separator_is_reported() {
        let unterminated: Vec<&str> = ONE_SET.lines().filter(|l| !l.starts_with("---")).collect();
        let text = format!("{}\n{}", unterminated.join("\n"), ONE_SET);
        assert!(matches!(parse(&text), Err(MarkerError::Report { .. })));
    }

    #[test]
    fn report_without_blocks_has_no_pairs() {
        assert!(parse("No primers found.\n").unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn absent_or_empty_report_files_yield_no_pairs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_report_file(dir.path().join("OG9.prifi.aln.rep")).unwrap().is_empty());
        std::fs::write(dir.path().join("OG8.rep"), "").unwrap();
        assert!(parse_report_file(dir.path().join("OG8.rep")).unwrap().is_empty());
    }

    #[test]
    fn report_dir_groups_by_ortholog() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("OG5.prifi.aln.rep"), ONE_SET).unwrap();
        std::fs::write(dir.path().join("OG6.prifi.aln.rep"), "nothing here\n").unwrap();
        std::fs::write(dir.path().join("OG5.prifi.aln"), "CLUSTAL W\n").unwrap();
        let batch = parse_report_dir(dir.path()).unwrap();
        assert_eq!(batch.pairs.keys().collect::<Vec<_>>(), vec!["OG5"]);
        assert_eq!(batch.pairs["OG5"][0].ortholog, "OG5");
        assert_eq!(batch.rejected, 0);
    }

    #[test]
    fn malformed_report_is_dropped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("OG5.prifi.aln.rep"), ONE_SET).unwrap();
        std::fs::write(dir.path().join("OG7.prifi.aln.rep"), ONE_SET.replace("Tm = ", "Tm ~ ")).unwrap();
        let batch = parse_report_dir(dir.path()).unwrap();
        assert_eq!(batch.pairs.len(), 1);
        assert!(batch.pairs.contains_key("OG5"));
        assert_eq!(batch.rejected, 1);
    }
}
