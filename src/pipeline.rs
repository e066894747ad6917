//! Stage orchestration over a working directory.
//!
//! ```text
//! {workdir}/{trimmed}/OG.trim.fasta ─┐
//! genome + BLAST table ──────────────┴─ extract_slices ─> {mapped}/OG.ref.fasta
//!   realign ─> {mapped}/OG.mapped.aln
//!   alias_alignments ─> {primers}/OG.prifi.aln + OG.alias.tsv
//!   design_primers ─> {primers}/OG.prifi.aln.rep
//!   collect_primers ─> {primers}/primers.fa + primers.csv
//!   export_primer_alignments ─> {primers}/OG.primer_aln.fasta
//! ```
//!
//! Each stage reads only what the previous one wrote, so any stage can be
//! re-run alone. Per-ortholog failures are logged and counted; failures that
//! leave nothing to work on are returned.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};

use crate::alias;
use crate::config::Config;
use crate::error::{MarkerError, Result};
use crate::export;
use crate::hits;
use crate::layout;
use crate::model::PrimerPair;
use crate::reconstruct;
use crate::report;
use crate::seqio;
use crate::slice;
use crate::tools::{self, Aligner, MafftAligner, PriFi, PrimerDesigner};

/// Per-stage counts of orthologs (or files) handled and skipped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageSummary {
    pub processed: usize,
    pub skipped: usize,
}

/// Counts from [`Pipeline::run_all`], one per stage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub slices: StageSummary,
    pub realign: StageSummary,
    pub alias: StageSummary,
    pub design: StageSummary,
    pub primers: StageSummary,
    pub primer_alignments: StageSummary,
}

pub struct Pipeline {
    workdir: PathBuf,
    config: Config,
    aligner: Box<dyn Aligner>,
    designer: Box<dyn PrimerDesigner>,
}

impl Pipeline {
    /// Pipeline using the configured MAFFT and PriFi executables.
    pub fn new(workdir: impl Into<PathBuf>, config: Config) -> Self {
        let aligner = Box::new(MafftAligner::from_config(&config.tools));
        let designer = Box::new(PriFi::from_config(&config.tools));
        Self::with_tools(workdir, config, aligner, designer)
    }

    pub fn with_tools(
        workdir: impl Into<PathBuf>,
        config: Config,
        aligner: Box<dyn Aligner>,
        designer: Box<dyn PrimerDesigner>,
    ) -> Self {
        Pipeline { workdir: workdir.into(), config, aligner, designer }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn trimmed_dir(&self) -> PathBuf {
        self.workdir.join(&self.config.layout.trimmed_dir)
    }

    pub fn mapped_dir(&self) -> PathBuf {
        self.workdir.join(&self.config.layout.mapped_dir)
    }

    pub fn primer_dir(&self) -> PathBuf {
        self.workdir.join(&self.config.layout.primer_dir)
    }

    fn pool(&self) -> Result<ThreadPool> {
        let n = self.config.effective_threads();
        ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| MarkerError::Config { message: format!("cannot start {} worker threads: {}", n, e) })
    }

    fn inputs(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
        layout::files_with_suffix(dir, suffix).map_err(|e| MarkerError::io(dir, e))
    }

    /// Slice the genome around each ortholog's best hit and write composites.
    pub fn extract_slices(&self, genome: &Path, blast_table: &Path) -> Result<StageSummary> {
        let trimmed = self.trimmed_dir();
        let mut groups = Vec::new();
        for f in Self::inputs(&trimmed, layout::TRIMMED_EXT)? {
            match seqio::read_ortholog_group(&f) {
                Ok(g) => groups.push(g),
                Err(e) => warn!(path = %f.display(), error = %e, "unreadable ortholog group; ignored for hit selection"),
            }
        }
        let membership = hits::membership(&groups);
        let table = hits::select_best_hits(&hits::load_blast_table(blast_table)?, &membership)?;
        info!(groups = groups.len(), best_hits = table.len(), "selected best hits");

        let s = slice::extract_all(genome, &table, &trimmed, &self.mapped_dir(), &self.config.extraction)?;
        Ok(StageSummary { processed: s.written, skipped: s.skipped + s.unseen_records })
    }

    /// Align every composite; single-sequence composites skip the aligner.
    pub fn realign(&self) -> Result<StageSummary> {
        let mapped = self.mapped_dir();
        let inputs = Self::inputs(&mapped, layout::COMPOSITE_EXT)?;
        let aligner: &dyn Aligner = self.aligner.as_ref();
        let outcomes: Vec<Result<()>> = self.pool()?.install(|| {
            inputs
                .par_iter()
                .map(|input| {
                    let ortholog = layout::ortholog_id_from_path(input).ok_or_else(|| MarkerError::Fasta {
                        path: input.clone(),
                        message: "cannot derive ortholog id from file name".to_string(),
                    })?;
                    let output = layout::mapped_alignment(&mapped, &ortholog);
                    tools::align_or_bypass(aligner, input, &output).map(|_| ()).inspect_err(|_| {
                        let _ = std::fs::remove_file(&output);
                    })
                })
                .collect()
        });
        Ok(tally("realign", &inputs, outcomes))
    }

    /// Rename alignment rows to numeric aliases for the primer designer.
    pub fn alias_alignments(&self) -> Result<StageSummary> {
        let primer_dir = self.primer_dir();
        std::fs::create_dir_all(&primer_dir).map_err(|e| MarkerError::io(&primer_dir, e))?;
        let inputs = Self::inputs(&self.mapped_dir(), layout::MAPPED_EXT)?;
        let written = self.pool()?.install(|| alias::alias_files(&inputs, &primer_dir));
        let summary = StageSummary { processed: written.len(), skipped: inputs.len() - written.len() };
        info!(processed = summary.processed, skipped = summary.skipped, "alias stage finished");
        Ok(summary)
    }

    /// Run the primer designer on every aliased alignment.
    pub fn design_primers(&self) -> Result<StageSummary> {
        let inputs = Self::inputs(&self.primer_dir(), layout::ALIASED_EXT)?;
        let designer: &dyn PrimerDesigner = self.designer.as_ref();
        let outcomes: Vec<Result<()>> =
            self.pool()?.install(|| inputs.par_iter().map(|aln| designer.design(aln)).collect());
        Ok(tally("design", &inputs, outcomes))
    }

    /// Parse all reports and write `primers.fa` / `primers.csv`.
    pub fn collect_primers(&self) -> Result<(StageSummary, BTreeMap<String, Vec<PrimerPair>>)> {
        let primer_dir = self.primer_dir();
        let batch = report::parse_report_dir(&primer_dir)?;
        export::export_tables(&primer_dir, &batch.pairs)?;
        Ok((StageSummary { processed: batch.pairs.len(), skipped: batch.rejected }, batch.pairs))
    }

    /// Write one primer alignment per ortholog with primer pairs.
    pub fn export_primer_alignments(&self, pairs: &BTreeMap<String, Vec<PrimerPair>>) -> Result<StageSummary> {
        let primer_dir = self.primer_dir();
        let jobs: Vec<(&String, &Vec<PrimerPair>)> = pairs.iter().collect();
        let outcomes: Vec<Result<Option<PathBuf>>> = self.pool()?.install(|| {
            jobs.par_iter()
                .map(|(ortholog, ps)| reconstruct::export_primer_alignment(&primer_dir, ortholog, ps))
                .collect()
        });
        let mut summary = StageSummary::default();
        for ((ortholog, _), outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                Ok(Some(_)) => summary.processed += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    warn!(ortholog = %ortholog, error = %e, "primer alignment not written");
                    summary.skipped += 1;
                }
            }
        }
        info!(processed = summary.processed, skipped = summary.skipped, "primer alignments exported");
        Ok(summary)
    }

    /// Every stage in order.
    pub fn run_all(&self, genome: &Path, blast_table: &Path) -> Result<RunSummary> {
        let slices = self.extract_slices(genome, blast_table)?;
        let realign = self.realign()?;
        let alias = self.alias_alignments()?;
        let design = self.design_primers()?;
        let (primers, pairs) = self.collect_primers()?;
        let primer_alignments = self.export_primer_alignments(&pairs)?;
        let summary = RunSummary { slices, realign, alias, design, primers, primer_alignments };
        info!(?summary, "run finished");
        Ok(summary)
    }
}

/// Count outcomes, warning on each failure with its input path.
fn tally(stage: &str, inputs: &[PathBuf], outcomes: Vec<Result<()>>) -> StageSummary {
    let mut summary = StageSummary::default();
    for (path, outcome) in inputs.iter().zip(outcomes) {
        match outcome {
            Ok(()) => summary.processed += 1,
            Err(e) => {
                warn!(stage, path = %path.display(), error = %e, "ortholog skipped");
                summary.skipped += 1;
            }
        }
    }
    info!(stage, processed = summary.processed, skipped = summary.skipped, "stage finished");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingAligner;

    impl Aligner for FailingAligner {
        fn align(&self, _input: &Path, output: &Path) -> Result<()> {
            std::fs::write(output, "partial").map_err(|e| MarkerError::io(output, e))?;
            Err(MarkerError::Tool { tool: "mafft".into(), message: "exited with 1".into() })
        }
    }

    struct NoopDesigner;

    impl PrimerDesigner for NoopDesigner {
        fn design(&self, _alignment: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn pipeline(dir: &Path) -> Pipeline {
        let config = Config { threads: 2, ..Config::default() };
        Pipeline::with_tools(dir, config, Box::new(FailingAligner), Box::new(NoopDesigner))
    }

    #[test]
    fn directories_follow_layout_config() {
        let p = pipeline(Path::new("/work"));
        assert_eq!(p.trimmed_dir(), PathBuf::from("/work/trimmed"));
        assert_eq!(p.mapped_dir(), PathBuf::from("/work/mapped"));
        assert_eq!(p.primer_dir(), PathBuf::from("/work/primers"));
    }

    #[test]
    fn failed_alignment_is_counted_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        std::fs::create_dir_all(p.mapped_dir()).unwrap();
        std::fs::write(p.mapped_dir().join("OG1.ref.fasta"), ">a\nAC\n>b\nAG\n").unwrap();
        std::fs::write(p.mapped_dir().join("OG2.ref.fasta"), ">chr1 slice=0..4\nACGT\n").unwrap();

        let s = p.realign().unwrap();
        assert_eq!(s, StageSummary { processed: 1, skipped: 1 });
        assert!(!p.mapped_dir().join("OG1.mapped.aln").exists());
        assert!(p.mapped_dir().join("OG2.mapped.aln").exists());
    }

    #[test]
    fn missing_input_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(pipeline(dir.path()).realign(), Err(MarkerError::Io { .. })));
    }
}
