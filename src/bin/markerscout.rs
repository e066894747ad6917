use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use markerscout::{logging, report, Config, Pipeline, StageSummary};

/// markerscout CLI
#[derive(Parser)]
#[command(name = "markerscout")]
#[command(version)]
#[command(about = "Reference-guided ortholog slicing, primer design and primer placement", long_about = None)]
struct Cli {
    /// Working directory holding the stage sub-directories
    #[arg(long, global = true, default_value = ".")]
    workdir: PathBuf,
    /// TOML configuration (defaults apply to anything it omits)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Threads (0 = all)
    #[arg(long, global = true)]
    threads: Option<usize>,
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select best hits and write one composite FASTA per ortholog
    Slice {
        /// Reference genome (FASTA or FASTA.GZ)
        genome: PathBuf,
        /// BLAST tabular output (-outfmt "6 std sstrand")
        blast: PathBuf,
    },

    /// Realign composites with MAFFT
    Realign,

    /// Rename alignment rows to numeric aliases for PriFi
    Alias,

    /// Run PriFi on every aliased alignment
    Design,

    /// Parse PriFi reports and write primers.fa / primers.csv
    Primers,

    /// Write primer alignments from the PriFi reports
    Reconstruct,

    /// All stages, slice through reconstruct
    Run {
        /// Reference genome (FASTA or FASTA.GZ)
        genome: PathBuf,
        /// BLAST tabular output (-outfmt "6 std sstrand")
        blast: PathBuf,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(p) => Config::from_file(p).with_context(|| format!("loading {}", p.display()))?,
        None => Config::default(),
    };
    if let Some(t) = cli.threads {
        config.threads = t;
    }
    config.validate()?;
    Ok(config)
}

fn print_stage(name: &str, s: StageSummary) {
    println!("{name}\tprocessed={}\tskipped={}", s.processed, s.skipped);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    std::fs::create_dir_all(&cli.workdir).with_context(|| format!("creating {}", cli.workdir.display()))?;
    let log_file = config.log_file.as_deref().map(|f| cli.workdir.join(f));
    logging::init_logger(cli.verbose, log_file.as_deref())?;
    tracing::info!(version = markerscout::VERSION, workdir = %cli.workdir.display(), "markerscout starting");

    let pipeline = Pipeline::new(&cli.workdir, config);

    match cli.command {
        Commands::Slice { genome, blast } => {
            print_stage("slice", pipeline.extract_slices(&genome, &blast)?);
        }
        Commands::Realign => print_stage("realign", pipeline.realign()?),
        Commands::Alias => print_stage("alias", pipeline.alias_alignments()?),
        Commands::Design => print_stage("design", pipeline.design_primers()?),
        Commands::Primers => {
            let (summary, pairs) = pipeline.collect_primers()?;
            print_stage("primers", summary);
            println!("pairs\t{}", pairs.values().map(Vec::len).sum::<usize>());
        }
        Commands::Reconstruct => cmd_reconstruct(&pipeline, &pipeline.primer_dir())?,
        Commands::Run { genome, blast } => {
            let s = pipeline.run_all(&genome, &blast)?;
            print_stage("slice", s.slices);
            print_stage("realign", s.realign);
            print_stage("alias", s.alias);
            print_stage("design", s.design);
            print_stage("primers", s.primers);
            print_stage("reconstruct", s.primer_alignments);
        }
    }

    Ok(())
}

fn cmd_reconstruct(pipeline: &Pipeline, primer_dir: &Path) -> anyhow::Result<()> {
    let batch = report::parse_report_dir(primer_dir)?;
    if batch.rejected > 0 {
        eprintln!("{} report(s) rejected; see log", batch.rejected);
    }
    print_stage("reconstruct", pipeline.export_primer_alignments(&batch.pairs)?);
    Ok(())
}
