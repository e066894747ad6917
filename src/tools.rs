//! External tools: the multiple aligner and the primer designer.
//!
//! Both are traits so stages can be driven without the binaries installed.
//! The concrete wrappers shell out with [`std::process::Command`], send the
//! tool's stdout where the stage expects it and keep stderr for the error.
use std::fs::File;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::config::ToolsConfig;
use crate::error::{MarkerError, Result};
use crate::model::{AlignedRow, Alignment};
use crate::seqio;

/// Aligns a FASTA file into a Clustal alignment, preserving input order.
pub trait Aligner: Send + Sync {
    fn align(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Designs primers on a Clustal alignment, leaving a `*.rep` report beside it.
pub trait PrimerDesigner: Send + Sync {
    fn design(&self, alignment: &Path) -> Result<()>;
}

fn run_tool(executable: &str, cmd: &mut Command) -> Result<Output> {
    let output = cmd.output().map_err(|e| MarkerError::Tool {
        tool: executable.to_string(),
        message: if e.kind() == std::io::ErrorKind::NotFound {
            "executable not found".to_string()
        } else {
            e.to_string()
        },
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        return Err(MarkerError::Tool {
            tool: executable.to_string(),
            message: format!(
                "exited with {}: {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            ),
        });
    }
    Ok(output)
}

/// MAFFT with Clustal output on stdout.
#[derive(Debug, Clone)]
pub struct MafftAligner {
    pub executable: String,
    pub args: Vec<String>,
}

impl MafftAligner {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        MafftAligner { executable: tools.mafft.clone(), args: tools.mafft_args.clone() }
    }
}

impl Aligner for MafftAligner {
    fn align(&self, input: &Path, output: &Path) -> Result<()> {
        let out = File::create(output).map_err(|e| MarkerError::io(output, e))?;
        debug!(tool = %self.executable, args = ?self.args, input = %input.display(), "running aligner");
        run_tool(
            &self.executable,
            Command::new(&self.executable)
                .args(&self.args)
                .arg(input)
                .stdout(Stdio::from(out))
                .stderr(Stdio::piped()),
        )?;
        Ok(())
    }
}

/// Align `input` into `output`, skipping the tool when there is only one
/// sequence: MAFFT refuses single-sequence input, so a one-row alignment is
/// written directly. Returns whether the tool ran.
pub fn align_or_bypass(aligner: &dyn Aligner, input: &Path, output: &Path) -> Result<bool> {
    let seqs = seqio::read_fasta(input)?;
    match seqs.as_slice() {
        [] => Err(MarkerError::Fasta { path: input.to_path_buf(), message: "no sequences to align".to_string() }),
        [only] => {
            let aln = Alignment::new(vec![AlignedRow::new(only.id.clone(), only.residues.clone())])?;
            seqio::write_clustal_file(output, &aln)?;
            debug!(input = %input.display(), "single sequence; aligner bypassed");
            Ok(false)
        }
        _ => {
            aligner.align(input, output)?;
            Ok(true)
        }
    }
}

/// PriFi, invoked as `PriFi.pl <alignment>`; it writes `<alignment>.rep`.
#[derive(Debug, Clone)]
pub struct PriFi {
    pub executable: String,
}

impl PriFi {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        PriFi { executable: tools.prifi.clone() }
    }
}

impl PrimerDesigner for PriFi {
    fn design(&self, alignment: &Path) -> Result<()> {
        debug!(tool = %self.executable, alignment = %alignment.display(), "running primer designer");
        let output = run_tool(
            &self.executable,
            Command::new(&self.executable).arg(alignment).stdout(Stdio::piped()).stderr(Stdio::piped()),
        )?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(tool = %self.executable, output = %stdout.trim_end(), "primer designer output");
        }
        Ok(())
    }
}
