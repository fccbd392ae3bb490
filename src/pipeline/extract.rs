//! Per-taxon read extraction.
//!
//! For every candidate above the cutoff the external extraction tool pulls
//! the taxon's reads out of the read file into
//! `<output_dir>/taxid_<id>_genomic.fna`, which is then gzip-compressed in
//! place. Those files are what the sequence scanner later indexes.

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

use crate::io::ContainmentEntry;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Extraction command is empty")]
    EmptyCommand,

    #[error("Extraction of taxon {taxon_id} exited with {status}")]
    Failed { taxon_id: String, status: ExitStatus },

    #[error("Extraction of taxon {taxon_id} produced no file at {path}")]
    MissingOutput { taxon_id: String, path: PathBuf },
}

/// Taxon ids whose score reaches `cutoff`, in candidate-list order.
pub fn select_for_extraction(entries: &[ContainmentEntry], cutoff: f64) -> Vec<&str> {
    entries
        .iter()
        .filter(|e| e.score >= cutoff)
        .map(|e| e.taxon_id.as_str())
        .collect()
}

/// Compresses `path` to `<path>.gz` and removes the original.
pub fn gzip_in_place(path: &Path) -> io::Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let mut input = BufReader::new(File::open(path)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(&target)?), Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)?;
    Ok(target)
}

/// Outcome of extracting a list of taxa.
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    pub extracted: Vec<PathBuf>,
    pub failed: Vec<String>,
}

/// Shared inputs of every per-taxon extraction.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    /// Program and leading arguments of the extraction tool.
    pub command: Vec<String>,
    pub reads: PathBuf,
    pub classifier_output: PathBuf,
    pub classifier_report: PathBuf,
    pub output_dir: PathBuf,
}

impl ExtractionJob {
    /// Uncompressed output file for `taxon_id`.
    pub fn output_path(&self, taxon_id: &str) -> PathBuf {
        self.output_dir.join(format!("taxid_{taxon_id}_genomic.fna"))
    }

    pub fn command_for(&self, taxon_id: &str) -> Result<Command, ExtractionError> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or(ExtractionError::EmptyCommand)?;

        let mut command = Command::new(program);
        command
            .args(leading)
            .arg("-s")
            .arg(&self.reads)
            .arg("-k")
            .arg(&self.classifier_output)
            .arg("-r")
            .arg(&self.classifier_report)
            .arg("-t")
            .arg(taxon_id)
            .arg("-o")
            .arg(self.output_path(taxon_id))
            .arg("--include-children");
        Ok(command)
    }

    /// Extracts and compresses the reads of one taxon.
    pub fn extract_taxon(&self, taxon_id: &str) -> Result<PathBuf, ExtractionError> {
        let mut command = self.command_for(taxon_id)?;
        debug!("Running extraction: {:?}", command);
        let status = command.status()?;
        if !status.success() {
            return Err(ExtractionError::Failed {
                taxon_id: taxon_id.to_string(),
                status,
            });
        }

        let output = self.output_path(taxon_id);
        if !output.is_file() {
            return Err(ExtractionError::MissingOutput {
                taxon_id: taxon_id.to_string(),
                path: output,
            });
        }
        Ok(gzip_in_place(&output)?)
    }

    /// Extracts every taxon in order. A failing taxon is logged and skipped.
    pub fn run_all(&self, taxon_ids: &[&str]) -> Result<ExtractionSummary, ExtractionError> {
        fs::create_dir_all(&self.output_dir)?;

        let mut summary = ExtractionSummary::default();
        for taxon_id in taxon_ids {
            match self.extract_taxon(taxon_id) {
                Ok(path) => {
                    info!("Extracted taxon {} to {}", taxon_id, path.display());
                    summary.extracted.push(path);
                }
                Err(e) => {
                    warn!("Skipping taxon {}: {}", taxon_id, e);
                    summary.failed.push(taxon_id.to_string());
                }
            }
        }
        Ok(summary)
    }
}
