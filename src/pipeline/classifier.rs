//! Invocation of the external k-mer classifier.
//!
//! The classifier is a black box: it reads the reference database and a
//! read file and writes a per-read assignment file plus a report. Only its
//! command line is modelled here.

use log::{debug, info};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

pub const OUTPUT_FILE_NAME: &str = "kraken_output.txt";
pub const REPORT_FILE_NAME: &str = "kraken_report.txt";

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier was not found at '{0}'")]
    NotInstalled(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Classifier exited with {0}")]
    Failed(ExitStatus),
}

/// Files written by one classifier run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRun {
    pub output: PathBuf,
    pub report: PathBuf,
}

/// Checks that `binary --version` runs successfully.
pub fn check_installed(binary: &str) -> Result<(), ClassifierError> {
    let status = Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(ClassifierError::NotInstalled(binary.to_string())),
    }
}

/// One classifier invocation.
#[derive(Debug, Clone)]
pub struct ClassifierInvocation {
    pub binary: String,
    pub database: PathBuf,
    pub reads: PathBuf,
    pub results_dir: PathBuf,
    pub threads: Option<usize>,
}

impl ClassifierInvocation {
    pub fn outputs(&self) -> ClassifierRun {
        ClassifierRun {
            output: self.results_dir.join(OUTPUT_FILE_NAME),
            report: self.results_dir.join(REPORT_FILE_NAME),
        }
    }

    /// Builds the classifier command line.
    pub fn command(&self) -> Command {
        let outputs = self.outputs();
        let mut command = Command::new(&self.binary);
        command
            .arg("--db")
            .arg(&self.database)
            .arg("--output")
            .arg(&outputs.output)
            .arg("--report")
            .arg(&outputs.report)
            .arg(&self.reads);
        if let Some(threads) = self.threads {
            command.arg("--threads").arg(threads.to_string());
        }
        command
    }

    /// Runs the classifier, creating the results directory first.
    pub fn run(&self) -> Result<ClassifierRun, ClassifierError> {
        fs::create_dir_all(&self.results_dir)?;

        let mut command = self.command();
        debug!("Running classifier: {:?}", command);
        info!(
            "Classifying {} against {}...",
            self.reads.display(),
            self.database.display()
        );
        let status = command.status()?;
        if !status.success() {
            return Err(ClassifierError::Failed(status));
        }
        Ok(self.outputs())
    }
}
