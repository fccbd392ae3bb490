//! Pipeline configuration.
//!
//! Settings can come from a JSON file; any field left out takes its default.
//! Command-line flags override whatever the file says.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Node table. Defaults to `<data>/taxonomy/nodes.dmp`.
    pub nodes: Option<PathBuf>,
    /// Name table. Defaults to `<data>/taxonomy/names.dmp`.
    pub names: Option<PathBuf>,
    /// Per-taxon sequence files. Defaults to `<data>/organism_files`.
    pub db_dir: Option<PathBuf>,
    /// Metadata index output. Defaults to `<data>/db_info.txt`.
    pub dbinfo_out: Option<PathBuf>,

    /// Classifier executable.
    pub classifier_path: String,
    /// Extraction tool: program followed by any leading arguments. The
    /// default runs the script relative to the working directory.
    pub extract_command: Vec<String>,

    pub threads: usize,
    /// Report level `N` selects rows tagged `S<N>`.
    pub taxonomy_level: u32,
    /// Minimum score for a taxon to be extracted.
    pub cutoff: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            nodes: None,
            names: None,
            db_dir: None,
            dbinfo_out: None,
            classifier_path: "kraken2".to_string(),
            extract_command: vec![
                "python3".to_string(),
                "scripts/extract_kraken_reads.py".to_string(),
            ],
            threads: 1,
            taxonomy_level: 1,
            cutoff: 0.0001,
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PipelineConfig =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, the defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be at least 1".to_string()));
        }
        if self.extract_command.is_empty() {
            return Err(ConfigError::Invalid("extract_command must not be empty".to_string()));
        }
        if !self.cutoff.is_finite() {
            return Err(ConfigError::Invalid(format!("cutoff {} is not finite", self.cutoff)));
        }
        Ok(())
    }

    /// Resolves the database file layout under `data`, honouring overrides.
    pub fn layout(&self, data: &Path) -> DatabaseLayout {
        let defaults = DatabaseLayout::under(data);
        DatabaseLayout {
            nodes: self.nodes.clone().unwrap_or(defaults.nodes),
            names: self.names.clone().unwrap_or(defaults.names),
            db_dir: self.db_dir.clone().unwrap_or(defaults.db_dir),
            dbinfo_out: self.dbinfo_out.clone().unwrap_or(defaults.dbinfo_out),
        }
    }
}

/// Concrete paths of a reference database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseLayout {
    pub nodes: PathBuf,
    pub names: PathBuf,
    pub db_dir: PathBuf,
    pub dbinfo_out: PathBuf,
}

impl DatabaseLayout {
    /// The conventional layout of a database directory.
    pub fn under(data: &Path) -> Self {
        DatabaseLayout {
            nodes: data.join("taxonomy").join("nodes.dmp"),
            names: data.join("taxonomy").join("names.dmp"),
            db_dir: data.join("organism_files"),
            dbinfo_out: data.join("db_info.txt"),
        }
    }
}
