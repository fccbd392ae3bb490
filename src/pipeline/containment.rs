//! Containment ranking of classifier reports.
//!
//! A classifier report is tab-delimited:
//!
//! ```text
//! score  count  reads_direct  rank_code  taxon_id  name
//! ```
//!
//! Rows whose `rank_code` equals `S<level>` contribute their score; the
//! resulting candidates are ordered by descending score and drive which
//! taxa get their reads extracted.

use indexmap::IndexMap;
use log::{debug, info};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

/// Default file name of the ranked candidate list.
pub const CONTAINMENT_FILE_NAME: &str = "ContainmentResults.csv";

const RANK_CODE_FIELD: usize = 3;
const TAXON_ID_FIELD: usize = 4;
const SCORE_FIELD: usize = 0;

#[derive(Error, Debug)]
pub enum RankError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Malformed report row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("No entries found for taxonomy level '{level}'")]
    NoCandidates { level: u32 },
}

/// A taxon worth extracting, with its classifier score.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTaxon {
    pub taxon_id: String,
    pub score: f64,
}

impl CandidateTaxon {
    /// Name of the per-taxon sequence file the extraction step writes.
    pub fn sequence_file_name(&self) -> String {
        format!("taxid_{}_genomic.fna.gz", self.taxon_id)
    }
}

/// Rank code selecting rows at `level`, e.g. `S1`.
pub fn level_tag(level: u32) -> String {
    format!("S{level}")
}

/// Ranks the taxa of a classifier report at `level`.
///
/// A taxon reported more than once keeps its latest score but the position
/// of its first row, so equal scores stay in report order.
pub fn rank_report<R: Read>(report: R, level: u32) -> Result<Vec<CandidateTaxon>, RankError> {
    let tag = level_tag(level);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(report);

    let mut scores: IndexMap<String, f64> = IndexMap::new();
    for result in reader.records() {
        let row = result?;
        let line = row.position().map_or(0, |p| p.line());

        let Some(code) = row.get(RANK_CODE_FIELD).map(str::trim) else {
            return Err(RankError::MalformedRow {
                line,
                reason: format!("expected at least {} fields, found {}", RANK_CODE_FIELD + 1, row.len()),
            });
        };
        // Unclassified rows never carry a level tag.
        if code != tag {
            continue;
        }

        let taxon_id = row
            .get(TAXON_ID_FIELD)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RankError::MalformedRow {
                line,
                reason: "missing taxon id".to_string(),
            })?;
        let raw_score = row.get(SCORE_FIELD).map(str::trim).unwrap_or_default();
        let score = raw_score
            .parse::<f64>()
            .map_err(|e| RankError::MalformedRow {
                line,
                reason: format!("invalid score '{raw_score}': {e}"),
            })?;

        if let Some(previous) = scores.insert(taxon_id.to_string(), score) {
            debug!("Taxon {} repeated at {}; {} replaces {}", taxon_id, tag, score, previous);
        }
    }

    if scores.is_empty() {
        return Err(RankError::NoCandidates { level });
    }

    let mut candidates: Vec<CandidateTaxon> = scores
        .into_iter()
        .map(|(taxon_id, score)| CandidateTaxon { taxon_id, score })
        .collect();
    // sort_by is stable: ties keep report order.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    info!("Ranked {} candidate taxa at level {}.", candidates.len(), tag);
    Ok(candidates)
}

/// Ranks the taxa of a classifier report file.
pub fn rank_report_file(path: impl AsRef<Path>, level: u32) -> Result<Vec<CandidateTaxon>, RankError> {
    let file = File::open(path.as_ref())?;
    rank_report(file, level)
}
