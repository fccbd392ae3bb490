//! Input/Output operations module.
//!
//! Writes the tab-delimited metadata index and the comma-delimited
//! candidate list, and reads the candidate list back for extraction.

use crate::database::index::{MetadataIndexRow, INDEX_HEADER};
use crate::database::records::taxon_id_from_file_name;
use crate::pipeline::containment::CandidateTaxon;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// One row of a candidate list read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentEntry {
    pub file_name: String,
    pub taxon_id: String,
    pub score: f64,
}

/// Formats a score as `d.ddddde±XX`: five decimals, signed exponent of at
/// least two digits.
pub fn format_score(score: f64) -> String {
    if score.is_nan() {
        return "nan".to_string();
    }
    if score.is_infinite() {
        let text = if score > 0.0 { "inf" } else { "-inf" };
        return text.to_string();
    }

    let formatted = format!("{:.5e}", score);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}

/// Writes the metadata index (header plus one row per accession).
///
/// Fields are written verbatim; lineage names are never quoted.
pub fn write_metadata_index<W: Write>(rows: &[MetadataIndexRow], writer: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);

    writer.write_record(INDEX_HEADER)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the metadata index to `output_path`.
pub fn write_metadata_index_file(rows: &[MetadataIndexRow], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    write_metadata_index(rows, BufWriter::new(file))
}

/// Writes the ranked candidates as `taxid_<id>_genomic.fna.gz,<score>` rows.
pub fn write_containment_csv<W: Write>(candidates: &[CandidateTaxon], writer: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    for candidate in candidates {
        writer.write_record([candidate.sequence_file_name(), format_score(candidate.score)])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the ranked candidates to `output_path`.
pub fn write_containment_csv_file(candidates: &[CandidateTaxon], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    write_containment_csv(candidates, BufWriter::new(file))
}

/// Reads a candidate list written by [`write_containment_csv`].
pub fn read_containment_csv<R: Read>(reader: R) -> Result<Vec<ContainmentEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        if record.len() != 2 {
            return Err(anyhow!(
                "Candidate list line {}: expected 2 fields, found {}",
                line,
                record.len()
            ));
        }

        let file_name = &record[0];
        let taxon_id = taxon_id_from_file_name(file_name).ok_or_else(|| {
            anyhow!("Candidate list line {}: unexpected file name '{}'", line, file_name)
        })?;
        let score: f64 = record[1]
            .parse()
            .with_context(|| format!("Candidate list line {}: invalid score '{}'", line, &record[1]))?;

        entries.push(ContainmentEntry {
            file_name: file_name.to_string(),
            taxon_id: taxon_id.to_string(),
            score,
        });
    }
    Ok(entries)
}

/// Reads a candidate list from `path`.
pub fn read_containment_csv_file(path: &Path) -> Result<Vec<ContainmentEntry>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_containment_csv(file)
}
