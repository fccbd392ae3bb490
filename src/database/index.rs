//! Metadata index construction.
//!
//! Joins sequence records with their resolved lineage. A record whose taxon
//! cannot be resolved is reported as an [`UnresolvedTaxonWarning`] and left
//! out of the index; it never aborts the build.

use log::{info, warn};
use rayon::prelude::*;
use std::fmt;

use super::records::SequenceRecord;
use crate::bio::lineage::{self, Lineage, LINEAGE_SEPARATOR};
use crate::bio::taxonomy::{TaxonomyError, TaxonomyStore};

/// Column names of the metadata index.
pub const INDEX_HEADER: [&str; 5] = ["Accession", "Length", "TaxID", "Lineage", "TaxID_Lineage"];

/// One row of the metadata index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataIndexRow {
    pub accession: String,
    pub length: u64,
    pub taxon_id: String,
    /// Pipe-joined lineage names.
    pub lineage: String,
    /// Pipe-joined lineage ids followed by the record's own taxon id.
    pub taxid_lineage: String,
}

impl MetadataIndexRow {
    pub fn new(record: &SequenceRecord, lineage: &Lineage) -> Self {
        MetadataIndexRow {
            accession: record.accession.clone(),
            length: record.length,
            taxon_id: record.taxon_id.clone(),
            lineage: lineage.joined_names(),
            // The query id is always appended, even to an empty lineage, so
            // the id list stays one element longer than the name list.
            taxid_lineage: format!(
                "{}{}{}",
                lineage.joined_taxon_ids(),
                LINEAGE_SEPARATOR,
                record.taxon_id
            ),
        }
    }

    /// Field values in [`INDEX_HEADER`] order.
    pub fn to_record(&self) -> [String; 5] {
        [
            self.accession.clone(),
            self.length.to_string(),
            self.taxon_id.clone(),
            self.lineage.clone(),
            self.taxid_lineage.clone(),
        ]
    }
}

/// Why a record was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The taxon id is absent from the node table.
    UnknownTaxon,
    /// The taxon's parent chain loops without reaching the root.
    CycleDetected,
}

/// A sequence record dropped from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedTaxonWarning {
    pub accession: String,
    pub taxon_id: String,
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedTaxonWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            UnresolvedReason::UnknownTaxon => write!(
                f,
                "TaxID {} of {} not found in the node table",
                self.taxon_id, self.accession
            ),
            UnresolvedReason::CycleDetected => write!(
                f,
                "TaxID {} of {} has a cyclic parent chain",
                self.taxon_id, self.accession
            ),
        }
    }
}

/// Result of an index build: rows plus the records that were dropped.
#[derive(Debug, Default)]
pub struct MetadataIndex {
    pub rows: Vec<MetadataIndexRow>,
    pub warnings: Vec<UnresolvedTaxonWarning>,
}

impl MetadataIndex {
    fn from_outcomes(outcomes: Vec<Result<MetadataIndexRow, UnresolvedTaxonWarning>>) -> Self {
        let mut index = MetadataIndex::default();
        for outcome in outcomes {
            match outcome {
                Ok(row) => index.rows.push(row),
                Err(warning) => {
                    warn!("{}.", warning);
                    index.warnings.push(warning);
                }
            }
        }
        info!(
            "Indexed {} accession(s), dropped {}.",
            index.rows.len(),
            index.warnings.len()
        );
        index
    }
}

fn index_record(
    store: &TaxonomyStore,
    record: &SequenceRecord,
) -> Result<MetadataIndexRow, UnresolvedTaxonWarning> {
    let unresolved = |reason| UnresolvedTaxonWarning {
        accession: record.accession.clone(),
        taxon_id: record.taxon_id.clone(),
        reason,
    };

    if !store.contains(&record.taxon_id) {
        return Err(unresolved(UnresolvedReason::UnknownTaxon));
    }
    match lineage::resolve(store, &record.taxon_id) {
        Ok(lineage) => Ok(MetadataIndexRow::new(record, &lineage)),
        Err(TaxonomyError::CycleDetected { .. }) => Err(unresolved(UnresolvedReason::CycleDetected)),
        // resolve reports no other error kind.
        Err(_) => Err(unresolved(UnresolvedReason::UnknownTaxon)),
    }
}

/// Builds the index sequentially, keeping input order.
pub fn build_index(store: &TaxonomyStore, records: &[SequenceRecord]) -> MetadataIndex {
    let outcomes = records.iter().map(|r| index_record(store, r)).collect();
    MetadataIndex::from_outcomes(outcomes)
}

/// Builds the index on a dedicated rayon pool of `threads` workers.
///
/// The store is shared read-only by every worker; output order is identical
/// to [`build_index`].
pub fn build_index_parallel(
    store: &TaxonomyStore,
    records: &[SequenceRecord],
    threads: usize,
) -> Result<MetadataIndex, rayon::ThreadPoolBuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()?;

    let outcomes = pool.install(|| {
        records
            .par_iter()
            .map(|r| index_record(store, r))
            .collect::<Vec<_>>()
    });
    Ok(MetadataIndex::from_outcomes(outcomes))
}
