//! Taxonomy store.
//!
//! Loads a node table and a name table (both `|`-delimited taxonomy dumps)
//! into an immutable parent/rank/name lookup. The store is built once and
//! only read afterwards, so a single instance can be shared by reference
//! across any number of concurrent lineage resolutions.

use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Taxon id of the root node. Lineage walks terminate here.
pub const ROOT_TAXON: &str = "1";

/// Name recorded for a canonical-rank node that has no scientific name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Name class kept from the name table; every other class is discarded.
pub const SCIENTIFIC_NAME_CLASS: &str = "scientific name";

const FIELD_DELIMITER: char = '|';
const NODE_FIELDS: usize = 3;
const NAME_FIELDS: usize = 4;

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("Missing taxonomy input {path}: {source}")]
    MissingInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed {table} record at line {line}: expected at least {expected} fields, found {found}")]
    MalformedRecord {
        table: &'static str,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Malformed {table} record at line {line}: empty taxon id")]
    EmptyTaxonId { table: &'static str, line: usize },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Parent chain of taxon {taxon_id} never reaches the root after {steps} steps")]
    CycleDetected { taxon_id: String, steps: usize },
}

/// Canonical taxonomic ranks, from most general to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaxonomicLevel {
    Superkingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl TaxonomicLevel {
    /// Returns the rank string used in the node table.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomicLevel::Superkingdom => "superkingdom",
            TaxonomicLevel::Phylum => "phylum",
            TaxonomicLevel::Class => "class",
            TaxonomicLevel::Order => "order",
            TaxonomicLevel::Family => "family",
            TaxonomicLevel::Genus => "genus",
            TaxonomicLevel::Species => "species",
        }
    }

    /// Maps a node-table rank onto a canonical level. Ranks outside the
    /// canonical set ("no rank", "subspecies", "clade", ...) yield `None`.
    pub fn from_rank(rank: &str) -> Option<TaxonomicLevel> {
        match rank {
            "superkingdom" => Some(TaxonomicLevel::Superkingdom),
            "phylum" => Some(TaxonomicLevel::Phylum),
            "class" => Some(TaxonomicLevel::Class),
            "order" => Some(TaxonomicLevel::Order),
            "family" => Some(TaxonomicLevel::Family),
            "genus" => Some(TaxonomicLevel::Genus),
            "species" => Some(TaxonomicLevel::Species),
            _ => None,
        }
    }

    /// Returns all canonical levels in hierarchical order.
    pub fn all_levels() -> [TaxonomicLevel; 7] {
        [
            TaxonomicLevel::Superkingdom,
            TaxonomicLevel::Phylum,
            TaxonomicLevel::Class,
            TaxonomicLevel::Order,
            TaxonomicLevel::Family,
            TaxonomicLevel::Genus,
            TaxonomicLevel::Species,
        ]
    }
}

/// One node of the taxonomy tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonNode {
    pub parent_id: String,
    pub rank: String,
}

/// In-memory taxonomy: taxon id -> node, taxon id -> scientific name.
#[derive(Debug, Default)]
pub struct TaxonomyStore {
    nodes: HashMap<String, TaxonNode>,
    names: HashMap<String, String>,
}

impl TaxonomyStore {
    /// Loads the node and name tables from disk.
    ///
    /// Both files are opened before either is parsed, so a missing name
    /// table is reported without first paying for the node table.
    pub fn load(
        nodes_path: impl AsRef<Path>,
        names_path: impl AsRef<Path>,
    ) -> Result<Self, TaxonomyError> {
        let nodes_file = open_input(nodes_path.as_ref())?;
        let names_file = open_input(names_path.as_ref())?;

        let store = Self::from_readers(BufReader::new(nodes_file), BufReader::new(names_file))?;
        info!(
            "Loaded taxonomy: {} nodes, {} scientific names.",
            store.node_count(),
            store.name_count()
        );
        Ok(store)
    }

    /// Builds a store from already opened node and name tables.
    pub fn from_readers<N: BufRead, M: BufRead>(nodes: N, names: M) -> Result<Self, TaxonomyError> {
        Ok(TaxonomyStore {
            nodes: parse_nodes(nodes)?,
            names: parse_names(names)?,
        })
    }

    /// Looks up a node by taxon id.
    pub fn node(&self, taxon_id: &str) -> Option<&TaxonNode> {
        self.nodes.get(taxon_id)
    }

    /// Looks up the scientific name of a taxon.
    pub fn scientific_name(&self, taxon_id: &str) -> Option<&str> {
        self.names.get(taxon_id).map(String::as_str)
    }

    pub fn contains(&self, taxon_id: &str) -> bool {
        self.nodes.contains_key(taxon_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Iterates over every taxon id in the node table, in no particular order.
    pub fn taxon_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

fn open_input(path: &Path) -> Result<File, TaxonomyError> {
    File::open(path).map_err(|source| TaxonomyError::MissingInput {
        path: path.to_path_buf(),
        source,
    })
}

/// Splits a dump line on `|` and trims every field.
fn split_fields(line: &str) -> Vec<&str> {
    line.trim().split(FIELD_DELIMITER).map(str::trim).collect()
}

/// Reads every non-blank line of a table, checking the field count and the
/// taxon id before handing the fields to `handle`.
fn for_each_record<R, F>(
    reader: R,
    table: &'static str,
    expected: usize,
    mut handle: F,
) -> Result<(), TaxonomyError>
where
    R: BufRead,
    F: FnMut(&[&str]),
{
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(&line);
        if fields.len() < expected {
            return Err(TaxonomyError::MalformedRecord {
                table,
                line: index + 1,
                expected,
                found: fields.len(),
            });
        }
        if fields[0].is_empty() {
            return Err(TaxonomyError::EmptyTaxonId {
                table,
                line: index + 1,
            });
        }
        handle(&fields);
    }
    Ok(())
}

fn parse_nodes<R: BufRead>(reader: R) -> Result<HashMap<String, TaxonNode>, TaxonomyError> {
    let mut nodes = HashMap::new();
    for_each_record(reader, "node", NODE_FIELDS, |fields| {
        nodes.insert(
            fields[0].to_string(),
            TaxonNode {
                parent_id: fields[1].to_string(),
                rank: fields[2].to_string(),
            },
        );
    })?;
    debug!("Parsed {} node records.", nodes.len());
    Ok(nodes)
}

fn parse_names<R: BufRead>(reader: R) -> Result<HashMap<String, String>, TaxonomyError> {
    let mut names = HashMap::new();
    for_each_record(reader, "name", NAME_FIELDS, |fields| {
        // Input is not sorted by taxon id; the last scientific name wins.
        if fields[3] == SCIENTIFIC_NAME_CLASS {
            names.insert(fields[0].to_string(), fields[1].to_string());
        }
    })?;
    debug!("Parsed {} scientific names.", names.len());
    Ok(names)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    pub(crate) const NODES: &str = "\
1\t|\t1\t|\tno rank\t|\t\t|
2\t|\t1\t|\tsuperkingdom\t|\t\t|
3\t|\t2\t|\tspecies\t|\t\t|
";

    pub(crate) const NAMES: &str = "\
1\t|\troot\t|\t\t|\tscientific name\t|
2\t|\tBacteria\t|\tBacteria <bacteria>\t|\tscientific name\t|
2\t|\teubacteria\t|\t\t|\tgenbank common name\t|
3\t|\tE. coli\t|\t\t|\tscientific name\t|
";

    pub(crate) fn sample_store() -> TaxonomyStore {
        TaxonomyStore::from_readers(NODES.as_bytes(), NAMES.as_bytes()).unwrap()
    }

    #[test]
    fn test_taxonomic_level_round_trip_through_rank_string() {
        for level in TaxonomicLevel::all_levels() {
            assert_eq!(TaxonomicLevel::from_rank(level.as_str()), Some(level));
        }
        assert_eq!(TaxonomicLevel::from_rank("no rank"), None);
        assert_eq!(TaxonomicLevel::from_rank("Species"), None);
    }

    #[test]
    fn test_taxonomic_level_order() {
        assert!(TaxonomicLevel::Superkingdom < TaxonomicLevel::Phylum);
        assert!(TaxonomicLevel::Genus < TaxonomicLevel::Species);
    }

    #[test]
    fn test_from_readers_builds_nodes_and_names() {
        let store = sample_store();

        assert_eq!(store.node_count(), 3);
        assert_eq!(
            store.node("3"),
            Some(&TaxonNode {
                parent_id: "2".to_string(),
                rank: "species".to_string(),
            })
        );
        assert_eq!(store.scientific_name("2"), Some("Bacteria"));
        assert_eq!(store.scientific_name("3"), Some("E. coli"));
        assert!(store.node("42").is_none());
        assert!(store.scientific_name("42").is_none());
    }

    #[test]
    fn test_non_scientific_names_are_discarded() {
        let names = "7\t|\tfoo\t|\t\t|\tsynonym\t|\n";
        let store = TaxonomyStore::from_readers(NODES.as_bytes(), names.as_bytes()).unwrap();
        assert_eq!(store.name_count(), 0);
    }

    #[test]
    fn test_last_scientific_name_wins() {
        let names = "\
5\t|\tFirst\t|\t\t|\tscientific name\t|
5\t|\tSecond\t|\t\t|\tscientific name\t|
";
        let store = TaxonomyStore::from_readers(NODES.as_bytes(), names.as_bytes()).unwrap();
        assert_eq!(store.scientific_name("5"), Some("Second"));
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let nodes = "1\t|\t1\t|\tno rank\t|\n\n   \n2\t|\t1\t|\tgenus\t|\n";
        let store = TaxonomyStore::from_readers(nodes.as_bytes(), "".as_bytes()).unwrap();
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn test_short_node_record_is_malformed() {
        let nodes = "1\t|\t1\t|\tno rank\t|\n2\t|\t1\n";
        let err = TaxonomyStore::from_readers(nodes.as_bytes(), NAMES.as_bytes()).unwrap_err();
        match err {
            TaxonomyError::MalformedRecord {
                table,
                line,
                expected,
                found,
            } => {
                assert_eq!(table, "node");
                assert_eq!(line, 2);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_name_record_is_malformed() {
        let names = "1\t|\troot\t|\n";
        let err = TaxonomyStore::from_readers(NODES.as_bytes(), names.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            TaxonomyError::MalformedRecord { table: "name", line: 1, .. }
        ));
    }

    #[test]
    fn test_empty_taxon_id_is_malformed() {
        let nodes = "\t|\t1\t|\tgenus\t|\n";
        let err = TaxonomyStore::from_readers(nodes.as_bytes(), NAMES.as_bytes()).unwrap_err();
        assert!(matches!(err, TaxonomyError::EmptyTaxonId { table: "node", line: 1 }));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempdir().unwrap();
        let nodes_path = dir.path().join("nodes.dmp");
        let names_path = dir.path().join("names.dmp");
        fs::write(&nodes_path, NODES).unwrap();
        fs::write(&names_path, NAMES).unwrap();

        let store = TaxonomyStore::load(&nodes_path, &names_path).unwrap();
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.name_count(), 3);

        dir.close().unwrap();
    }

    #[test]
    fn test_load_missing_names_file() {
        let dir = tempdir().unwrap();
        let nodes_path = dir.path().join("nodes.dmp");
        fs::write(&nodes_path, NODES).unwrap();
        let names_path = dir.path().join("names.dmp");

        let err = TaxonomyStore::load(&nodes_path, &names_path).unwrap_err();
        match err {
            TaxonomyError::MissingInput { path, .. } => assert_eq!(path, names_path),
            other => panic!("unexpected error: {other:?}"),
        }

        dir.close().unwrap();
    }
}
