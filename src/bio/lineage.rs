//! Lineage resolution.
//!
//! Walks parent pointers from a taxon towards the root and keeps only the
//! nodes whose rank is one of the canonical levels.

use itertools::Itertools;

use super::taxonomy::{TaxonomicLevel, TaxonomyError, TaxonomyStore, ROOT_TAXON, UNKNOWN_NAME};

/// Separator used when a lineage is flattened into a single field.
pub const LINEAGE_SEPARATOR: &str = "|";

/// One canonical-rank ancestor of a taxon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageEntry {
    pub level: TaxonomicLevel,
    pub name: String,
    pub taxon_id: String,
}

/// Canonical-rank ancestors of a taxon, ordered from general to specific.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage {
    entries: Vec<LineageEntry>,
}

impl Lineage {
    pub fn entries(&self) -> &[LineageEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in lineage order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Taxon ids in lineage order, index-aligned with [`Lineage::names`].
    pub fn taxon_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.taxon_id.as_str())
    }

    /// Gets the entry at a specific level, if the lineage has one.
    pub fn get_level(&self, level: TaxonomicLevel) -> Option<&LineageEntry> {
        self.entries.iter().find(|e| e.level == level)
    }

    /// Pipe-joined names, e.g. `Bacteria|Escherichia|Escherichia coli`.
    pub fn joined_names(&self) -> String {
        self.names().join(LINEAGE_SEPARATOR)
    }

    /// Pipe-joined taxon ids, e.g. `2|561|562`.
    pub fn joined_taxon_ids(&self) -> String {
        self.taxon_ids().join(LINEAGE_SEPARATOR)
    }
}

/// Resolves the canonical lineage of `taxon_id`.
///
/// The walk stops at the root, or at the first id missing from the store;
/// the latter yields a partial (possibly empty) lineage. A parent chain that
/// visits more nodes than the store holds must contain a cycle and is
/// reported as [`TaxonomyError::CycleDetected`].
pub fn resolve(store: &TaxonomyStore, taxon_id: &str) -> Result<Lineage, TaxonomyError> {
    let max_steps = store.node_count();
    let mut entries = Vec::new();
    let mut current = taxon_id;
    let mut steps = 0;

    while current != ROOT_TAXON {
        let Some(node) = store.node(current) else {
            break;
        };

        steps += 1;
        if steps > max_steps {
            return Err(TaxonomyError::CycleDetected {
                taxon_id: taxon_id.to_string(),
                steps,
            });
        }

        if let Some(level) = TaxonomicLevel::from_rank(&node.rank) {
            entries.push(LineageEntry {
                level,
                name: store
                    .scientific_name(current)
                    .unwrap_or(UNKNOWN_NAME)
                    .to_string(),
                taxon_id: current.to_string(),
            });
        }
        current = node.parent_id.as_str();
    }

    // Collected leaf-to-root.
    entries.reverse();
    Ok(Lineage { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::taxonomy::tests::{sample_store, NAMES, NODES};

    const ECOLI_NODES: &str = "\
1\t|\t1\t|\tno rank\t|
131567\t|\t1\t|\tno rank\t|
2\t|\t131567\t|\tsuperkingdom\t|
1224\t|\t2\t|\tphylum\t|
1236\t|\t1224\t|\tclass\t|
91347\t|\t1236\t|\torder\t|
543\t|\t91347\t|\tfamily\t|
561\t|\t543\t|\tgenus\t|
562\t|\t561\t|\tspecies\t|
83333\t|\t562\t|\tstrain\t|
";

    const ECOLI_NAMES: &str = "\
2\t|\tBacteria\t|\t\t|\tscientific name\t|
1224\t|\tPseudomonadota\t|\t\t|\tscientific name\t|
1236\t|\tGammaproteobacteria\t|\t\t|\tscientific name\t|
91347\t|\tEnterobacterales\t|\t\t|\tscientific name\t|
543\t|\tEnterobacteriaceae\t|\t\t|\tscientific name\t|
561\t|\tEscherichia\t|\t\t|\tscientific name\t|
562\t|\tEscherichia coli\t|\t\t|\tscientific name\t|
83333\t|\tEscherichia coli K-12\t|\t\t|\tscientific name\t|
";

    fn ecoli_store() -> TaxonomyStore {
        TaxonomyStore::from_readers(ECOLI_NODES.as_bytes(), ECOLI_NAMES.as_bytes()).unwrap()
    }

    #[test]
    fn test_resolve_minimal_tree() {
        let store = sample_store();
        let lineage = resolve(&store, "3").unwrap();

        assert_eq!(lineage.joined_names(), "Bacteria|E. coli");
        assert_eq!(lineage.joined_taxon_ids(), "2|3");
        assert_eq!(lineage.entries()[0].level, TaxonomicLevel::Superkingdom);
        assert_eq!(lineage.entries()[1].level, TaxonomicLevel::Species);
    }

    #[test]
    fn test_resolve_full_lineage_skips_non_canonical_ranks() {
        let store = ecoli_store();
        let lineage = resolve(&store, "83333").unwrap();

        assert_eq!(
            lineage.joined_names(),
            "Bacteria|Pseudomonadota|Gammaproteobacteria|Enterobacterales|\
             Enterobacteriaceae|Escherichia|Escherichia coli"
        );
        assert_eq!(lineage.joined_taxon_ids(), "2|1224|1236|91347|543|561|562");
        assert_eq!(lineage.get_level(TaxonomicLevel::Genus).unwrap().name, "Escherichia");
    }

    #[test]
    fn test_lineage_levels_are_ordered_general_to_specific() {
        let store = ecoli_store();
        let lineage = resolve(&store, "562").unwrap();
        let levels: Vec<TaxonomicLevel> = lineage.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, TaxonomicLevel::all_levels().to_vec());
    }

    #[test]
    fn test_resolve_root_is_empty() {
        let store = sample_store();
        assert!(resolve(&store, "1").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_unknown_taxon_is_empty() {
        let store = sample_store();
        let lineage = resolve(&store, "999").unwrap();
        assert!(lineage.is_empty());
        assert_eq!(lineage.joined_names(), "");
    }

    #[test]
    fn test_broken_chain_yields_partial_lineage() {
        // 20 points at a parent that is missing from the table.
        let nodes = "\
1\t|\t1\t|\tno rank\t|
20\t|\t77\t|\tgenus\t|
21\t|\t20\t|\tspecies\t|
";
        let store = TaxonomyStore::from_readers(nodes.as_bytes(), "".as_bytes()).unwrap();
        let lineage = resolve(&store, "21").unwrap();
        assert_eq!(lineage.joined_taxon_ids(), "20|21");
    }

    #[test]
    fn test_missing_name_uses_placeholder() {
        let names = "2\t|\tBacteria\t|\t\t|\tscientific name\t|\n";
        let store = TaxonomyStore::from_readers(NODES.as_bytes(), names.as_bytes()).unwrap();
        let lineage = resolve(&store, "3").unwrap();
        assert_eq!(lineage.joined_names(), "Bacteria|Unknown");
        assert_eq!(lineage.joined_taxon_ids(), "2|3");
    }

    #[test]
    fn test_cycle_is_detected() {
        let nodes = "\
1\t|\t1\t|\tno rank\t|
5\t|\t6\t|\tgenus\t|
6\t|\t5\t|\tfamily\t|
7\t|\t7\t|\tspecies\t|
";
        let store = TaxonomyStore::from_readers(nodes.as_bytes(), NAMES.as_bytes()).unwrap();

        for taxon in ["5", "7"] {
            let err = resolve(&store, taxon).unwrap_err();
            assert!(
                matches!(err, TaxonomyError::CycleDetected { ref taxon_id, .. } if taxon_id == taxon)
            );
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let store = ecoli_store();
        for taxon in store.taxon_ids() {
            assert_eq!(resolve(&store, taxon).unwrap(), resolve(&store, taxon).unwrap());
        }
    }

    #[test]
    fn test_every_lineage_follows_parent_pointers() {
        let store = ecoli_store();
        for taxon in store.taxon_ids() {
            let lineage = resolve(&store, taxon).unwrap();
            let ids: Vec<&str> = lineage.taxon_ids().collect();

            // Each id must be reachable from its successor by walking parents.
            for pair in ids.windows(2) {
                let (ancestor, descendant) = (pair[0], pair[1]);
                let mut current = descendant;
                while current != ancestor {
                    current = store.node(current).unwrap().parent_id.as_str();
                    assert_ne!(current, ROOT_TAXON, "{ancestor} is not above {descendant}");
                }
            }
            assert_eq!(lineage.names().count(), lineage.taxon_ids().count());
        }
    }
}
