//! Taxonomy utilities module.
//!
//! Groups the taxonomy store (node and name tables) and the lineage
//! resolver built on top of it.

pub mod lineage;
pub mod taxonomy;

pub use lineage::{resolve, Lineage, LineageEntry};
pub use taxonomy::{TaxonNode, TaxonomicLevel, TaxonomyError, TaxonomyStore};
