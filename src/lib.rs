//! Taxonomy resolution and metadata indexing for a metagenomic
//! classification pipeline.
//!
//! - [`bio`]: taxonomy store and lineage resolution
//! - [`database`]: per-taxon sequence scanning and the metadata index
//! - [`pipeline`]: classifier invocation, containment ranking, read extraction
//! - [`io`]: delimited writers and readers for the pipeline's tables

pub mod bio;
pub mod cli;
pub mod config;
pub mod database;
pub mod io;
pub mod pipeline;
