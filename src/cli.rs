use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::bio::TaxonomyStore;
use crate::config::{DatabaseLayout, PipelineConfig};
use crate::database::{build_index, build_index_parallel, scan_directory};
use crate::io;
use crate::pipeline::classifier::{check_installed, ClassifierInvocation};
use crate::pipeline::containment::{rank_report_file, CONTAINMENT_FILE_NAME};
use crate::pipeline::extract::{select_for_extraction, ExtractionJob};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the accession to lineage metadata index of a database
    Index {
        /// Path to the database folder
        data: PathBuf,

        /// Node table. Default is <data>/taxonomy/nodes.dmp
        #[arg(long)]
        nodes: Option<PathBuf>,

        /// Name table. Default is <data>/taxonomy/names.dmp
        #[arg(long)]
        names: Option<PathBuf>,

        /// Per-taxon sequence files. Default is <data>/organism_files
        #[arg(long)]
        db_dir: Option<PathBuf>,

        /// Output index. Default is <data>/db_info.txt
        #[arg(long)]
        dbinfo_out: Option<PathBuf>,
    },

    /// Rank the taxa of an existing classifier report
    Rank {
        /// Classifier report
        report: PathBuf,

        /// Report level to rank (rows tagged S<level>)
        #[arg(long)]
        taxonomy_level: Option<u32>,

        /// Output candidate list. Written to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the classifier and write the ranked candidate list
    Classify {
        /// Path to the classifier database
        data: PathBuf,

        /// Input FASTQ file
        reads: PathBuf,

        /// Directory for classifier output and report
        #[arg(long)]
        results_dir: PathBuf,

        /// Classifier executable
        #[arg(long)]
        classifier_path: Option<String>,

        /// Report level to rank (rows tagged S<level>)
        #[arg(long)]
        taxonomy_level: Option<u32>,

        /// Candidate list. Default is <results_dir>/ContainmentResults.csv
        #[arg(long)]
        containment_results: Option<PathBuf>,
    },

    /// Extract the reads of high-scoring taxa into per-taxon sequence files
    Extract {
        /// Path to the database folder
        data: PathBuf,

        /// Input FASTQ file
        reads: PathBuf,

        /// Candidate list written by `classify` or `rank`
        #[arg(long)]
        containment_results: PathBuf,

        /// Classifier per-read output
        #[arg(long)]
        kraken_output: PathBuf,

        /// Classifier report
        #[arg(long)]
        kraken_report: PathBuf,

        /// Minimum score for a taxon to be extracted
        #[arg(long)]
        cutoff: Option<f64>,

        /// Output directory. Default is <data>/organism_files
        #[arg(long)]
        db_dir: Option<PathBuf>,
    },
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    config.validate()?;

    match cli.command {
        Commands::Index {
            data,
            nodes,
            names,
            db_dir,
            dbinfo_out,
        } => {
            config.nodes = nodes.or(config.nodes);
            config.names = names.or(config.names);
            config.db_dir = db_dir.or(config.db_dir);
            config.dbinfo_out = dbinfo_out.or(config.dbinfo_out);
            run_index(&config.layout(&data), config.threads)
        }

        Commands::Rank {
            report,
            taxonomy_level,
            output,
        } => {
            let level = taxonomy_level.unwrap_or(config.taxonomy_level);
            let candidates = rank_report_file(&report, level)
                .with_context(|| format!("Failed to rank {}", report.display()))?;
            match output {
                Some(path) => io::write_containment_csv_file(&candidates, &path)?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    io::write_containment_csv(&candidates, &mut stdout)?;
                    stdout.flush()?;
                }
            }
            Ok(())
        }

        Commands::Classify {
            data,
            reads,
            results_dir,
            classifier_path,
            taxonomy_level,
            containment_results,
        } => {
            let binary = classifier_path.unwrap_or(config.classifier_path);
            check_installed(&binary)?;

            let invocation = ClassifierInvocation {
                binary,
                database: data,
                reads,
                results_dir: results_dir.clone(),
                threads: Some(config.threads),
            };
            let run = invocation.run()?;

            let level = taxonomy_level.unwrap_or(config.taxonomy_level);
            let candidates = rank_report_file(&run.report, level)
                .with_context(|| format!("Failed to rank {}", run.report.display()))?;

            let csv_output =
                containment_results.unwrap_or_else(|| results_dir.join(CONTAINMENT_FILE_NAME));
            io::write_containment_csv_file(&candidates, &csv_output)?;
            info!(
                "Wrote {} candidate(s) to {}.",
                candidates.len(),
                csv_output.display()
            );
            Ok(())
        }

        Commands::Extract {
            data,
            reads,
            containment_results,
            kraken_output,
            kraken_report,
            cutoff,
            db_dir,
        } => {
            let output_dir = db_dir
                .or(config.db_dir)
                .unwrap_or_else(|| DatabaseLayout::under(&data).db_dir);
            let cutoff = cutoff.unwrap_or(config.cutoff);

            let entries = io::read_containment_csv_file(&containment_results)?;
            let selected = select_for_extraction(&entries, cutoff);
            info!(
                "{} of {} candidate(s) pass the cutoff {}.",
                selected.len(),
                entries.len(),
                cutoff
            );

            let job = ExtractionJob {
                command: config.extract_command,
                reads,
                classifier_output: kraken_output,
                classifier_report: kraken_report,
                output_dir: output_dir.clone(),
            };
            let summary = job.run_all(&selected)?;
            if !summary.failed.is_empty() {
                warn!("Extraction failed for taxa: {}", summary.failed.join(", "));
            }
            info!(
                "Processing complete. {} file(s) saved in {}.",
                summary.extracted.len(),
                output_dir.display()
            );
            Ok(())
        }
    }
}

/// Loads the taxonomy, scans the sequence files and writes the index.
pub fn run_index(layout: &DatabaseLayout, threads: usize) -> Result<()> {
    let store = TaxonomyStore::load(&layout.nodes, &layout.names)
        .context("Failed to load taxonomy")?;
    let records = scan_directory(&layout.db_dir).context("Failed to scan sequence files")?;

    let index = if threads > 1 {
        build_index_parallel(&store, &records, threads)?
    } else {
        build_index(&store, &records)
    };

    write_index(&index.rows, &layout.dbinfo_out)?;
    info!("Metadata index has been created at {}.", layout.dbinfo_out.display());
    Ok(())
}

fn write_index(rows: &[crate::database::MetadataIndexRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    io::write_metadata_index_file(rows, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::taxonomy::tests::{NAMES, NODES};
    use crate::database::records::tests::write_gz;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::tempdir;

    fn make_database(data: &Path) {
        fs::create_dir_all(data.join("taxonomy")).unwrap();
        fs::create_dir_all(data.join("organism_files")).unwrap();
        fs::write(data.join("taxonomy").join("nodes.dmp"), NODES).unwrap();
        fs::write(data.join("taxonomy").join("names.dmp"), NAMES).unwrap();
        write_gz(
            &data.join("organism_files").join("taxid_3_genomic.fna.gz"),
            ">A1 x length=100\nACGT\n",
        );
        write_gz(
            &data.join("organism_files").join("taxid_404_genomic.fna.gz"),
            ">X1 x length=10\nACGT\n",
        );
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_index_subcommand_writes_db_info() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("db");
        make_database(&data);

        let cli = Cli::parse_from(["taxindex", "index", data.to_str().unwrap()]);
        run_cli(cli).unwrap();

        let content = fs::read_to_string(data.join("db_info.txt")).unwrap();
        assert_eq!(
            content,
            "Accession\tLength\tTaxID\tLineage\tTaxID_Lineage\nA1\t100\t3\tBacteria|E. coli\t2|3|3\n"
        );

        dir.close().unwrap();
    }

    #[test]
    fn test_index_subcommand_parallel_with_override() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("db");
        make_database(&data);
        let out = dir.path().join("out").join("index.tsv");

        let cli = Cli::parse_from([
            "taxindex",
            "--threads",
            "3",
            "index",
            data.to_str().unwrap(),
            "--dbinfo-out",
            out.to_str().unwrap(),
        ]);
        run_cli(cli).unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), 2);
        assert!(!data.join("db_info.txt").exists());

        dir.close().unwrap();
    }

    #[test]
    fn test_index_subcommand_missing_taxonomy() {
        let dir = tempdir().unwrap();
        let cli = Cli::parse_from(["taxindex", "index", dir.path().to_str().unwrap()]);
        assert!(run_cli(cli).is_err());
        assert!(!dir.path().join("db_info.txt").exists());
    }

    #[test]
    fn test_rank_subcommand_writes_candidates() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("kraken_report.txt");
        fs::write(
            &report,
            "1.0\t1\t1\tU\t0\tunclassified\n0.5\t1\t1\tS1\t10\ta\n0.9\t1\t1\tS1\t20\tb\n",
        )
        .unwrap();
        let output = dir.path().join(CONTAINMENT_FILE_NAME);

        let cli = Cli::parse_from([
            "taxindex",
            "rank",
            report.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ]);
        run_cli(cli).unwrap();

        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "taxid_20_genomic.fna.gz,9.00000e-01\ntaxid_10_genomic.fna.gz,5.00000e-01\n"
        );

        let cli = Cli::parse_from([
            "taxindex",
            "rank",
            report.to_str().unwrap(),
            "--taxonomy-level",
            "2",
        ]);
        assert!(run_cli(cli).is_err());

        dir.close().unwrap();
    }
}
